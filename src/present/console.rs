use anyhow::Result;
use image::RgbImage;
use std::io::BufRead;
use std::sync::mpsc::Sender;
use std::thread::JoinHandle;

use super::Presenter;
use crate::session::{Action, Readout};

/// Terminal surface: logs count changes and reads one key per line from stdin.
///
/// Keys: `s` save snapshot, `r` reset the counter, `q` quit.
pub struct ConsolePresenter {
    last_shown: Option<usize>,
    frames: u64,
    keys: Option<JoinHandle<()>>,
}

impl ConsolePresenter {
    /// Start reading keys from stdin.
    pub fn new(actions: Sender<Action>) -> Result<Self> {
        let keys = spawn_key_reader(std::io::BufReader::new(std::io::stdin()), actions)?;
        log::info!("keys: s = save image, r = reset counter, q = quit (press Enter after each)");
        Ok(Self {
            last_shown: None,
            frames: 0,
            keys: Some(keys),
        })
    }

    /// Presenter without a key reader; actions come from elsewhere.
    pub fn headless() -> Self {
        Self {
            last_shown: None,
            frames: 0,
            keys: None,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

/// Map one input line to an action. Unknown input is ignored.
pub fn parse_key(line: &str) -> Option<Action> {
    match line.trim().to_ascii_lowercase().as_str() {
        "s" | "save" => Some(Action::Snapshot),
        "r" | "reset" => Some(Action::Reset),
        "q" | "quit" | "exit" => Some(Action::Quit),
        _ => None,
    }
}

/// Forward keys from `reader` until it ends or the loop stops listening.
///
/// The thread is detached on shutdown: a blocking stdin read cannot be
/// interrupted, and the thread exits on its next send once the receiver is gone.
pub fn spawn_key_reader<R>(reader: R, actions: Sender<Action>) -> Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    let handle = std::thread::Builder::new()
        .name("console-keys".to_string())
        .spawn(move || {
            for line in reader.lines() {
                let Ok(line) = line else { break };
                match parse_key(&line) {
                    Some(action) => {
                        if actions.send(action).is_err() {
                            break;
                        }
                    }
                    None if line.trim().is_empty() => {}
                    None => log::warn!("unknown key '{}' (use s, r or q)", line.trim()),
                }
            }
        })?;
    Ok(handle)
}

impl Presenter for ConsolePresenter {
    fn name(&self) -> &'static str {
        "console"
    }

    fn present(&mut self, _image: &RgbImage, readout: &Readout) -> Result<()> {
        self.frames += 1;
        let shown = readout.shown();
        if self.last_shown != Some(shown) {
            log::info!("count: {} (in frame: {})", shown, readout.current);
            self.last_shown = Some(shown);
        }
        Ok(())
    }

    fn notify(&mut self, notice: &str) {
        log::warn!("{}", notice);
    }

    fn shutdown(&mut self) -> Result<()> {
        self.keys.take();
        Ok(())
    }
}
