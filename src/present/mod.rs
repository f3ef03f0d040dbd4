//! Presentation surfaces for annotated frames.
//!
//! A presenter shows each annotated frame and forwards user requests. Every
//! surface sends `Action`s into the same `mpsc` channel; only the processing
//! loop drains it, so counting state is never touched from another thread.

pub mod console;
pub mod dashboard;

use anyhow::Result;
use image::RgbImage;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::session::{Action, Readout};

pub use console::ConsolePresenter;
pub use dashboard::Dashboard;

pub trait Presenter {
    fn name(&self) -> &'static str;

    /// Show one annotated frame.
    fn present(&mut self, image: &RgbImage, readout: &Readout) -> Result<()>;

    /// Show a message to the operator (save results, camera errors).
    fn notify(&mut self, notice: &str);

    /// Release the surface. Called once on every exit path of the loop.
    fn shutdown(&mut self) -> Result<()>;
}

pub fn action_channel() -> (Sender<Action>, Receiver<Action>) {
    mpsc::channel()
}
