mod client;
mod error;
mod types;

pub use client::TmuxClient;
pub use error::{Result, TmuxError};
pub use types::{CaptureResult, Mode, PaneAddress, PaneInfo, ResizeAxis, Session, Window};
