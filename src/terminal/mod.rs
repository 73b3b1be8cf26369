//! The local terminal the user is sitting at.

pub mod tty;

pub use tty::Tty;

use crate::event::WindowSize;

/// What the session controller needs from the local terminal.
pub trait LocalTerminal: Send + Sync {
    /// Current window dimensions, `None` if they cannot be read.
    fn window_size(&self) -> Option<WindowSize>;

    /// Put back the parameters captured before the session started.
    /// Safe to call more than once.
    fn restore(&self);
}
