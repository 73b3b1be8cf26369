use parking_lot::Mutex;
use portable_pty::{MasterPty, PtySize};

use crate::error::{Result, TattleError};
use crate::event::WindowSize;

/// Pushes a new window size into the session stream.
pub trait SessionResize: Send + Sync {
    fn resize(&self, size: WindowSize) -> Result<()>;
}

/// The controlling side of the session's pseudo-terminal.
///
/// Reading and writing go through the handles returned at spawn time; this
/// keeps the master alive (the shell gets SIGHUP once it is dropped) and
/// propagates window-size changes.
pub struct Session {
    master: Mutex<Box<dyn MasterPty + Send>>,
}

impl Session {
    pub fn new(master: Box<dyn MasterPty + Send>) -> Self {
        Self {
            master: Mutex::new(master),
        }
    }
}

impl SessionResize for Session {
    fn resize(&self, size: WindowSize) -> Result<()> {
        self.master
            .lock()
            .resize(pty_size(size))
            .map_err(TattleError::pty)
    }
}

pub fn pty_size(size: WindowSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}
