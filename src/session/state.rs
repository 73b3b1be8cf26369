use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of a relayed session. The only transition is `Running -> Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Running,
    Stopped,
}

const RUNNING: u8 = 0;
const STOPPED: u8 = 1;

/// Session state shared by the pumps, the exporter and the controller.
///
/// Loops read it at the top of each iteration; nothing is interrupted by a
/// change, so a loop parked in a read or a wait notices only after it returns.
#[derive(Debug)]
pub struct SharedState(AtomicU8);

impl SharedState {
    pub fn new() -> Self {
        Self(AtomicU8::new(RUNNING))
    }

    pub fn get(&self) -> SessionState {
        match self.0.load(Ordering::Acquire) {
            RUNNING => SessionState::Running,
            _ => SessionState::Stopped,
        }
    }

    pub fn is_running(&self) -> bool {
        self.get() == SessionState::Running
    }

    /// Flip to `Stopped`. Returns `true` only for the call that made the change.
    pub fn stop(&self) -> bool {
        self.0.swap(STOPPED, Ordering::AcqRel) == RUNNING
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
