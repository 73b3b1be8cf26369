use std::ops::ControlFlow;
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{Receiver, Sender};

use crate::error::{Result, TattleError};
use crate::event::{Event, WindowSize};
use crate::pty::SessionResize;
use crate::relay::CancelHandle;
use crate::terminal::LocalTerminal;

use super::SessionContext;

/// Lifecycle notifications delivered to the controller thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// The shell exited, with its exit code when known.
    ChildExited(Option<u32>),
    WindowSizeChanged,
}

/// Owns every lifecycle transition of a session.
///
/// Signal handlers and the exit watcher only send [`Trigger`]s; all state
/// changes and queue writes they imply happen here, on an ordinary thread.
pub struct SessionController {
    ctx: Arc<SessionContext>,
    terminal: Arc<dyn LocalTerminal>,
    session: Arc<dyn SessionResize>,
    input_cancel: CancelHandle,
}

impl SessionController {
    pub fn new(
        ctx: Arc<SessionContext>,
        terminal: Arc<dyn LocalTerminal>,
        session: Arc<dyn SessionResize>,
        input_cancel: CancelHandle,
    ) -> Self {
        Self {
            ctx,
            terminal,
            session,
            input_cancel,
        }
    }

    pub fn handle(&self, trigger: Trigger) -> ControlFlow<()> {
        match trigger {
            Trigger::ChildExited(code) => {
                self.on_child_exited(code);
                ControlFlow::Break(())
            }
            Trigger::WindowSizeChanged => {
                self.on_window_size_changed();
                ControlFlow::Continue(())
            }
        }
    }

    /// Process triggers until the child exits or every sender is gone.
    pub fn run(self, triggers: Receiver<Trigger>) {
        for trigger in triggers.iter() {
            if self.handle(trigger).is_break() {
                return;
            }
        }
        tracing::debug!(session = %self.ctx.short_id(), "Trigger channel closed");
    }

    fn on_child_exited(&self, code: Option<u32>) {
        if self.ctx.shutdown() {
            tracing::info!(session = %self.ctx.short_id(), exit_code = ?code, "Shell exited");
        }
        self.input_cancel.cancel();
        self.terminal.restore();
    }

    fn on_window_size_changed(&self) {
        if !self.ctx.state.is_running() {
            return;
        }
        let Some(size) = self.terminal.window_size() else {
            tracing::debug!("Window size unavailable; ignoring resize");
            return;
        };
        self.resize(size);
    }

    fn resize(&self, size: WindowSize) {
        if let Err(e) = self.session.resize(size) {
            tracing::warn!(cols = size.cols, rows = size.rows, "Failed to resize session: {}", e);
        }
        tracing::debug!(cols = size.cols, rows = size.rows, "Window resized");
        self.ctx.queue.enqueue(Event::resize(size));
    }
}

pub fn spawn_controller(
    controller: SessionController,
    triggers: Receiver<Trigger>,
) -> Result<JoinHandle<()>> {
    let name = format!("tattle-control-{}", controller.ctx.short_id());
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || controller.run(triggers))
        .map_err(|source| TattleError::Thread { name, source })
}

/// Block on `wait` in a dedicated thread and report the exit as a trigger.
pub fn spawn_child_watcher<F>(
    short_id: &str,
    wait: F,
    triggers: Sender<Trigger>,
) -> Result<JoinHandle<()>>
where
    F: FnOnce() -> Option<u32> + Send + 'static,
{
    let name = format!("tattle-child-{}", short_id);
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let code = wait();
            let _ = triggers.send(Trigger::ChildExited(code));
        })
        .map_err(|source| TattleError::Thread { name, source })
}
