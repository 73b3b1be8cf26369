pub mod session;
pub mod shell;

pub use session::{Session, SessionResize};

use std::io::{Read, Write};

use portable_pty::{native_pty_system, Child, CommandBuilder};

use crate::error::{Result, TattleError};
use crate::event::WindowSize;

use self::shell::{detect_shell, shell_name};

/// Everything produced by spawning the shell. The reader and writer go to
/// the pumps, the child to the exit watcher.
pub struct SpawnResult {
    pub session: Session,
    pub reader: Box<dyn Read + Send>,
    pub writer: Box<dyn Write + Send>,
    pub child: Box<dyn Child + Send + Sync>,
}

/// Allocates the pty and starts the interactive shell on it.
pub struct PtyManager;

impl PtyManager {
    pub fn new() -> Self {
        Self
    }

    pub fn spawn_session(
        &self,
        shell_path: Option<&str>,
        size: WindowSize,
        session_id: &str,
    ) -> Result<SpawnResult> {
        let shell = match shell_path {
            Some(p) if std::path::Path::new(p).exists() => p.to_string(),
            Some(p) => {
                tracing::warn!("Configured shell '{}' not found; falling back to default", p);
                detect_shell()
            }
            None => detect_shell(),
        };

        let pair = native_pty_system()
            .openpty(session::pty_size(size))
            .map_err(TattleError::pty)?;

        let mut cmd = CommandBuilder::new(&shell);
        cmd.arg("-i");
        if let Ok(cwd) = std::env::current_dir() {
            cmd.cwd(cwd);
        }
        cmd.env("TATTLE_SESSION", session_id);

        let child = pair.slave.spawn_command(cmd).map_err(TattleError::pty)?;
        // Only the child should hold the slave side, so EOF reaches the reader.
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(TattleError::pty)?;
        let writer = pair.master.take_writer().map_err(TattleError::pty)?;

        tracing::info!(
            shell = shell_name(&shell),
            cols = size.cols,
            rows = size.rows,
            "Spawned interactive shell"
        );

        Ok(SpawnResult {
            session: Session::new(pair.master),
            reader,
            writer,
            child,
        })
    }
}

impl Default for PtyManager {
    fn default() -> Self {
        Self::new()
    }
}
