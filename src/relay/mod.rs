pub mod cancel;
pub mod pump;

pub use cancel::{CancelHandle, CancellableReader};
pub use pump::{guaranteed_write, pump, PumpExit, PumpStats, CHUNK_SIZE};

use std::io::{Read, Write};
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::error::{Result, TattleError};
use crate::session::SessionContext;

fn log_exit(session: &str, direction: &str, exit: &PumpExit, stats: PumpStats) {
    match exit {
        PumpExit::EndOfStream | PumpExit::Stopped => tracing::debug!(
            session,
            direction,
            chunks = stats.chunks,
            bytes = stats.bytes,
            "Pump finished: {:?}",
            exit
        ),
        PumpExit::ReadFailed(e) | PumpExit::WriteFailed(e) => tracing::debug!(
            session,
            direction,
            chunks = stats.chunks,
            bytes = stats.bytes,
            "Pump stopped on I/O error: {}",
            e
        ),
    }
}

/// Spawn the local -> session pump. Nothing is mirrored from this direction.
pub fn spawn_input_pump<R, W>(
    ctx: Arc<SessionContext>,
    source: R,
    dest: W,
    chunk_size: usize,
) -> Result<JoinHandle<PumpStats>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let name = format!("tattle-input-{}", ctx.short_id());
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let (exit, stats) = pump(source, dest, &ctx.state, chunk_size, None);
            log_exit(ctx.short_id(), "input", &exit, stats);
            stats
        })
        .map_err(|source| TattleError::Thread { name, source })
}

/// Spawn the session -> local pump, mirroring every chunk into the queue.
pub fn spawn_output_pump<R, W>(
    ctx: Arc<SessionContext>,
    source: R,
    dest: W,
    chunk_size: usize,
) -> Result<JoinHandle<PumpStats>>
where
    R: Read + Send + 'static,
    W: Write + Send + 'static,
{
    let name = format!("tattle-output-{}", ctx.short_id());
    std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let (exit, stats) = pump(source, dest, &ctx.state, chunk_size, Some(&ctx.queue));
            log_exit(ctx.short_id(), "output", &exit, stats);
            stats
        })
        .map_err(|source| TattleError::Thread { name, source })
}
