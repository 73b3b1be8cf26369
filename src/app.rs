//! Startup and teardown of one relayed session.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::config::TattleConfig;
use crate::error::Result;
use crate::event::Event;
use crate::pty::{PtyManager, Session, SessionResize};
use crate::relay::{self, CancellableReader, PumpStats};
use crate::session::{self, SessionContext, SessionController};
use crate::signals::WindowChangeSignal;
use crate::telemetry::{self, ExportStats, ExporterHandle, HttpTransport, Transport};
use crate::terminal::{LocalTerminal, Tty};

/// What a finished session reports back to `main`.
#[derive(Debug, Default)]
pub struct RunSummary {
    pub exit_code: Option<u32>,
    pub input: PumpStats,
    pub output: PumpStats,
    pub exported: ExportStats,
}

struct Running {
    controller: JoinHandle<()>,
    child: JoinHandle<()>,
    input: JoinHandle<PumpStats>,
    output: JoinHandle<PumpStats>,
    exporter: ExporterHandle,
    exit_code: Arc<parking_lot::Mutex<Option<u32>>>,
    _session: Arc<Session>,
}

/// Relay the configured shell until it exits.
///
/// Setup failures restore the local terminal before the error is returned.
pub fn run(config: &TattleConfig) -> Result<RunSummary> {
    config.validate()?;

    let ctx = SessionContext::new();
    let tty = Arc::new(Tty::stdin()?);
    tracing::info!(session = %ctx.short_id(), "Starting session {}", ctx.id());

    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(
        config.collector_url.clone(),
        config.session_url.clone(),
        config.request_timeout(),
    )?);

    let mut winch = match WindowChangeSignal::install() {
        Ok(winch) => winch,
        Err(e) => {
            tty.restore();
            return Err(e);
        }
    };

    let (tx, rx) = crossbeam_channel::unbounded();
    let running = match start(config, &ctx, &tty, &transport, tx.clone(), rx) {
        Ok(running) => running,
        Err(e) => {
            ctx.shutdown();
            tty.restore();
            return Err(e);
        }
    };

    let forwarder = match winch.spawn_forwarder(ctx.short_id(), tx) {
        Ok(forwarder) => Some(forwarder),
        Err(e) => {
            tracing::warn!("Window size changes will not be tracked: {}", e);
            None
        }
    };

    let summary = finish(running, config.shutdown_grace());

    drop(winch);
    if let Some((handle, cancel)) = forwarder {
        cancel.cancel();
        let _ = handle.join();
    }
    tty.restore();

    tracing::info!(
        session = %ctx.short_id(),
        exit_code = ?summary.exit_code,
        batches = summary.exported.batches,
        events = summary.exported.events,
        failures = summary.exported.failures,
        "Session finished"
    );
    Ok(summary)
}

fn start(
    config: &TattleConfig,
    ctx: &Arc<SessionContext>,
    tty: &Arc<Tty>,
    transport: &Arc<dyn Transport>,
    tx: crossbeam_channel::Sender<session::Trigger>,
    rx: crossbeam_channel::Receiver<session::Trigger>,
) -> Result<Running> {
    let size = tty.window_size().unwrap_or_default();
    let spawned = PtyManager::new().spawn_session(config.shell.as_deref(), size, ctx.id())?;
    ctx.queue.enqueue(Event::resize(size));

    tty.enter_raw()?;

    let (stdin, input_cancel) = CancellableReader::new(std::io::stdin())?;
    let input = relay::spawn_input_pump(Arc::clone(ctx), stdin, spawned.writer, config.chunk_size)?;
    let output = relay::spawn_output_pump(
        Arc::clone(ctx),
        spawned.reader,
        std::io::stdout(),
        config.chunk_size,
    )?;
    let exporter = telemetry::spawn_exporter(
        Arc::clone(ctx),
        Arc::clone(transport),
        config.exporter_settings(),
    )?;

    let session = Arc::new(spawned.session);
    let terminal: Arc<dyn LocalTerminal> = tty.clone();
    let resize: Arc<dyn SessionResize> = session.clone();
    let controller = session::spawn_controller(
        SessionController::new(Arc::clone(ctx), terminal, resize, input_cancel),
        rx,
    )?;

    let exit_code = Arc::new(parking_lot::Mutex::new(None));
    let watcher_code = Arc::clone(&exit_code);
    let mut child = spawned.child;
    let child = session::spawn_child_watcher(
        ctx.short_id(),
        move || {
            let code = match child.wait() {
                Ok(status) => Some(status.exit_code()),
                Err(e) => {
                    tracing::warn!("Failed to wait for shell: {}", e);
                    None
                }
            };
            *watcher_code.lock() = code;
            code
        },
        tx,
    )?;

    Ok(Running {
        controller,
        child,
        input,
        output,
        exporter,
        exit_code,
        _session: session,
    })
}

fn join<T: Default>(name: &str, handle: JoinHandle<T>) -> T {
    handle.join().unwrap_or_else(|_| {
        tracing::error!("{} thread panicked", name);
        T::default()
    })
}

fn finish(running: Running, grace: Duration) -> RunSummary {
    join("child watcher", running.child);
    join("controller", running.controller);
    let input = join("input pump", running.input);
    let output = join("output pump", running.output);
    let exported = running.exporter.join_timeout(grace).unwrap_or_else(|| {
        tracing::warn!(
            grace_ms = grace.as_millis() as u64,
            "Exporter did not finish in time; undelivered events are lost"
        );
        ExportStats::default()
    });

    let exit_code = *running.exit_code.lock();
    RunSummary {
        exit_code,
        input,
        output,
        exported,
    }
}
