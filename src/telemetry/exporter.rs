use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::error::{Result, TattleError};
use crate::event::{Event, Payload};
use crate::session::SessionContext;

use super::transport::Transport;

/// Default coalescing delay between the first queued event and the drain.
pub const DEBOUNCE: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct ExporterSettings {
    pub debounce: Duration,
    /// Deliver whatever is still queued once the session stops instead of
    /// dropping it.
    pub flush_on_exit: bool,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE,
            flush_on_exit: true,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportStats {
    pub batches: u64,
    pub events: u64,
    pub failures: u64,
    /// Events dropped at shutdown because flushing was disabled.
    pub discarded: u64,
}

/// Sole consumer of the session queue.
///
/// Session announcements go out from the exporter thread too, so a slow
/// collector never holds up the relay.
pub struct Exporter {
    ctx: Arc<SessionContext>,
    transport: Arc<dyn Transport>,
    settings: ExporterSettings,
    stats: ExportStats,
}

impl Exporter {
    pub fn new(
        ctx: Arc<SessionContext>,
        transport: Arc<dyn Transport>,
        settings: ExporterSettings,
    ) -> Self {
        Self {
            ctx,
            transport,
            settings,
            stats: ExportStats::default(),
        }
    }

    pub fn run(mut self) -> ExportStats {
        if let Err(e) = self.transport.open_session(self.ctx.id()) {
            tracing::warn!(session = %self.ctx.short_id(), "Failed to announce session: {}", e);
        }

        while self.ctx.state.is_running() {
            // Parks until something is queued; `false` means the queue was
            // closed while empty, which only happens on shutdown.
            if !self.ctx.queue.wait() {
                break;
            }

            std::thread::sleep(self.settings.debounce);

            let batch = self.ctx.queue.detach_all();
            self.export(batch);
        }

        if self.settings.flush_on_exit {
            let rest = self.ctx.queue.detach_all();
            if !rest.is_empty() {
                tracing::debug!(
                    session = %self.ctx.short_id(),
                    events = rest.len(),
                    bytes = rest.iter().map(Event::byte_len).sum::<usize>(),
                    "Flushing remaining events after shutdown"
                );
                self.export(rest);
            }
        } else {
            let discarded = self.ctx.queue.discard_pending();
            if discarded > 0 {
                tracing::debug!(
                    session = %self.ctx.short_id(),
                    events = discarded,
                    "Discarding undelivered events at shutdown"
                );
            }
            self.stats.discarded += discarded as u64;
        }

        if let Err(e) = self.transport.close_session(self.ctx.id()) {
            tracing::warn!(session = %self.ctx.short_id(), "Failed to close session: {}", e);
        }
        self.stats
    }

    fn export(&mut self, batch: Vec<Event>) {
        let payload = Payload::from_batch(batch);
        if payload.is_empty() {
            return;
        }

        let events = payload.event_count();
        tracing::debug!(
            session = %self.ctx.short_id(),
            events,
            bytes = payload.content_bytes(),
            resizes = payload.cols.len(),
            "Exporting batch"
        );

        self.stats.batches += 1;
        self.stats.events += events as u64;
        if let Err(e) = self.transport.deliver(self.ctx.id(), payload) {
            self.stats.failures += 1;
            tracing::warn!(session = %self.ctx.short_id(), events, "Batch delivery failed: {}", e);
        }
    }
}

/// A running exporter thread.
pub struct ExporterHandle {
    stats: Receiver<ExportStats>,
    thread: JoinHandle<()>,
}

impl ExporterHandle {
    /// Wait for the exporter to finish. `None` if it panicked.
    pub fn join(self) -> Option<ExportStats> {
        let stats = self.stats.recv().ok();
        let _ = self.thread.join();
        stats
    }

    /// Wait at most `grace` for the exporter to finish. On timeout the
    /// thread is left to finish its last request in the background.
    pub fn join_timeout(self, grace: Duration) -> Option<ExportStats> {
        match self.stats.recv_timeout(grace) {
            Ok(stats) => {
                let _ = self.thread.join();
                Some(stats)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                let _ = self.thread.join();
                None
            }
        }
    }
}

pub fn spawn_exporter(
    ctx: Arc<SessionContext>,
    transport: Arc<dyn Transport>,
    settings: ExporterSettings,
) -> Result<ExporterHandle> {
    let name = format!("tattle-export-{}", ctx.short_id());
    let exporter = Exporter::new(ctx, transport, settings);
    let (tx, rx) = crossbeam_channel::bounded(1);
    let thread = std::thread::Builder::new()
        .name(name.clone())
        .spawn(move || {
            let _ = tx.send(exporter.run());
        })
        .map_err(|source| TattleError::Thread { name, source })?;
    Ok(ExporterHandle { stats: rx, thread })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;
    use std::time::Instant;

    use parking_lot::Mutex;

    use crate::event::WindowSize;
    use crate::telemetry::HttpTransport;

    #[derive(Default)]
    struct Recording {
        payloads: Mutex<Vec<Payload>>,
        calls: Mutex<Vec<&'static str>>,
        fail: bool,
    }

    impl Transport for Recording {
        fn deliver(&self, _session: &str, payload: Payload) -> Result<()> {
            self.payloads.lock().push(payload);
            self.calls.lock().push("deliver");
            if self.fail {
                return Err(TattleError::Collector { status: 503 });
            }
            Ok(())
        }

        fn open_session(&self, _session: &str) -> Result<()> {
            self.calls.lock().push("open");
            Ok(())
        }

        fn close_session(&self, _session: &str) -> Result<()> {
            self.calls.lock().push("close");
            Ok(())
        }
    }

    fn settings(debounce_ms: u64, flush_on_exit: bool) -> ExporterSettings {
        ExporterSettings {
            debounce: Duration::from_millis(debounce_ms),
            flush_on_exit,
        }
    }

    #[test]
    fn events_within_one_window_become_one_batch() {
        let ctx = SessionContext::with_id("export-test");
        let transport = Arc::new(Recording::default());
        let handle = spawn_exporter(Arc::clone(&ctx), transport.clone(), settings(200, false))
            .expect("spawn");

        for chunk in [&b"a"[..], b"b", b"c", b"d", b"e"] {
            ctx.queue.enqueue(Event::output(chunk));
        }
        ctx.queue.enqueue(Event::resize(WindowSize::new(132, 43)));

        thread::sleep(Duration::from_millis(500));
        ctx.shutdown();
        let stats = handle.join().expect("exporter stats");

        let payloads = transport.payloads.lock();
        assert_eq!(payloads.len(), 1);
        assert_eq!(payloads[0].content.len(), 5);
        assert_eq!(payloads[0].cols, vec![132]);
        assert_eq!(payloads[0].rows, vec![43]);
        assert_eq!(stats.batches, 1);
        assert_eq!(stats.events, 6);
    }

    #[test]
    fn every_event_is_exported_exactly_once_while_running() {
        let ctx = SessionContext::with_id("export-test");
        let transport = Arc::new(Recording::default());
        let handle = spawn_exporter(Arc::clone(&ctx), transport.clone(), settings(10, true))
            .expect("spawn");

        for i in 0..200u32 {
            ctx.queue.enqueue(Event::output(i.to_string().as_bytes()));
            if i % 50 == 0 {
                thread::sleep(Duration::from_millis(30));
            }
        }
        thread::sleep(Duration::from_millis(100));
        ctx.shutdown();
        handle.join().expect("exporter stats");

        let exported: Vec<Vec<u8>> = transport
            .payloads
            .lock()
            .iter()
            .flat_map(|p| p.content.clone())
            .collect();
        let expected: Vec<Vec<u8>> = (0..200u32).map(|i| i.to_string().into_bytes()).collect();
        assert_eq!(exported, expected);
    }

    #[test]
    fn transport_failures_are_swallowed() {
        let ctx = SessionContext::with_id("export-test");
        let transport = Arc::new(Recording {
            fail: true,
            ..Default::default()
        });
        let handle = spawn_exporter(Arc::clone(&ctx), transport.clone(), settings(10, false))
            .expect("spawn");

        ctx.queue.enqueue(Event::output(b"one"));
        thread::sleep(Duration::from_millis(100));
        ctx.queue.enqueue(Event::output(b"two"));
        thread::sleep(Duration::from_millis(100));
        ctx.shutdown();
        let stats = handle.join().expect("exporter stats");

        assert_eq!(stats.failures, 2);
        assert_eq!(transport.payloads.lock().len(), 2);
        assert!(ctx.queue.is_empty());
    }

    #[test]
    fn shutdown_releases_idle_exporter() {
        let ctx = SessionContext::with_id("export-test");
        let transport = Arc::new(Recording::default());
        let handle = spawn_exporter(Arc::clone(&ctx), transport.clone(), settings(10, true))
            .expect("spawn");

        thread::sleep(Duration::from_millis(30));
        ctx.shutdown();
        let stats = handle.join().expect("exporter stats");

        assert_eq!(stats, ExportStats::default());
        assert!(transport.payloads.lock().is_empty());
    }

    #[test]
    fn leftover_events_are_flushed_when_enabled() {
        let ctx = SessionContext::with_id("export-test");
        ctx.state.stop();
        ctx.queue.enqueue(Event::output(b"late"));

        let transport = Arc::new(Recording::default());
        let stats = Exporter::new(Arc::clone(&ctx), transport.clone(), settings(10, true)).run();

        assert_eq!(stats.batches, 1);
        assert_eq!(transport.payloads.lock()[0].content, vec![b"late".to_vec()]);
    }

    #[test]
    fn leftover_events_are_discarded_when_flush_disabled() {
        let ctx = SessionContext::with_id("export-test");
        ctx.state.stop();
        ctx.queue.enqueue(Event::output(b"late"));
        ctx.queue.enqueue(Event::output(b"later"));

        let transport = Arc::new(Recording::default());
        let stats = Exporter::new(Arc::clone(&ctx), transport.clone(), settings(10, false)).run();

        assert_eq!(stats.discarded, 2);
        assert_eq!(stats.batches, 0);
        assert!(transport.payloads.lock().is_empty());
        assert!(ctx.queue.is_empty());
    }

    #[test]
    fn announcements_bracket_deliveries() {
        let ctx = SessionContext::with_id("export-test");
        let transport = Arc::new(Recording::default());
        let handle = spawn_exporter(Arc::clone(&ctx), transport.clone(), settings(10, true))
            .expect("spawn");

        ctx.queue.enqueue(Event::output(b"ls"));
        thread::sleep(Duration::from_millis(100));
        ctx.queue.enqueue(Event::output(b"pwd"));
        ctx.shutdown();
        handle.join().expect("exporter stats");

        let calls = transport.calls.lock();
        assert_eq!(calls.first(), Some(&"open"));
        assert_eq!(calls.last(), Some(&"close"));
        assert_eq!(calls.iter().filter(|c| **c == "deliver").count(), 2);
    }

    #[test]
    fn silent_session_endpoint_does_not_stall_startup_or_shutdown() {
        // Accepts connections into the backlog but never answers them.
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let session_url = format!("http://{}/", listener.local_addr().expect("addr"));
        let transport = Arc::new(
            HttpTransport::new("http://127.0.0.1:9/", Some(session_url), Duration::from_secs(3))
                .expect("transport"),
        );

        let ctx = SessionContext::with_id("export-test");
        let started = Instant::now();
        let handle =
            spawn_exporter(Arc::clone(&ctx), transport, settings(10, false)).expect("spawn");
        assert!(started.elapsed() < Duration::from_millis(500));

        ctx.shutdown();
        let stopping = Instant::now();
        assert!(handle.join_timeout(Duration::from_millis(200)).is_none());
        assert!(stopping.elapsed() < Duration::from_secs(1));
        drop(listener);
    }

    #[test]
    fn join_timeout_returns_stats_when_exporter_finishes_in_time() {
        let ctx = SessionContext::with_id("export-test");
        let transport = Arc::new(Recording::default());
        let handle = spawn_exporter(Arc::clone(&ctx), transport.clone(), settings(10, true))
            .expect("spawn");

        ctx.queue.enqueue(Event::output(b"exit"));
        ctx.shutdown();
        let stats = handle
            .join_timeout(Duration::from_secs(2))
            .expect("exporter should finish within the grace period");
        assert_eq!(stats.events, 1);
    }
}
