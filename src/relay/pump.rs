use std::io::{self, Read, Write};

use crate::event::Event;
use crate::queue::EventQueue;
use crate::session::SharedState;

/// Default read size for both pumps.
pub const CHUNK_SIZE: usize = 4096;

/// Why a pump loop returned.
#[derive(Debug)]
pub enum PumpExit {
    /// The source reported end-of-stream (or was cancelled).
    EndOfStream,
    /// The session was already stopped at the top of the loop.
    Stopped,
    ReadFailed(io::Error),
    WriteFailed(io::Error),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    pub chunks: u64,
    pub bytes: u64,
}

/// Write the whole buffer, retrying short writes and interrupted calls.
pub fn guaranteed_write<W: Write + ?Sized>(dest: &mut W, mut buf: &[u8]) -> io::Result<()> {
    while !buf.is_empty() {
        match dest.write(buf) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::WriteZero,
                    "destination accepted no bytes",
                ))
            }
            Ok(n) => buf = &buf[n..],
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    loop {
        match dest.flush() {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Move bytes from `source` to `dest` until end-of-stream, a hard error, or
/// the session stops.
///
/// When `mirror` is set every chunk is also queued as an output event, after
/// it has reached `dest`.
pub fn pump<R, W>(
    mut source: R,
    mut dest: W,
    state: &SharedState,
    chunk_size: usize,
    mirror: Option<&EventQueue<Event>>,
) -> (PumpExit, PumpStats)
where
    R: Read,
    W: Write,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut stats = PumpStats::default();

    let exit = loop {
        if !state.is_running() {
            break PumpExit::Stopped;
        }

        let n = match source.read(&mut buf) {
            Ok(0) => break PumpExit::EndOfStream,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => break PumpExit::ReadFailed(e),
        };

        if let Err(e) = guaranteed_write(&mut dest, &buf[..n]) {
            break PumpExit::WriteFailed(e);
        }
        if let Some(queue) = mirror {
            queue.enqueue(Event::output(&buf[..n]));
        }

        stats.chunks += 1;
        stats.bytes += n as u64;
    };

    (exit, stats)
}
