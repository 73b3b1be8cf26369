//! SIGWINCH delivery without doing work in the signal handler.
//!
//! The handler writes one byte to a non-blocking socket and returns. A
//! forwarder thread reads the other end and sends [`Trigger::WindowSizeChanged`]
//! to the controller. Only one [`WindowChangeSignal`] may be installed per
//! process at a time.

use std::io::{self, Read};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicI32, Ordering};
use std::thread::JoinHandle;

use crossbeam_channel::Sender;

use crate::error::{Result, TattleError};
use crate::relay::{CancelHandle, CancellableReader};
use crate::session::Trigger;

static WINCH_FD: AtomicI32 = AtomicI32::new(-1);

extern "C" fn on_window_change(_signal: libc::c_int) {
    let fd = WINCH_FD.load(Ordering::Relaxed);
    if fd >= 0 {
        let byte = 1u8;
        // SAFETY: write(2) is async-signal-safe. A full buffer already
        // holds an undelivered wakeup, so the result is ignored.
        unsafe {
            libc::write(fd, &byte as *const u8 as *const libc::c_void, 1);
        }
    }
}

/// Installed SIGWINCH handler. Dropping it puts the previous disposition back.
pub struct WindowChangeSignal {
    write: UnixStream,
    read: Option<UnixStream>,
    previous: libc::sigaction,
}

impl WindowChangeSignal {
    pub fn install() -> Result<Self> {
        let (read, write) = UnixStream::pair()?;
        write.set_nonblocking(true)?;
        WINCH_FD.store(write.as_raw_fd(), Ordering::SeqCst);

        // SAFETY: sigaction structs are plain old data; the handler only
        // performs an atomic load and write(2), both async-signal-safe.
        let previous = unsafe {
            let mut action: libc::sigaction = std::mem::zeroed();
            action.sa_sigaction = on_window_change as extern "C" fn(libc::c_int) as libc::sighandler_t;
            action.sa_flags = libc::SA_RESTART;
            libc::sigemptyset(&mut action.sa_mask);

            let mut previous: libc::sigaction = std::mem::zeroed();
            if libc::sigaction(libc::SIGWINCH, &action, &mut previous) != 0 {
                WINCH_FD.store(-1, Ordering::SeqCst);
                return Err(TattleError::Io(io::Error::last_os_error()));
            }
            previous
        };

        Ok(Self {
            write,
            read: Some(read),
            previous,
        })
    }

    /// Start the thread that turns socket wakeups into triggers. The returned
    /// handle stops it.
    pub fn spawn_forwarder(
        &mut self,
        short_id: &str,
        triggers: Sender<Trigger>,
    ) -> Result<(JoinHandle<()>, CancelHandle)> {
        let read = self.read.take().ok_or_else(|| {
            TattleError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "window change forwarder already running",
            ))
        })?;
        let (mut reader, cancel) = CancellableReader::new(read)?;

        let name = format!("tattle-winch-{}", short_id);
        let handle = std::thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                // Several signals between reads collapse into one trigger.
                let mut buf = [0u8; 64];
                loop {
                    match reader.read(&mut buf) {
                        Ok(0) => break,
                        Ok(_) => {
                            if triggers.send(Trigger::WindowSizeChanged).is_err() {
                                break;
                            }
                        }
                        Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                        Err(e) => {
                            tracing::warn!("Window change socket failed: {}", e);
                            break;
                        }
                    }
                }
            })
            .map_err(|source| TattleError::Thread { name, source })?;

        Ok((handle, cancel))
    }
}

impl Drop for WindowChangeSignal {
    fn drop(&mut self) {
        // SAFETY: restores the disposition saved at install time.
        unsafe {
            libc::sigaction(libc::SIGWINCH, &self.previous, std::ptr::null_mut());
        }
        let _ = WINCH_FD.compare_exchange(
            self.write.as_raw_fd(),
            -1,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}
