//! Reads that can be abandoned from another thread.
//!
//! The reader polls its source together with one end of a private socket
//! pair. Cancelling writes to the other end, which makes every pending and
//! future read report end-of-stream.

use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::net::UnixStream;
use std::sync::Arc;

#[derive(Clone)]
pub struct CancelHandle {
    write: Arc<UnixStream>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // A full buffer already holds a pending cancellation.
        let _ = (&*self.write).write(&[1]);
    }
}

pub struct CancellableReader<S: AsRawFd> {
    source: S,
    cancel: UnixStream,
}

impl<S: AsRawFd> CancellableReader<S> {
    pub fn new(source: S) -> io::Result<(Self, CancelHandle)> {
        let (read, write) = UnixStream::pair()?;
        write.set_nonblocking(true)?;
        let reader = Self {
            source,
            cancel: read,
        };
        let handle = CancelHandle {
            write: Arc::new(write),
        };
        Ok((reader, handle))
    }
}

impl<S: AsRawFd> Read for CancellableReader<S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let source = self.source.as_raw_fd();
        loop {
            let mut fds = [
                libc::pollfd {
                    fd: source,
                    events: libc::POLLIN,
                    revents: 0,
                },
                libc::pollfd {
                    fd: self.cancel.as_raw_fd(),
                    events: libc::POLLIN,
                    revents: 0,
                },
            ];
            // SAFETY: `fds` is a valid array of two pollfd structs.
            let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
            if rc < 0 {
                let err = io::Error::last_os_error();
                if err.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(err);
            }

            if fds[1].revents != 0 {
                return Ok(0);
            }
            if fds[0].revents != 0 {
                // SAFETY: `buf` is valid for `buf.len()` bytes of writes. The
                // fd is read directly so no std buffer hides data from poll.
                let n = unsafe { libc::read(source, buf.as_mut_ptr() as *mut libc::c_void, buf.len()) };
                if n < 0 {
                    return Err(io::Error::last_os_error());
                }
                return Ok(n as usize);
            }
        }
    }
}
