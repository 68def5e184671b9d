//! The transport abstraction the session is bound to by `connect`.
//!
//! Per the module's scope, transport mechanics (TCP connect, blocking reads/
//! writes, readiness polling) are an external collaborator with a narrow
//! interface — this module does not attempt to be a general-purpose async
//! I/O layer. The session drives everything through the small [`Transport`]
//! trait; [`TcpTransport`] is the only production implementation.

use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::os::unix::io::RawFd;
use std::os::unix::io::AsRawFd;
use std::time::Duration;

use crate::error::{RfbError, Result};

/// Narrow transport surface the session needs: connect-with-timeout (done by
/// the caller before handing a transport to the session), blocking-ish
/// read/write, and a raw fd for the host's own reactor.
///
/// Reads/writes may return [`io::ErrorKind::WouldBlock`] when the transport
/// is in non-blocking mode and no data is currently available; callers in
/// this crate retry through [`crate::wire::force_read`]/`force_write`.
pub trait Transport: Send {
    /// Reads into `buf`, returning the number of bytes read (0 means EOF).
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Writes from `buf`, returning the number of bytes written.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Puts the transport into non-blocking mode so reads/writes return
    /// `WouldBlock` instead of parking the calling thread. The host drives
    /// the session cooperatively, so the session never wants to block.
    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()>;

    /// The raw file descriptor the host can register with its own event
    /// loop (`get_wait_objs`). `None` on platforms without one.
    fn raw_fd(&self) -> Option<RawFd>;
}

/// A direct TCP connection to the upstream RFB server.
pub struct TcpTransport {
    stream: TcpStream,
}

impl TcpTransport {
    /// Connects to `addr`, failing if the connection isn't established
    /// within `timeout`. Per spec §4.H step 3, the session uses a 3-second
    /// timeout for this call.
    pub fn connect(addr: impl ToSocketAddrs, timeout: Duration) -> Result<Self> {
        let addr = addr
            .to_socket_addrs()
            .map_err(RfbError::Transport)?
            .next()
            .ok_or_else(|| RfbError::config("no resolvable address"))?;
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(RfbError::Transport)?;
        stream.set_nodelay(true).ok();
        Ok(Self { stream })
    }

    /// The peer's socket address, used for diagnostics.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
        self.stream.set_nonblocking(nonblocking)
    }

    fn raw_fd(&self) -> Option<RawFd> {
        Some(self.stream.as_raw_fd())
    }
}

/// An in-memory transport used by unit tests to drive the session without a
/// real socket: queued reads are served in order, writes are captured.
#[cfg(test)]
pub struct MemTransport {
    reads: std::collections::VecDeque<Vec<u8>>,
    pub writes: Vec<u8>,
}

#[cfg(test)]
impl MemTransport {
    pub fn with_reads(reads: Vec<Vec<u8>>) -> Self {
        Self {
            reads: reads.into(),
            writes: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Transport for MemTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.reads.pop_front() {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    let mut rest = chunk;
                    rest.drain(..n);
                    self.reads.push_front(rest);
                }
                Ok(n)
            }
            None => Ok(0),
        }
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn set_nonblocking(&mut self, _nonblocking: bool) -> io::Result<()> {
        Ok(())
    }

    fn raw_fd(&self) -> Option<RawFd> {
        None
    }
}
