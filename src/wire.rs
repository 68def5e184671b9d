//! Wire codec: explicit big-endian (RFB) and little-endian (host clipboard
//! channel) readers/writers over a byte buffer backed by a [`Transport`].
//!
//! RFB and the host's clipboard channel protocol disagree on byte order, so
//! this module deliberately does not expose one generic "read a u16" helper
//! shared by both paths — see [`BeReader`]/[`LeReader`] and their `Writer`
//! counterparts, each spelled out for its own direction.

use crate::error::{RfbError, Result};
use crate::transport::Transport;
use bytes::{Buf, BufMut, BytesMut};

/// Reads exactly `buf.len()` bytes from `transport`, retrying short reads.
///
/// Callers never see a partial read: a non-blocking transport surfaces
/// [`std::io::ErrorKind::WouldBlock`] which this loop retries; anything else
/// propagates.
pub fn force_read(transport: &mut dyn Transport, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match transport.read(&mut buf[filled..]) {
            Ok(0) => return Err(RfbError::protocol("peer closed connection mid-read")),
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(RfbError::Transport(e)),
        }
    }
    Ok(())
}

/// Writes the entire buffer to `transport`, retrying short/blocked writes.
pub fn force_write(transport: &mut dyn Transport, buf: &[u8]) -> Result<()> {
    let mut sent = 0;
    while sent < buf.len() {
        match transport.write(&buf[sent..]) {
            Ok(0) => return Err(RfbError::protocol("transport accepted zero bytes")),
            Ok(n) => sent += n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => continue,
            Err(e) => return Err(RfbError::Transport(e)),
        }
    }
    Ok(())
}

/// Reads an RFB (big-endian) primitive of exactly `N` bytes from the transport.
pub fn read_be_bytes<const N: usize>(transport: &mut dyn Transport) -> Result<[u8; N]> {
    let mut buf = [0u8; N];
    force_read(transport, &mut buf)?;
    Ok(buf)
}

/// Reads a big-endian `u8` (degenerate, but keeps call sites uniform).
pub fn read_be_u8(transport: &mut dyn Transport) -> Result<u8> {
    Ok(read_be_bytes::<1>(transport)?[0])
}

/// Reads a big-endian `u16` from the RFB wire.
pub fn read_be_u16(transport: &mut dyn Transport) -> Result<u16> {
    Ok(u16::from_be_bytes(read_be_bytes::<2>(transport)?))
}

/// Reads a big-endian `u32` from the RFB wire.
pub fn read_be_u32(transport: &mut dyn Transport) -> Result<u32> {
    Ok(u32::from_be_bytes(read_be_bytes::<4>(transport)?))
}

/// Reads `n` bytes of padding and discards them.
pub fn skip(transport: &mut dyn Transport, n: usize) -> Result<()> {
    let mut buf = vec![0u8; n];
    force_read(transport, &mut buf)
}

/// Reads `len` raw bytes from the RFB wire.
pub fn read_exact_vec(transport: &mut dyn Transport, len: usize) -> Result<Vec<u8>> {
    let mut buf = vec![0u8; len];
    force_read(transport, &mut buf)?;
    Ok(buf)
}

/// A little-endian cursor over an in-memory buffer, for the host clipboard
/// channel's wire format (`u16`/`u32` fields are LE, unlike RFB).
pub struct LeCursor<'a> {
    buf: &'a mut BytesMut,
}

impl<'a> LeCursor<'a> {
    /// Wraps a buffer for little-endian reads.
    pub fn new(buf: &'a mut BytesMut) -> Self {
        Self { buf }
    }

    /// Reads a little-endian `u16`, erroring if the buffer is short.
    pub fn get_u16(&mut self) -> Result<u16> {
        if self.buf.len() < 2 {
            return Err(RfbError::protocol("clipboard message truncated (u16)"));
        }
        Ok(self.buf.get_u16_le())
    }

    /// Reads a little-endian `u32`, erroring if the buffer is short.
    pub fn get_u32(&mut self) -> Result<u32> {
        if self.buf.len() < 4 {
            return Err(RfbError::protocol("clipboard message truncated (u32)"));
        }
        Ok(self.buf.get_u32_le())
    }

    /// Reads `n` raw bytes.
    pub fn get_bytes(&mut self, n: usize) -> Result<Vec<u8>> {
        if self.buf.len() < n {
            return Err(RfbError::protocol("clipboard message truncated (bytes)"));
        }
        let mut out = vec![0u8; n];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Number of bytes remaining in the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}

/// Appends a little-endian clipboard-channel message header.
pub fn put_le_header(out: &mut BytesMut, msg_type: u16, status: u16, length: u32) {
    out.put_u16_le(msg_type);
    out.put_u16_le(status);
    out.put_u32_le(length);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemTransport;

    #[test]
    fn force_read_retries_would_block() {
        let mut t = MemTransport::with_reads(vec![vec![1, 2], vec![3, 4]]);
        let mut buf = [0u8; 4];
        force_read(&mut t, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn read_be_u16_matches_big_endian() {
        let mut t = MemTransport::with_reads(vec![vec![0x01, 0x02]]);
        assert_eq!(read_be_u16(&mut t).unwrap(), 0x0102);
    }

    #[test]
    fn le_cursor_reads_little_endian() {
        let mut buf = BytesMut::from(&[0x02, 0x00, 0x01, 0x00, 0x00, 0x00][..]);
        let mut cur = LeCursor::new(&mut buf);
        assert_eq!(cur.get_u16().unwrap(), 2);
        assert_eq!(cur.get_u32().unwrap(), 1);
    }
}
