//! Host clipboard channel ↔ RFB cut-text bridge (spec §4.E).
//!
//! The host clipboard channel carries a little-endian header
//! (`u16 msg_type, u16 status, u32 length`) over a named virtual channel;
//! RFB cut-text messages are big-endian. The two never share a reader.

use bytes::{Buf, BufMut, BytesMut};
use log::{debug, warn};

use crate::error::{RfbError, Result};
use crate::transport::Transport;
use crate::wire::{self, LeCursor};

const FORMAT_ANNOUNCE: u16 = 2;
const FORMAT_ACK: u16 = 3;
const DATA_REQUEST: u16 = 4;
const DATA_RESPONSE: u16 = 5;

const CF_TEXT: u32 = 1;
const CF_UNICODETEXT: u32 = 13;

/// RFB `ClientCutText` opcode.
const RFB_CLIENT_CUT_TEXT: u8 = 6;
/// RFB `ServerCutText` opcode is dispatched by the caller; this module only
/// parses the body once the opcode byte has been consumed.
const CLIPRDR_CHANNEL_NAME: &str = "cliprdr";

/// Maximum payload bytes copied from a DATA_RESPONSE into `ClientCutText`
/// (spec §4.E).
const MAX_CLIENT_CUT_TEXT: usize = 256;

/// The four formats advertised in the FORMAT_ANNOUNCE this module sends
/// after buffering a `ServerCutText` (spec §4.E "Server→host").
const CF_OEMTEXT: u32 = 7;

const ANNOUNCED_FORMATS: [(u32, &str); 4] = [
    (CF_OEMTEXT, "CF_OEMTEXT"),
    (CF_UNICODETEXT, "CF_UNICODETEXT"),
    (16, "CF_LOCALE"),
    (CF_TEXT, "CF_TEXT"),
];

/// Payload bytes following the FORMAT_ANNOUNCE header: four
/// `(u32 format_id, [u8; 32] name)` slots.
const ANNOUNCED_FORMATS_PAYLOAD_LEN: u32 = (4 + 32) * ANNOUNCED_FORMATS.len() as u32;

/// Buffers the most recent `ServerCutText` payload, replaced wholesale by
/// each new arrival (spec §3 ClipBuffer).
#[derive(Debug, Default, Clone)]
pub struct ClipBuffer {
    bytes: Vec<u8>,
}

impl ClipBuffer {
    fn set(&mut self, bytes: Vec<u8>) {
        self.bytes = bytes;
    }
}

/// Bridges the host's named clipboard channel to RFB cut-text messages.
pub struct ClipboardBridge {
    channel_id: Option<u32>,
    buffer: ClipBuffer,
}

impl ClipboardBridge {
    pub fn new() -> Self {
        Self {
            channel_id: None,
            buffer: ClipBuffer::default(),
        }
    }

    /// The name the clipboard channel is resolved by (spec §4.E "At connect
    /// end").
    pub fn channel_name() -> &'static str {
        CLIPRDR_CHANNEL_NAME
    }

    /// The fixed 12-byte greeting sent once the channel is open.
    pub fn greeting() -> [u8; 12] {
        [1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]
    }

    /// Records the resolved channel id (or disables the bridge if the host
    /// has no such channel).
    pub fn set_channel_id(&mut self, id: Option<u32>) {
        if id.is_none() {
            debug!("clipboard: host has no '{CLIPRDR_CHANNEL_NAME}' channel, bridge disabled");
        }
        self.channel_id = id;
    }

    pub fn channel_id(&self) -> Option<u32> {
        self.channel_id
    }

    /// Handles one message arriving on the clipboard channel. `send_rfb_cut`
    /// is invoked with a fully-framed `ClientCutText` message when a
    /// DATA_RESPONSE needs to be forwarded to the server; `reply` sends a
    /// fully-framed message back to the host channel.
    pub fn handle_channel_message(
        &mut self,
        payload: &[u8],
        mut reply: impl FnMut(&[u8]),
        mut send_rfb_cut: impl FnMut(&[u8]),
    ) -> Result<()> {
        let mut buf = BytesMut::from(payload);
        let mut cur = LeCursor::new(&mut buf);
        let msg_type = cur.get_u16()?;
        let _status = cur.get_u16()?;
        let length = cur.get_u32()? as usize;
        let body = cur.get_bytes(cur.remaining().min(length))?;

        match msg_type {
            FORMAT_ANNOUNCE => {
                let mut ack = BytesMut::with_capacity(12);
                wire::put_le_header(&mut ack, FORMAT_ACK, 1, 0);
                ack.put_bytes(0, 4);
                reply(&ack);
            }
            FORMAT_ACK => {
                debug!("clipboard: host acknowledged our format announce");
            }
            DATA_REQUEST => {
                if body.len() < 4 {
                    return Err(RfbError::protocol("DATA_REQUEST missing format field"));
                }
                let format = u32::from_le_bytes([body[0], body[1], body[2], body[3]]);
                let response_bytes = match format {
                    CF_TEXT => {
                        let mut out = self.buffer.bytes.clone();
                        out.push(0);
                        Some(out)
                    }
                    CF_UNICODETEXT => {
                        let mut out = Vec::with_capacity(self.buffer.bytes.len() * 2 + 4);
                        for &b in &self.buffer.bytes {
                            out.push(b);
                            out.push(0);
                        }
                        out.push(0);
                        out.push(0);
                        Some(out)
                    }
                    other => {
                        debug!("clipboard: DATA_REQUEST for unsupported format {other}, dropping");
                        None
                    }
                };
                if let Some(data) = response_bytes {
                    let mut resp = BytesMut::with_capacity(8 + data.len() + 4);
                    wire::put_le_header(&mut resp, DATA_RESPONSE, 1, data.len() as u32);
                    resp.put_slice(&data);
                    resp.put_bytes(0, 4);
                    reply(&resp);
                }
            }
            DATA_RESPONSE => {
                let n = body.len().min(MAX_CLIENT_CUT_TEXT);
                let mut msg = BytesMut::with_capacity(8 + n);
                msg.put_u8(RFB_CLIENT_CUT_TEXT);
                msg.put_bytes(0, 3);
                msg.put_u32(n as u32);
                msg.put_slice(&body[..n]);
                send_rfb_cut(&msg);
            }
            other => {
                warn!("clipboard: unknown host channel message type {other}, ignoring");
            }
        }
        Ok(())
    }

    /// Reads a `ServerCutText` body off the RFB transport and advertises the
    /// four standard formats to the host channel (spec §4.E "Server→host").
    pub fn handle_server_cut_text(
        &mut self,
        transport: &mut dyn Transport,
        mut send_to_channel: impl FnMut(u32, &[u8]),
    ) -> Result<()> {
        wire::skip(transport, 3)?;
        let length = wire::read_be_u32(transport)? as usize;
        let bytes = wire::read_exact_vec(transport, length)?;
        self.buffer.set(bytes);

        let Some(id) = self.channel_id else {
            return Ok(());
        };
        let mut announce = BytesMut::new();
        wire::put_le_header(&mut announce, FORMAT_ANNOUNCE, 0, ANNOUNCED_FORMATS_PAYLOAD_LEN);
        for (fmt_id, name) in ANNOUNCED_FORMATS {
            announce.put_u32_le(fmt_id);
            let mut slot = [0u8; 32];
            let name_bytes = name.as_bytes();
            let n = name_bytes.len().min(32);
            slot[..n].copy_from_slice(&name_bytes[..n]);
            announce.put_slice(&slot);
        }
        announce.put_bytes(0, 4);
        send_to_channel(id, &announce);
        Ok(())
    }
}

impl Default for ClipboardBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemTransport;

    fn le_message(msg_type: u16, status: u16, body: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        wire::put_le_header(&mut buf, msg_type, status, body.len() as u32);
        buf.put_slice(body);
        buf.to_vec()
    }

    #[test]
    fn format_announce_triggers_ack() {
        let mut bridge = ClipboardBridge::new();
        let msg = le_message(FORMAT_ANNOUNCE, 0, &[]);
        let mut replies = Vec::new();
        bridge
            .handle_channel_message(&msg, |r| replies.push(r.to_vec()), |_| {})
            .unwrap();
        assert_eq!(replies.len(), 1);
        let r = &replies[0];
        assert_eq!(u16::from_le_bytes([r[0], r[1]]), FORMAT_ACK);
        assert_eq!(u16::from_le_bytes([r[2], r[3]]), 1);
        assert_eq!(u32::from_le_bytes([r[4], r[5], r[6], r[7]]), 0);
    }

    #[test]
    fn data_request_for_cf_text_returns_nul_terminated_payload() {
        let mut bridge = ClipboardBridge::new();
        bridge.buffer.set(b"Hi".to_vec());
        let mut body = Vec::new();
        body.extend_from_slice(&CF_TEXT.to_le_bytes());
        let msg = le_message(DATA_REQUEST, 0, &body);

        let mut replies = Vec::new();
        bridge
            .handle_channel_message(&msg, |r| replies.push(r.to_vec()), |_| {})
            .unwrap();
        assert_eq!(replies.len(), 1);
        let r = &replies[0];
        assert_eq!(u16::from_le_bytes([r[0], r[1]]), DATA_RESPONSE);
        let payload = &r[8..];
        assert_eq!(payload, b"Hi\0");
    }

    #[test]
    fn data_request_for_unicodetext_expands_to_u16_le_with_double_nul() {
        let mut bridge = ClipboardBridge::new();
        bridge.buffer.set(b"Hi".to_vec());
        let mut body = Vec::new();
        body.extend_from_slice(&CF_UNICODETEXT.to_le_bytes());
        let msg = le_message(DATA_REQUEST, 0, &body);

        let mut replies = Vec::new();
        bridge
            .handle_channel_message(&msg, |r| replies.push(r.to_vec()), |_| {})
            .unwrap();
        let payload = &replies[0][8..];
        assert_eq!(payload, &[b'H', 0, b'i', 0, 0, 0]);
    }

    #[test]
    fn data_response_forwards_client_cut_text_truncated_to_256() {
        let mut bridge = ClipboardBridge::new();
        let body = vec![b'x'; 400];
        let msg = le_message(DATA_RESPONSE, 1, &body);

        let mut cuts = Vec::new();
        bridge
            .handle_channel_message(&msg, |_| {}, |m| cuts.push(m.to_vec()))
            .unwrap();
        assert_eq!(cuts.len(), 1);
        let m = &cuts[0];
        assert_eq!(m[0], RFB_CLIENT_CUT_TEXT);
        let len = u32::from_be_bytes([m[4], m[5], m[6], m[7]]) as usize;
        assert_eq!(len, MAX_CLIENT_CUT_TEXT);
        assert_eq!(m.len(), 8 + MAX_CLIENT_CUT_TEXT);
    }

    #[test]
    fn server_cut_text_buffers_and_announces_four_formats() {
        let mut bridge = ClipboardBridge::new();
        bridge.channel_id = Some(7);
        let mut transport = MemTransport::with_reads(vec![
            vec![0, 0, 0], // pad
            vec![0, 0, 0, 2], // length = 2 BE
            b"Hi".to_vec(),
        ]);

        let mut sent = Vec::new();
        bridge
            .handle_server_cut_text(&mut transport, |chan, bytes| {
                sent.push((chan, bytes.to_vec()))
            })
            .unwrap();

        assert_eq!(bridge.buffer.bytes, b"Hi");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 7);
        let msg = &sent[0].1;
        assert_eq!(u16::from_le_bytes([msg[0], msg[1]]), FORMAT_ANNOUNCE);
        let length = u32::from_le_bytes([msg[4], msg[5], msg[6], msg[7]]);
        assert_eq!(length, ANNOUNCED_FORMATS_PAYLOAD_LEN);
        assert_eq!(msg.len() as u32, 8 + length + 4);
        let first_format_id = u32::from_le_bytes([msg[8], msg[9], msg[10], msg[11]]);
        assert_eq!(first_format_id, CF_OEMTEXT);
    }
}
