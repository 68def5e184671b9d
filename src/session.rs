//! Session controller (spec §4.H): handshake, steady-state message loop,
//! and the host-facing lifecycle surface.

use std::time::Duration;

use bytes::{BufMut, BytesMut};
use log::{debug, info, warn};

use crate::auth::{check_auth_result, response_for_guid, response_for_password};
use crate::callbacks::{HostCallbacks, MsgLevel};
use crate::clipboard::ClipboardBridge;
use crate::config::SessionParams;
use crate::decoder::FramebufferUpdateDecoder;
use crate::error::{RfbError, Result};
use crate::pixelformat::PixelFormat;
use crate::protocol::*;
use crate::resize::{NegotiationOutcome, ResizeNegotiator, ResizeState, UpdateRequestShape};
use crate::screen::ScreenLayout;
use crate::transport::{TcpTransport, Transport};
use crate::wire;

/// Host mouse message codes (spec §6 "Mouse encoding").
pub const MSG_MOUSE_MOVE: u16 = 100;
pub const MSG_MOUSE_BUTTON1_UP: u16 = 101;
pub const MSG_MOUSE_BUTTON1_DOWN: u16 = 102;
pub const MSG_MOUSE_BUTTON3_UP: u16 = 103;
pub const MSG_MOUSE_BUTTON3_DOWN: u16 = 104;
pub const MSG_MOUSE_BUTTON2_UP: u16 = 105;
pub const MSG_MOUSE_BUTTON2_DOWN: u16 = 106;
pub const MSG_MOUSE_WHEEL_UP_OFF: u16 = 107;
pub const MSG_MOUSE_WHEEL_UP_ON: u16 = 108;
pub const MSG_MOUSE_WHEEL_DOWN_OFF: u16 = 109;
pub const MSG_MOUSE_WHEEL_DOWN_ON: u16 = 110;
/// Invalidate-rectangle request (spec §6 "Invalidate").
pub const MSG_INVALIDATE: u16 = 200;

const BUTTON1_BIT: u8 = 1 << 0;
const BUTTON2_BIT: u8 = 1 << 1;
const BUTTON3_BIT: u8 = 1 << 2;
const WHEEL_UP_BIT: u8 = 1 << 3;
const WHEEL_DOWN_BIT: u8 = 1 << 4;

/// Default encodings this module always advertises (spec §4.H step 10).
const BASE_ENCODINGS: [i32; 4] = [
    ENCODING_RAW,
    ENCODING_COPYRECT,
    ENCODING_CURSOR,
    ENCODING_DESKTOP_SIZE,
];

/// Bounds a rectangle region for an update request or invalidate call.
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    pub x: u16,
    pub y: u16,
    pub w: u16,
    pub h: u16,
}

/// The RFB client session: one per upstream connection (spec §3 "Session").
pub struct Session {
    transport: Option<Box<dyn Transport>>,
    params: SessionParams,
    pixel_format: PixelFormat,
    server_width: u16,
    server_height: u16,
    server_bpp: u8,
    enabled_encodings_mask: u32,
    resize: ResizeNegotiator,
    clipboard: ClipboardBridge,
    keymap: crate::keymap::Keymap,
    button_mask: u8,
    suppressed: bool,
    suppress_rect: Rect,
    callbacks: Box<dyn HostCallbacks>,
}

impl Session {
    /// Creates a fresh, unconnected session (spec §6 `init`).
    pub fn init(callbacks: Box<dyn HostCallbacks>) -> Self {
        Self {
            transport: None,
            params: SessionParams::new(),
            pixel_format: PixelFormat::canonical_24(),
            server_width: 0,
            server_height: 0,
            server_bpp: 24,
            enabled_encodings_mask: MASK_EXTENDED_DESKTOP_SIZE,
            resize: ResizeNegotiator::new(ScreenLayout::single(0, 0, 0, 0)),
            clipboard: ClipboardBridge::new(),
            keymap: crate::keymap::Keymap::new(),
            button_mask: 0,
            suppressed: false,
            suppress_rect: Rect { x: 0, y: 0, w: 0, h: 0 },
            callbacks,
        }
    }

    /// Applies one `set_param` pair (spec §6).
    pub fn set_param(&mut self, name: &str, value: &str) {
        self.params.set_param(name, value);
    }

    /// Records the downstream client's initial canvas size and desired
    /// color depth (spec §6 `start`). Must be called before [`Self::connect`].
    pub fn start(&mut self, width: u16, height: u16, bpp: u8) -> Result<()> {
        PixelFormat::canonical(bpp)?; // validates bpp (spec §4.H step 1)
        self.server_bpp = bpp;
        self.resize = ResizeNegotiator::new(ScreenLayout::single(0, width, height, 0));
        Ok(())
    }

    /// The raw fd the host can register with its own reactor
    /// (spec §6 `get_wait_objs`).
    pub fn get_wait_objs(&self) -> Option<std::os::unix::io::RawFd> {
        self.transport.as_deref().and_then(Transport::raw_fd)
    }

    /// Services one readable event on the transport (spec §6
    /// `check_wait_objs`).
    pub fn check_wait_objs(&mut self) -> Result<()> {
        let msg_type = {
            let transport = self.transport_mut()?;
            wire::read_be_u8(transport)?
        };
        match msg_type {
            SERVER_MSG_FRAMEBUFFER_UPDATE => self.handle_framebuffer_update(),
            SERVER_MSG_SET_COLOUR_MAP_ENTRIES => self.handle_set_colour_map_entries(),
            SERVER_MSG_BELL => {
                self.callbacks.bell();
                Ok(())
            }
            SERVER_MSG_CUT_TEXT => self.handle_server_cut_text(),
            other => Err(RfbError::protocol(format!("unknown server message type {other}"))),
        }
    }

    /// Connects to the configured `ip:port` and runs the full handshake
    /// (spec §4.H steps 2-13).
    pub fn connect(&mut self) -> Result<()> {
        if self.params.ip.is_empty() {
            return Err(RfbError::config("ip must not be empty"));
        }

        if self.params.delay_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.params.delay_ms));
        }

        let addr = format!("{}:{}", self.params.ip, self.params.port);
        let transport = TcpTransport::connect(addr, Duration::from_secs(3))?;
        self.transport = Some(Box::new(transport));

        self.negotiate_version()?;
        self.negotiate_security()?;
        self.send_share_flag()?;
        self.read_server_init()?;
        self.send_set_pixel_format()?;
        self.send_set_encodings()?;

        self.resize = ResizeNegotiator::new(self.resize.client_layout().clone());
        self.send_update_request_shape(UpdateRequestShape::FullTiny)?;

        self.install_default_cursor();
        self.open_clipboard_channel()?;

        info!("rfb session connected to {}:{}", self.params.ip, self.params.port);
        Ok(())
    }

    fn transport_mut(&mut self) -> Result<&mut dyn Transport> {
        self.transport
            .as_deref_mut()
            .ok_or_else(|| RfbError::protocol("session has no transport bound"))
    }

    fn negotiate_version(&mut self) -> Result<()> {
        let transport = self.transport_mut()?;
        let server_version = wire::read_be_bytes::<12>(transport)?;
        debug!(
            "rfb: server offered {:?}, replying with 003.003 (only version supported)",
            String::from_utf8_lossy(&server_version)
        );
        wire::force_write(transport, PROTOCOL_VERSION)?;
        Ok(())
    }

    fn negotiate_security(&mut self) -> Result<()> {
        let security_type = {
            let transport = self.transport_mut()?;
            wire::read_be_u32(transport)?
        };
        match security_type {
            SECURITY_TYPE_INVALID => {
                let transport = self.transport_mut()?;
                let len = wire::read_be_u32(transport)? as usize;
                let reason = wire::read_exact_vec(transport, len)?;
                Err(RfbError::auth(format!(
                    "server refused connection: {}",
                    String::from_utf8_lossy(&reason)
                )))
            }
            SECURITY_TYPE_NONE => Ok(()),
            SECURITY_TYPE_VNC_AUTH => {
                let challenge = {
                    let transport = self.transport_mut()?;
                    wire::read_be_bytes::<16>(transport)?
                };
                let response = if let Some(guid) = self.params.guid {
                    response_for_guid(&guid, &challenge)
                } else {
                    response_for_password(&self.params.password, &challenge)
                };
                let transport = self.transport_mut()?;
                wire::force_write(transport, &response)?;
                let result = wire::read_be_u32(transport)?;
                check_auth_result(result)
            }
            other => Err(RfbError::auth(format!("unsupported security type {other}"))),
        }
    }

    fn send_share_flag(&mut self) -> Result<()> {
        let transport = self.transport_mut()?;
        wire::force_write(transport, &[1])
    }

    fn read_server_init(&mut self) -> Result<()> {
        let transport = self.transport_mut()?;
        self.server_width = wire::read_be_u16(transport)?;
        self.server_height = wire::read_be_u16(transport)?;
        let mut pf_bytes = BytesMut::from(&wire::read_exact_vec(transport, 16)?[..]);
        let _discarded_pixel_format = PixelFormat::from_bytes(&mut pf_bytes)?;
        let name_len = wire::read_be_u32(transport)? as usize;
        if name_len > 255 {
            return Err(RfbError::protocol("server name too long"));
        }
        let _name = wire::read_exact_vec(transport, name_len)?;
        Ok(())
    }

    fn send_set_pixel_format(&mut self) -> Result<()> {
        self.pixel_format = PixelFormat::canonical(self.server_bpp)?;
        let mut buf = BytesMut::with_capacity(20);
        buf.put_u8(CLIENT_MSG_SET_PIXEL_FORMAT);
        buf.put_bytes(0, 3);
        self.pixel_format.write_to(&mut buf);
        let transport = self.transport_mut()?;
        wire::force_write(transport, &buf)
    }

    fn send_set_encodings(&mut self) -> Result<()> {
        let effective_mask = self.enabled_encodings_mask & self.params.disabled_encodings_mask;
        let mut encodings = BASE_ENCODINGS.to_vec();
        if effective_mask & MASK_EXTENDED_DESKTOP_SIZE != 0 {
            encodings.push(ENCODING_EXTENDED_DESKTOP_SIZE);
        }

        let mut buf = BytesMut::with_capacity(4 + encodings.len() * 4);
        buf.put_u8(CLIENT_MSG_SET_ENCODINGS);
        buf.put_u8(0);
        buf.put_u16(encodings.len() as u16);
        for e in encodings {
            buf.put_u32(e as u32);
        }
        let transport = self.transport_mut()?;
        wire::force_write(transport, &buf)
    }

    fn install_default_cursor(&mut self) {
        // A small opaque dot at the top-left of a 32x32 24-bit cursor
        // buffer (spec §4.H step 12 "little dot default cursor").
        let mut data = vec![0u8; 32 * 32 * 3];
        let mut mask = vec![1u8; 32 * 32]; // 1 = transparent everywhere...
        for y in 0..4usize {
            for x in 0..4usize {
                let idx = y * 32 + x;
                mask[idx] = 0; // ...except a 4x4 opaque dot.
                data[idx * 3] = 0xff;
                data[idx * 3 + 1] = 0xff;
                data[idx * 3 + 2] = 0xff;
            }
        }
        self.callbacks.set_cursor(0, 0, &data, &mask);
    }

    fn open_clipboard_channel(&mut self) -> Result<()> {
        let id = self.callbacks.get_channel_id(ClipboardBridge::channel_name());
        self.clipboard.set_channel_id(id);
        if let Some(id) = id {
            let greeting = ClipboardBridge::greeting();
            let len = greeting.len() as u32;
            self.callbacks.send_to_channel(id, &greeting, len, len, 0);
        }
        Ok(())
    }

    fn handle_framebuffer_update(&mut self) -> Result<()> {
        let decoded = {
            let transport = self
                .transport
                .as_deref_mut()
                .ok_or_else(|| RfbError::protocol("session has no transport bound"))?;
            FramebufferUpdateDecoder::decode(transport, &self.pixel_format, self.callbacks.as_mut())?
        };

        if self.resize.state() != ResizeState::Done {
            let outcome = self
                .resize
                .handle_update(&decoded.eds_rects, (self.server_width, self.server_height));
            self.apply_negotiation_outcome(outcome)?;
        } else {
            for &(w, h) in &decoded.desktop_size_rects {
                self.server_width = w;
                self.server_height = h;
                self.callbacks.reset(w, h, self.server_bpp);
            }
            for eds in &decoded.eds_rects {
                if eds.origin != 1 {
                    self.server_width = eds.total_width;
                    self.server_height = eds.total_height;
                    if eds.layout.is_single_screen() {
                        self.callbacks.reset(eds.total_width, eds.total_height, self.server_bpp);
                    } else {
                        warn!("resize: server sent a multi-screen layout, downstream resize not attempted");
                    }
                }
            }
            if !self.suppressed {
                self.send_update_request(true, 0, 0, self.server_width, self.server_height)?;
            }
        }
        Ok(())
    }

    fn apply_negotiation_outcome(&mut self, outcome: NegotiationOutcome) -> Result<()> {
        if let Some(bytes) = outcome.set_desktop_size {
            let transport = self.transport_mut()?;
            wire::force_write(transport, &bytes)?;
        }
        if let Some((w, h)) = outcome.reset_downstream {
            self.server_width = w;
            self.server_height = h;
            self.callbacks.reset(w, h, self.server_bpp);
        }
        if let Some(shape) = outcome.next_request {
            self.send_update_request_shape(shape)?;
        } else if self.resize.state() == ResizeState::Done {
            self.send_update_request(true, 0, 0, self.server_width, self.server_height)?;
        }
        Ok(())
    }

    fn send_update_request_shape(&mut self, shape: UpdateRequestShape) -> Result<()> {
        match shape {
            UpdateRequestShape::FullTiny => self.send_update_request(false, 0, 0, 1, 1),
            UpdateRequestShape::IncrementalTiny => self.send_update_request(true, 0, 0, 1, 1),
        }
    }

    fn send_update_request(&mut self, incremental: bool, x: u16, y: u16, w: u16, h: u16) -> Result<()> {
        let mut buf = BytesMut::with_capacity(10);
        buf.put_u8(CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST);
        buf.put_u8(u8::from(incremental));
        buf.put_u16(x);
        buf.put_u16(y);
        buf.put_u16(w);
        buf.put_u16(h);
        let transport = self.transport_mut()?;
        wire::force_write(transport, &buf)
    }

    fn handle_set_colour_map_entries(&mut self) -> Result<()> {
        let (first_color, num_colors) = {
            let transport = self.transport_mut()?;
            wire::skip(transport, 1)?;
            let first_color = wire::read_be_u16(transport)?;
            let num_colors = wire::read_be_u16(transport)?;
            (first_color, num_colors)
        };

        let mut table = [0u32; 256];
        for i in 0..num_colors {
            let transport = self.transport_mut()?;
            let r = wire::read_be_u16(transport)? >> 8;
            let g = wire::read_be_u16(transport)? >> 8;
            let b = wire::read_be_u16(transport)? >> 8;
            let idx = first_color as u32 + i as u32;
            if idx < 256 {
                table[idx as usize] = ((r as u32) << 16) | ((g as u32) << 8) | b as u32;
            }
        }
        self.callbacks.begin_update();
        self.callbacks.palette(&table);
        self.callbacks.end_update();
        Ok(())
    }

    fn handle_server_cut_text(&mut self) -> Result<()> {
        let transport = self
            .transport
            .as_deref_mut()
            .ok_or_else(|| RfbError::protocol("session has no transport bound"))?;
        let callbacks = &mut self.callbacks;
        self.clipboard.handle_server_cut_text(transport, |chan, bytes| {
            let len = bytes.len() as u32;
            callbacks.send_to_channel(chan, bytes, len, len, 0);
        })
    }

    /// Handles one host channel-data delivery (spec §6 "Channel-data
    /// entry", host msg `0x5555`). Exposed as its own typed method since
    /// the byte payload can't ride along the `event` entry point's
    /// fixed-width parameters.
    pub fn channel_data(&mut self, channel_id: u32, bytes: &[u8]) -> Result<()> {
        const MAX_CHANNEL_DATA: usize = 32 * 1024;
        if bytes.len() > MAX_CHANNEL_DATA {
            return Err(RfbError::protocol("channel payload exceeds 32 KiB"));
        }
        if Some(channel_id) != self.clipboard.channel_id() {
            debug!("channel_data: ignoring data for unknown channel {channel_id}");
            return Ok(());
        }
        let mut sent_to_server = Vec::new();
        let mut replies = Vec::new();
        self.clipboard.handle_channel_message(
            bytes,
            |r| replies.push(r.to_vec()),
            |m| sent_to_server.push(m.to_vec()),
        )?;
        for msg in &sent_to_server {
            let transport = self.transport_mut()?;
            wire::force_write(transport, msg)?;
        }
        if let Some(id) = self.clipboard.channel_id() {
            for reply in replies {
                let len = reply.len() as u32;
                self.callbacks.send_to_channel(id, &reply, len, len, 0);
            }
        }
        Ok(())
    }

    /// Dispatches a mouse, channel-probe, or invalidate event (spec §6
    /// `event`, the sole entry point for `msg` in `[100,110]` and `200`).
    pub fn event(&mut self, msg: u16, p1: i32, p2: i32, p3: i32, p4: i32) -> Result<()> {
        match msg {
            MSG_MOUSE_MOVE => self.send_pointer_event(p1 as u16, p2 as u16),
            MSG_MOUSE_BUTTON1_UP => self.mouse_button(p1, p2, BUTTON1_BIT, false),
            MSG_MOUSE_BUTTON1_DOWN => self.mouse_button(p1, p2, BUTTON1_BIT, true),
            MSG_MOUSE_BUTTON3_UP => self.mouse_button(p1, p2, BUTTON3_BIT, false),
            MSG_MOUSE_BUTTON3_DOWN => self.mouse_button(p1, p2, BUTTON3_BIT, true),
            MSG_MOUSE_BUTTON2_UP => self.mouse_button(p1, p2, BUTTON2_BIT, false),
            MSG_MOUSE_BUTTON2_DOWN => self.mouse_button(p1, p2, BUTTON2_BIT, true),
            MSG_MOUSE_WHEEL_UP_OFF => self.mouse_button(p1, p2, WHEEL_UP_BIT, false),
            MSG_MOUSE_WHEEL_UP_ON => self.mouse_button(p1, p2, WHEEL_UP_BIT, true),
            MSG_MOUSE_WHEEL_DOWN_OFF => self.mouse_button(p1, p2, WHEEL_DOWN_BIT, false),
            MSG_MOUSE_WHEEL_DOWN_ON => self.mouse_button(p1, p2, WHEEL_DOWN_BIT, true),
            MSG_INVALIDATE => {
                let x = (p1 >> 16) as u16;
                let y = p1 as u16;
                let w = (p2 >> 16) as u16;
                let h = p2 as u16;
                let _ = (p3, p4);
                if !self.suppressed {
                    self.send_update_request(false, x, y, w, h)?;
                }
                Ok(())
            }
            other => Err(RfbError::protocol(format!("unknown event message {other}"))),
        }
    }

    fn mouse_button(&mut self, x: i32, y: i32, bit: u8, down: bool) -> Result<()> {
        if down {
            self.button_mask |= bit;
        } else {
            self.button_mask &= !bit;
        }
        self.send_pointer_event(x as u16, y as u16)
    }

    fn send_pointer_event(&mut self, x: u16, y: u16) -> Result<()> {
        let mut buf = BytesMut::with_capacity(6);
        buf.put_u8(CLIENT_MSG_POINTER_EVENT);
        buf.put_u8(self.button_mask);
        buf.put_u16(x);
        buf.put_u16(y);
        let transport = self.transport_mut()?;
        wire::force_write(transport, &buf)
    }

    /// Translates and sends one keyboard event (spec §4.D, §6 `handle_key`).
    pub fn handle_key(&mut self, scancode: i32, direction_flag: i32) -> Result<()> {
        let events = self.keymap.handle_key(scancode, direction_flag);
        for event in events {
            let mut buf = BytesMut::with_capacity(8);
            buf.put_u8(CLIENT_MSG_KEY_EVENT);
            buf.put_u8(u8::from(event.down));
            buf.put_u16(0);
            buf.put_u32(event.sym);
            let transport = self.transport_mut()?;
            wire::force_write(transport, &buf)?;
        }
        Ok(())
    }

    /// Suppresses/unsuppresses framebuffer-update traffic (spec §6
    /// `suppress_output`); unsuppressing sends a full update request.
    pub fn suppress_output(&mut self, suppress: bool, l: u16, t: u16, r: u16, b: u16) -> Result<()> {
        let was_suppressed = self.suppressed;
        self.suppressed = suppress;
        self.suppress_rect = Rect { x: l, y: t, w: r.saturating_sub(l), h: b.saturating_sub(t) };
        if was_suppressed && !suppress {
            self.send_update_request(false, 0, 0, self.server_width, self.server_height)?;
        }
        Ok(())
    }

    /// Collapses to a single-screen layout and restarts the resize
    /// negotiation at `WaitingFirstUpdate` (spec §6 `server_monitor_resize`).
    pub fn server_monitor_resize(&mut self, width: u16, height: u16) -> Result<()> {
        self.resize.restart(ScreenLayout::single(0, width, height, 0));
        self.send_update_request_shape(UpdateRequestShape::FullTiny)
    }

    /// Tears the session down (spec §6 `exit`). No reconnection surface;
    /// the host is expected to drop the session afterward.
    pub fn exit(&mut self) {
        self.transport = None;
        self.callbacks.msg("session closed", MsgLevel::Info);
    }
}
