//! The host-provided callback surface (spec §6).
//!
//! Function-pointer callbacks are the only polymorphic surface in this
//! module (spec §9 Design Notes); in Rust that's a trait object owned by the
//! session rather than a vtable of raw function pointers. Implementations
//! must not re-enter the session's public surface from within a callback
//! except between framebuffer rectangles (spec §5).

/// Severity passed to [`HostCallbacks::msg`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MsgLevel {
    Info,
    Warning,
    Error,
}

/// Callbacks the session invokes to hand the host painted pixels, cursor
/// shapes, palette updates, and lifecycle notifications.
pub trait HostCallbacks: Send {
    /// Brackets a run of rectangle-paint calls.
    fn begin_update(&mut self);

    /// Ends a run of rectangle-paint calls.
    fn end_update(&mut self);

    /// Paints `w x h` pixels of `bytes` at `(x, y)`. `stride_w`/`stride_h`
    /// describe the source buffer's full dimensions when it's larger than
    /// the painted rectangle; `src_x`/`src_y` is the read offset into it.
    #[allow(clippy::too_many_arguments)]
    fn paint_rect(
        &mut self,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
        bytes: &[u8],
        stride_w: u16,
        stride_h: u16,
        src_x: u16,
        src_y: u16,
    );

    /// A CopyRect: blit `w x h` from `(src_x, src_y)` to `(dst_x, dst_y)`.
    fn screen_blt(&mut self, dst_x: u16, dst_y: u16, w: u16, h: u16, src_x: u16, src_y: u16);

    /// Sets the host's cursor shape: 32x32, 24-bit color `data` and a 1bpp
    /// `mask` (1 = opaque), hotspot clamped into `[0,31]` by the caller.
    fn set_cursor(&mut self, hot_x: u8, hot_y: u8, data: &[u8], mask: &[u8]);

    /// Applies a 256-entry ARGB palette (color-mapped pixel formats only).
    fn palette(&mut self, argb_table: &[u32; 256]);

    /// The server rang the bell.
    fn bell(&mut self);

    /// A diagnostic message from the session.
    fn msg(&mut self, text: &str, level: MsgLevel);

    /// The server's geometry or pixel format changed; the downstream client
    /// must be resized/reinitialized to match.
    fn reset(&mut self, w: u16, h: u16, bpp: u8);

    /// Sets the foreground color used by a following `fill_rect` (rare path,
    /// kept for host-side solid-fill acceleration).
    fn set_fgcolor(&mut self, color: u32);

    /// Fills a rectangle with the current foreground color.
    fn fill_rect(&mut self, x: u16, y: u16, w: u16, h: u16);

    /// Sends raw bytes to a host virtual channel (used by the clipboard
    /// bridge). `total`/`flags` describe chunking for channels that split
    /// large payloads; this module always sends single-chunk messages.
    fn send_to_channel(&mut self, chan: u32, bytes: &[u8], len: u32, total: u32, flags: u32);

    /// Resolves a channel name (e.g. `"cliprdr"`) to its numeric id.
    fn get_channel_id(&mut self, name: &str) -> Option<u32>;
}

/// A null-object implementation useful for tests and headless embedding: it
/// records nothing and does nothing but satisfies the trait.
#[derive(Default)]
pub struct NullCallbacks;

impl HostCallbacks for NullCallbacks {
    fn begin_update(&mut self) {}
    fn end_update(&mut self) {}
    fn paint_rect(
        &mut self,
        _x: u16,
        _y: u16,
        _w: u16,
        _h: u16,
        _bytes: &[u8],
        _stride_w: u16,
        _stride_h: u16,
        _src_x: u16,
        _src_y: u16,
    ) {
    }
    fn screen_blt(&mut self, _dst_x: u16, _dst_y: u16, _w: u16, _h: u16, _src_x: u16, _src_y: u16) {}
    fn set_cursor(&mut self, _hot_x: u8, _hot_y: u8, _data: &[u8], _mask: &[u8]) {}
    fn palette(&mut self, _argb_table: &[u32; 256]) {}
    fn bell(&mut self) {}
    fn msg(&mut self, _text: &str, _level: MsgLevel) {}
    fn reset(&mut self, _w: u16, _h: u16, _bpp: u8) {}
    fn set_fgcolor(&mut self, _color: u32) {}
    fn fill_rect(&mut self, _x: u16, _y: u16, _w: u16, _h: u16) {}
    fn send_to_channel(&mut self, _chan: u32, _bytes: &[u8], _len: u32, _total: u32, _flags: u32) {}
    fn get_channel_id(&mut self, _name: &str) -> Option<u32> {
        None
    }
}
