//! Framebuffer-update decoder: per-rectangle dispatch over Raw, CopyRect,
//! Cursor, DesktopSize, and ExtendedDesktopSize (spec §4.G).

use log::warn;

use crate::callbacks::HostCallbacks;
use crate::pixelformat::PixelFormat;
use crate::protocol::{
    ENCODING_COPYRECT, ENCODING_CURSOR, ENCODING_DESKTOP_SIZE, ENCODING_EXTENDED_DESKTOP_SIZE,
    ENCODING_RAW,
};
use crate::resize::EdsRect;
use crate::screen::ScreenLayout;
use crate::transport::Transport;
use crate::error::Result;
use crate::wire;

/// Everything the session needs to know after one `FramebufferUpdate`
/// finished decoding: any resize-relevant rectangles that were observed,
/// so the session/negotiator can react without the decoder owning resize
/// state itself.
#[derive(Debug, Default)]
pub struct DecodedUpdate {
    /// `DesktopSize` rectangles, in wire order.
    pub desktop_size_rects: Vec<(u16, u16)>,
    /// `ExtendedDesktopSize` rectangles, in wire order.
    pub eds_rects: Vec<EdsRect>,
}

/// Decodes one `FramebufferUpdate` message body (the `u8 pad, u16 num_rects`
/// header has already been read by the caller... actually this reads the
/// header itself). Raw/CopyRect/Cursor rectangles are painted immediately
/// through `callbacks`; DesktopSize/ExtendedDesktopSize rectangles are
/// collected and returned for the session to apply, since their effect
/// depends on the current resize-negotiation state.
pub struct FramebufferUpdateDecoder;

impl FramebufferUpdateDecoder {
    /// Reads and dispatches one complete `FramebufferUpdate` body.
    pub fn decode(
        transport: &mut dyn Transport,
        pixel_format: &PixelFormat,
        callbacks: &mut dyn HostCallbacks,
    ) -> Result<DecodedUpdate> {
        wire::skip(transport, 1)?;
        let num_rects = wire::read_be_u16(transport)?;

        let mut out = DecodedUpdate::default();
        callbacks.begin_update();
        for _ in 0..num_rects {
            let x = wire::read_be_u16(transport)?;
            let y = wire::read_be_u16(transport)?;
            let w = wire::read_be_u16(transport)?;
            let h = wire::read_be_u16(transport)?;
            let encoding = wire::read_be_u32(transport)? as i32;

            match encoding {
                ENCODING_RAW => Self::decode_raw(transport, pixel_format, callbacks, x, y, w, h)?,
                ENCODING_COPYRECT => Self::decode_copyrect(transport, callbacks, x, y, w, h)?,
                ENCODING_CURSOR => Self::decode_cursor(transport, pixel_format, callbacks, x, y, w, h)?,
                ENCODING_DESKTOP_SIZE => {
                    out.desktop_size_rects.push((w, h));
                }
                ENCODING_EXTENDED_DESKTOP_SIZE => {
                    out.eds_rects.push(Self::decode_eds(transport, x, y, w, h)?);
                }
                other => {
                    warn!("framebuffer update: unknown encoding {other}, aborting this update");
                    break;
                }
            }
        }
        callbacks.end_update();
        Ok(out)
    }

    fn decode_raw(
        transport: &mut dyn Transport,
        pixel_format: &PixelFormat,
        callbacks: &mut dyn HostCallbacks,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let bpp = pixel_format.bytes_per_pixel();
        let n = w as usize * h as usize * bpp;
        let bytes = wire::read_exact_vec(transport, n)?;
        callbacks.paint_rect(x, y, w, h, &bytes, w, h, 0, 0);
        Ok(())
    }

    fn decode_copyrect(
        transport: &mut dyn Transport,
        callbacks: &mut dyn HostCallbacks,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let src_x = wire::read_be_u16(transport)?;
        let src_y = wire::read_be_u16(transport)?;
        callbacks.screen_blt(x, y, w, h, src_x, src_y);
        Ok(())
    }

    /// Cursor pseudo-encoding: color plane + bitmask, repainted into a
    /// fixed 32x32 24-bit host cursor buffer with vertical flip (spec §4.G).
    /// `x,y` is the rectangle's hotspot, clamped into `[0,31]`.
    fn decode_cursor(
        transport: &mut dyn Transport,
        pixel_format: &PixelFormat,
        callbacks: &mut dyn HostCallbacks,
        x: u16,
        y: u16,
        w: u16,
        h: u16,
    ) -> Result<()> {
        let bpp = pixel_format.bytes_per_pixel();
        let color_len = w as usize * h as usize * bpp;
        let mask_row_bytes = (w as usize + 7) / 8;
        let mask_len = mask_row_bytes * h as usize;

        let color = wire::read_exact_vec(transport, color_len)?;
        let mask = wire::read_exact_vec(transport, mask_len)?;

        const DIM: usize = 32;
        let dst_24 = PixelFormat::canonical_24();
        let mut data = vec![0u8; DIM * DIM * 3];
        let mut out_mask = vec![0u8; DIM * DIM];

        for src_y in 0..(h as usize).min(DIM) {
            for src_x in 0..(w as usize).min(DIM) {
                let pixel = read_pixel(&color, pixel_format, src_x, src_y, w as usize);
                let (r, g, b) = pixel_format.split_color(pixel);
                let rgb = dst_24.make_color(r, g, b);
                let bytes24 = rgb.to_be_bytes();

                // 1 = opaque in RFB, inverted so 1 = transparent in host convention.
                let mask_bit = (mask[src_y * mask_row_bytes + src_x / 8] >> (7 - (src_x % 8))) & 1;
                let host_mask_bit = 1 - mask_bit;

                let dst_y = DIM - 1 - src_y;
                let dst_idx = dst_y * DIM + src_x;
                data[dst_idx * 3] = bytes24[1];
                data[dst_idx * 3 + 1] = bytes24[2];
                data[dst_idx * 3 + 2] = bytes24[3];
                out_mask[dst_idx] = host_mask_bit;
            }
        }

        let hot_x = x.min(31) as u8;
        let hot_y = y.min(31) as u8;
        callbacks.set_cursor(hot_x, hot_y, &data, &out_mask);
        Ok(())
    }

    fn decode_eds(
        transport: &mut dyn Transport,
        x: u16,
        y: u16,
        total_w: u16,
        total_h: u16,
    ) -> Result<EdsRect> {
        let mut body = bytes::BytesMut::from(&wire::read_exact_vec(transport, 4)?[..]);
        // The screen count/pad prefix is read twice: once to learn the
        // count, once (inside ScreenLayout::read_screens) to parse the
        // list. We've already consumed the 4-byte prefix above, so hand a
        // buffer that still has it followed by the per-screen records.
        let count = body[0] as usize;
        let records = wire::read_exact_vec(transport, count * 16)?;
        body.extend_from_slice(&records);
        let layout = ScreenLayout::read_screens(&mut body, total_w, total_h)?;
        Ok(EdsRect {
            origin: x,
            status: y,
            total_width: total_w,
            total_height: total_h,
            layout,
        })
    }
}

fn read_pixel(buf: &[u8], pf: &PixelFormat, x: usize, y: usize, stride_w: usize) -> u32 {
    let bpp = pf.bytes_per_pixel();
    let off = (y * stride_w + x) * bpp;
    let slice = &buf[off..off + bpp];
    let mut v = [0u8; 4];
    v[4 - bpp..].copy_from_slice(slice);
    if pf.big_endian {
        u32::from_be_bytes(v)
    } else {
        let mut le = [0u8; 4];
        le[..bpp].copy_from_slice(slice);
        u32::from_le_bytes(le)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::callbacks::NullCallbacks;
    use crate::transport::MemTransport;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn decodes_raw_rectangle_and_calls_paint() {
        let pf = PixelFormat::canonical_24();
        let mut wire_buf = BytesMut::new();
        wire_buf.put_u8(0); // pad
        wire_buf.put_u16(1); // num_rects
        wire_buf.put_u16(0); // x
        wire_buf.put_u16(0); // y
        wire_buf.put_u16(1); // w
        wire_buf.put_u16(1); // h
        wire_buf.put_i32(ENCODING_RAW);
        wire_buf.put_slice(&[1, 2, 3, 4]); // one 32-bit-wire pixel

        let mut t = MemTransport::with_reads(vec![wire_buf.to_vec()]);
        let mut cb = NullCallbacks;
        let out = FramebufferUpdateDecoder::decode(&mut t, &pf, &mut cb).unwrap();
        assert!(out.desktop_size_rects.is_empty());
        assert!(out.eds_rects.is_empty());
    }

    #[test]
    fn unknown_encoding_aborts_update_cleanly() {
        let pf = PixelFormat::canonical_24();
        let mut wire_buf = BytesMut::new();
        wire_buf.put_u8(0);
        wire_buf.put_u16(1);
        wire_buf.put_u16(0);
        wire_buf.put_u16(0);
        wire_buf.put_u16(1);
        wire_buf.put_u16(1);
        wire_buf.put_i32(9999); // unknown encoding

        let mut t = MemTransport::with_reads(vec![wire_buf.to_vec()]);
        let mut cb = NullCallbacks;
        let out = FramebufferUpdateDecoder::decode(&mut t, &pf, &mut cb).unwrap();
        assert!(out.desktop_size_rects.is_empty());
    }

    #[test]
    fn decodes_desktop_size_rect() {
        let pf = PixelFormat::canonical_24();
        let mut wire_buf = BytesMut::new();
        wire_buf.put_u8(0);
        wire_buf.put_u16(1);
        wire_buf.put_u16(0);
        wire_buf.put_u16(0);
        wire_buf.put_u16(1920);
        wire_buf.put_u16(1080);
        wire_buf.put_i32(ENCODING_DESKTOP_SIZE);

        let mut t = MemTransport::with_reads(vec![wire_buf.to_vec()]);
        let mut cb = NullCallbacks;
        let out = FramebufferUpdateDecoder::decode(&mut t, &pf, &mut cb).unwrap();
        assert_eq!(out.desktop_size_rects, vec![(1920, 1080)]);
    }
}
