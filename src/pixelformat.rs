//! RFB pixel format descriptor, the canonical-format table (spec §4.B), and
//! the `split_color`/`make_color` conversion helpers used by the cursor and
//! framebuffer decoders.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{RfbError, Result};

/// A 16-octet RFB `PIXEL_FORMAT` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFormat {
    /// Bits per pixel: one of 8, 15, 16, 24, 32.
    pub bits_per_pixel: u8,
    /// Color depth in bits.
    pub depth: u8,
    /// Non-zero if multi-byte pixels are big-endian on the wire.
    pub big_endian: bool,
    /// Non-zero for true-color (this module never negotiates color-mapped).
    pub true_color: bool,
    /// Maximum value of each channel.
    pub red_max: u16,
    pub green_max: u16,
    pub blue_max: u16,
    /// Bit shift of each channel within the pixel value.
    pub red_shift: u8,
    pub green_shift: u8,
    pub blue_shift: u8,
}

impl PixelFormat {
    /// The canonical format for a given `bpp`, per the spec §4.B table.
    /// `bpp` must be one of 8, 15, 16, 24, 32.
    pub fn canonical(bpp: u8) -> Result<Self> {
        let big_endian = cfg!(target_endian = "big");
        let pf = match bpp {
            8 => PixelFormat {
                bits_per_pixel: 8,
                depth: 8,
                big_endian,
                true_color: false,
                red_max: 0,
                green_max: 0,
                blue_max: 0,
                red_shift: 0,
                green_shift: 0,
                blue_shift: 0,
            },
            15 => PixelFormat {
                bits_per_pixel: 15,
                depth: 15,
                big_endian,
                true_color: true,
                red_max: 31,
                green_max: 31,
                blue_max: 31,
                red_shift: 10,
                green_shift: 5,
                blue_shift: 0,
            },
            16 => PixelFormat {
                bits_per_pixel: 16,
                depth: 16,
                big_endian,
                true_color: true,
                red_max: 31,
                green_max: 63,
                blue_max: 31,
                red_shift: 11,
                green_shift: 5,
                blue_shift: 0,
            },
            24 => PixelFormat {
                bits_per_pixel: 24,
                depth: 24,
                big_endian,
                true_color: true,
                red_max: 255,
                green_max: 255,
                blue_max: 255,
                red_shift: 16,
                green_shift: 8,
                blue_shift: 0,
            },
            32 => PixelFormat {
                bits_per_pixel: 32,
                depth: 24,
                big_endian,
                true_color: true,
                red_max: 255,
                green_max: 255,
                blue_max: 255,
                red_shift: 16,
                green_shift: 8,
                blue_shift: 0,
            },
            other => {
                return Err(RfbError::config(format!(
                    "unsupported server bpp {other} (must be 8, 15, 16, 24, or 32)"
                )))
            }
        };
        Ok(pf)
    }

    /// The 24-bit canonical format, used when repainting cursors into the
    /// host's 24-bit cursor buffer regardless of negotiated server bpp
    /// (spec §4.B).
    pub fn canonical_24() -> Self {
        Self::canonical(24).expect("24 is always a valid bpp")
    }

    /// Bytes occupied by one pixel in this format: `ceil(bpp/8)`, except
    /// 24bpp which is packed into 4 bytes on the wire (spec §4.G).
    pub fn bytes_per_pixel(&self) -> usize {
        bytes_per_pixel(self.bits_per_pixel)
    }

    /// Serializes the 16-byte `PIXEL_FORMAT` block (spec §4.B).
    pub fn write_to(&self, buf: &mut BytesMut) {
        buf.put_u8(self.bits_per_pixel);
        buf.put_u8(self.depth);
        buf.put_u8(u8::from(self.big_endian));
        buf.put_u8(u8::from(self.true_color));
        buf.put_u16(self.red_max);
        buf.put_u16(self.green_max);
        buf.put_u16(self.blue_max);
        buf.put_u8(self.red_shift);
        buf.put_u8(self.green_shift);
        buf.put_u8(self.blue_shift);
        buf.put_bytes(0, 3);
    }

    /// Parses a `PIXEL_FORMAT` block out of the server's `ServerInit` message.
    pub fn from_bytes(buf: &mut BytesMut) -> Result<Self> {
        if buf.len() < 16 {
            return Err(RfbError::protocol("pixel format truncated"));
        }
        let pf = PixelFormat {
            bits_per_pixel: buf.get_u8(),
            depth: buf.get_u8(),
            big_endian: buf.get_u8() != 0,
            true_color: buf.get_u8() != 0,
            red_max: buf.get_u16(),
            green_max: buf.get_u16(),
            blue_max: buf.get_u16(),
            red_shift: buf.get_u8(),
            green_shift: buf.get_u8(),
            blue_shift: buf.get_u8(),
        };
        buf.advance(3);
        Ok(pf)
    }

    /// Splits a raw pixel value into 8-bit-per-channel `(r, g, b)`, scaling
    /// each channel from its `max` range up to 0..=255.
    pub fn split_color(&self, pixel: u32) -> (u8, u8, u8) {
        let r = extract_channel(pixel, self.red_shift, self.red_max);
        let g = extract_channel(pixel, self.green_shift, self.green_max);
        let b = extract_channel(pixel, self.blue_shift, self.blue_max);
        (r, g, b)
    }

    /// Packs 8-bit-per-channel `(r, g, b)` into a raw pixel value in this
    /// format, scaling each channel down from 0..=255 to the format's range.
    pub fn make_color(&self, r: u8, g: u8, b: u8) -> u32 {
        let r = pack_channel(r, self.red_shift, self.red_max);
        let g = pack_channel(g, self.green_shift, self.green_max);
        let b = pack_channel(b, self.blue_shift, self.blue_max);
        r | g | b
    }
}

/// `ceil(bpp/8)`, except 24bpp packs into 4 bytes on the wire.
pub fn bytes_per_pixel(bpp: u8) -> usize {
    if bpp == 24 {
        4
    } else {
        ((bpp as usize) + 7) / 8
    }
}

fn extract_channel(pixel: u32, shift: u8, max: u16) -> u8 {
    if max == 0 {
        return 0;
    }
    let raw = (pixel >> shift) & u32::from(max);
    ((raw * 255) / u32::from(max)) as u8
}

fn pack_channel(value: u8, shift: u8, max: u16) -> u32 {
    if max == 0 {
        return 0;
    }
    let scaled = (u32::from(value) * u32::from(max)) / 255;
    scaled << shift
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_table_matches_spec() {
        let cases: &[(u8, u8, bool, (u16, u16, u16), (u8, u8, u8))] = &[
            (8, 8, false, (0, 0, 0), (0, 0, 0)),
            (15, 15, true, (31, 31, 31), (10, 5, 0)),
            (16, 16, true, (31, 63, 31), (11, 5, 0)),
            (24, 24, true, (255, 255, 255), (16, 8, 0)),
            (32, 24, true, (255, 255, 255), (16, 8, 0)),
        ];
        for &(bpp, depth, truecolor, maxes, shifts) in cases {
            let pf = PixelFormat::canonical(bpp).unwrap();
            assert_eq!(pf.depth, depth, "bpp {bpp}");
            assert_eq!(pf.true_color, truecolor, "bpp {bpp}");
            assert_eq!((pf.red_max, pf.green_max, pf.blue_max), maxes, "bpp {bpp}");
            assert_eq!(
                (pf.red_shift, pf.green_shift, pf.blue_shift),
                shifts,
                "bpp {bpp}"
            );
        }
    }

    #[test]
    fn bytes_per_pixel_matches_spec_formula() {
        assert_eq!(bytes_per_pixel(8), 1);
        assert_eq!(bytes_per_pixel(15), 2);
        assert_eq!(bytes_per_pixel(16), 2);
        assert_eq!(bytes_per_pixel(24), 4);
        assert_eq!(bytes_per_pixel(32), 4);
    }

    #[test]
    fn split_make_color_roundtrip_on_24bit() {
        let pf = PixelFormat::canonical_24();
        for &(r, g, b) in &[(0u8, 0u8, 0u8), (255, 128, 64), (10, 200, 30)] {
            let pixel = pf.make_color(r, g, b);
            assert_eq!(pf.split_color(pixel), (r, g, b));
        }
    }

    #[test]
    fn set_pixel_format_bytes_match_table() {
        let pf = PixelFormat::canonical(16).unwrap();
        let mut buf = BytesMut::new();
        pf.write_to(&mut buf);
        assert_eq!(buf.len(), 16);
        assert_eq!(buf[0], 16); // bpp
        assert_eq!(buf[1], 16); // depth
        assert_eq!(buf[3], 1); // true-color
        assert_eq!(u16::from_be_bytes([buf[4], buf[5]]), 31); // red_max
        assert_eq!(u16::from_be_bytes([buf[6], buf[7]]), 63); // green_max
        assert_eq!(buf[10], 11); // red_shift
        assert_eq!(buf[11], 5); // green_shift
    }
}
