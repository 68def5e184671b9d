//! Multi-monitor layout model (spec §4.C): a `ScreenLayout` is an ordered set
//! of `Screen`s plus the total desktop size they tile. Equality and
//! (de)serialization both operate under the canonical ordering key
//! `(id, x, y, width, height)`.

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{RfbError, Result};

/// One monitor in a [`ScreenLayout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Screen {
    pub id: u32,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub flags: u32,
}

impl Screen {
    fn sort_key(&self) -> (u32, u16, u16, u16, u16) {
        (self.id, self.x, self.y, self.width, self.height)
    }
}

/// An ordered multi-monitor layout: total desktop bounds plus its screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenLayout {
    pub total_width: u16,
    pub total_height: u16,
    pub screens: Vec<Screen>,
}

impl ScreenLayout {
    /// Builds a layout, canonically sorting its screens.
    pub fn new(total_width: u16, total_height: u16, mut screens: Vec<Screen>) -> Self {
        screens.sort_by_key(Screen::sort_key);
        Self {
            total_width,
            total_height,
            screens,
        }
    }

    /// Number of screens in the layout.
    pub fn count(&self) -> usize {
        self.screens.len()
    }

    /// A single-screen layout covering the whole desktop, as used for the
    /// downstream client (spec §9: only single-screen downstream resizes are
    /// attempted).
    pub fn single(id: u32, width: u16, height: u16, flags: u32) -> Self {
        Self::new(
            width,
            height,
            vec![Screen {
                id,
                x: 0,
                y: 0,
                width,
                height,
                flags,
            }],
        )
    }

    /// `true` if this layout has exactly one screen.
    pub fn is_single_screen(&self) -> bool {
        self.screens.len() == 1
    }

    /// Serializes to the ExtendedDesktopSize screen-list payload (spec §4.C):
    /// `u8 count, 3 pad, then per-screen u32 id, u16 x, u16 y, u16 w, u16 h, u32 flags`,
    /// all big-endian.
    pub fn write_screens(&self, buf: &mut BytesMut) {
        buf.put_u8(self.screens.len() as u8);
        buf.put_bytes(0, 3);
        for s in &self.screens {
            buf.put_u32(s.id);
            buf.put_u16(s.x);
            buf.put_u16(s.y);
            buf.put_u16(s.width);
            buf.put_u16(s.height);
            buf.put_u32(s.flags);
        }
    }

    /// Parses a screen list in the same shape `write_screens` emits, sorting
    /// on read so `deserialize(serialize(l)) == l`. `total_width`/`height`
    /// are supplied separately since on the wire they live in the enclosing
    /// rectangle header, not the screen-list payload.
    pub fn read_screens(buf: &mut BytesMut, total_width: u16, total_height: u16) -> Result<Self> {
        if buf.len() < 4 {
            return Err(RfbError::protocol("screen list header truncated"));
        }
        let count = buf.get_u8() as usize;
        buf.advance(3);
        if buf.len() < count * 16 {
            return Err(RfbError::protocol("screen list truncated"));
        }
        let mut screens = Vec::with_capacity(count);
        for _ in 0..count {
            screens.push(Screen {
                id: buf.get_u32(),
                x: buf.get_u16(),
                y: buf.get_u16(),
                width: buf.get_u16(),
                height: buf.get_u16(),
                flags: buf.get_u32(),
            });
        }
        Ok(Self::new(total_width, total_height, screens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(id: u32, x: u16, y: u16, w: u16, h: u16) -> Screen {
        Screen {
            id,
            x,
            y,
            width: w,
            height: h,
            flags: 0,
        }
    }

    #[test]
    fn equal_layout_equals_itself() {
        let l = ScreenLayout::new(1920, 1080, vec![screen(1, 0, 0, 1920, 1080)]);
        assert_eq!(l, l.clone());
    }

    #[test]
    fn serialize_then_deserialize_roundtrips_after_sort() {
        let l = ScreenLayout::new(
            2560,
            1080,
            vec![screen(2, 1280, 0, 1280, 1080), screen(1, 0, 0, 1280, 1080)],
        );
        let mut buf = BytesMut::new();
        l.write_screens(&mut buf);
        let parsed = ScreenLayout::read_screens(&mut buf, l.total_width, l.total_height).unwrap();
        assert_eq!(parsed, l);
        // sorted by (id, x, y, w, h): id=1 comes before id=2
        assert_eq!(parsed.screens[0].id, 1);
    }

    #[test]
    fn single_screen_layout_is_single() {
        let l = ScreenLayout::single(7, 1280, 720, 0);
        assert!(l.is_single_screen());
        assert_eq!(l.screens[0].id, 7);
    }

    #[test]
    fn different_totals_are_not_equal() {
        let a = ScreenLayout::single(1, 1280, 720, 0);
        let b = ScreenLayout::single(1, 1920, 1080, 0);
        assert_ne!(a, b);
    }
}
