//! Scancode → key-sym translation engine (spec §4.D).
//!
//! A 256-slot table, indexed by raw scancode, holds per-key attribute flags
//! and unshifted/shifted key-sym pairs. The engine tracks caps-lock/num-lock
//! state and the shift-held bit (derived from the shift slot's `IS_DOWN`),
//! and synthesizes auto-repeat locally so repeat rate is decoupled from
//! network latency.

use log::{debug, warn};

/// Bit flags on a [`KeymapEntry`].
pub mod attr {
    /// The slot is mapped; unmapped slots are silently dropped.
    pub const VALID: u16 = 1 << 0;
    /// Press emits press+release immediately; release is a no-op on the wire.
    pub const AUTO_REPEAT: u16 = 1 << 1;
    /// Session-tracked "is this scancode currently held" bit.
    pub const IS_DOWN: u16 = 1 << 2;
    /// Shift/caps-lock choose the shifted sym by `shift_down XOR caps_locked`.
    pub const CAPS_LOCKABLE: u16 = 1 << 3;
    /// Shift/num-lock choose the shifted sym by `shift_down XOR num_locked`.
    pub const NUM_LOCKABLE: u16 = 1 << 4;
    /// This slot is the caps-lock key: toggles `caps_locked` on release.
    pub const IS_CAPSLOCK: u16 = 1 << 5;
    /// This slot is the num-lock key: toggles `num_locked` on release.
    pub const IS_NUMLOCK: u16 = 1 << 6;
}

/// The host's magic "release" value for the direction flag (spec §4.D).
pub const RELEASE_FLAG: i32 = 0x8000;

/// The scancode whose `IS_DOWN` bit is the global "shift held" state
/// (spec §3: "the reference implementation uses scancode 42 for left-shift").
pub const SHIFT_SCANCODE: usize = 42;

/// One slot of the 256-entry scancode table.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeymapEntry {
    pub attrs: u16,
    pub sym: u32,
    pub shifted_sym: u32,
}

impl KeymapEntry {
    const fn new(attrs: u16, sym: u32, shifted_sym: u32) -> Self {
        KeymapEntry {
            attrs: attrs | attr::VALID,
            sym,
            shifted_sym,
        }
    }

    fn is_down(&self) -> bool {
        self.attrs & attr::IS_DOWN != 0
    }

    fn set_down(&mut self, down: bool) {
        if down {
            self.attrs |= attr::IS_DOWN;
        } else {
            self.attrs &= !attr::IS_DOWN;
        }
    }
}

/// A wire-bound RFB key event the engine wants sent: `(key-sym, pressed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyWireEvent {
    pub sym: u32,
    pub down: bool,
}

/// The 256-slot keymap engine plus session-level lock state.
pub struct Keymap {
    entries: [KeymapEntry; 256],
    caps_locked: bool,
    num_locked: bool,
}

impl Default for Keymap {
    fn default() -> Self {
        Self {
            entries: default_entries(),
            caps_locked: false,
            num_locked: false,
        }
    }
}

impl Keymap {
    /// A fresh engine loaded with the default US-layout table (spec §4.D).
    pub fn new() -> Self {
        Self::default()
    }

    pub fn caps_locked(&self) -> bool {
        self.caps_locked
    }

    pub fn num_locked(&self) -> bool {
        self.num_locked
    }

    fn shift_down(&self) -> bool {
        self.entries[SHIFT_SCANCODE].is_down()
    }

    /// Translates one host key event into zero or more RFB key-sym events.
    ///
    /// `scancode` is validated against `[0,255]`; `flag` is compared against
    /// [`RELEASE_FLAG`] to determine press vs. release. Out-of-range or
    /// unmapped scancodes are dropped with a diagnostic and treated as
    /// success (spec §4.D "Filtering").
    pub fn handle_key(&mut self, scancode: i32, flag: i32) -> Vec<KeyWireEvent> {
        if !(0..=255).contains(&scancode) {
            warn!("handle_key: scancode {scancode} out of range, dropping");
            return Vec::new();
        }
        let idx = scancode as usize;
        if self.entries[idx].attrs & attr::VALID == 0 {
            debug!("handle_key: scancode {scancode} not mapped, dropping");
            return Vec::new();
        }

        let pressed = flag != RELEASE_FLAG;
        if pressed {
            self.press(idx)
        } else {
            self.release(idx)
        }
    }

    fn chosen_sym(&self, idx: usize) -> u32 {
        let entry = &self.entries[idx];
        let shift_down = self.shift_down();
        let use_shifted = if entry.attrs & attr::CAPS_LOCKABLE != 0 {
            shift_down ^ self.caps_locked
        } else if entry.attrs & attr::NUM_LOCKABLE != 0 {
            shift_down ^ self.num_locked
        } else {
            shift_down
        };
        if use_shifted {
            entry.shifted_sym
        } else {
            entry.sym
        }
    }

    fn press(&mut self, idx: usize) -> Vec<KeyWireEvent> {
        let sym = self.chosen_sym(idx);
        let entry = &mut self.entries[idx];
        if entry.attrs & attr::AUTO_REPEAT != 0 {
            // Decouple repeat rate from network latency: always a press
            // immediately followed by a release, IS_DOWN untouched.
            vec![
                KeyWireEvent { sym, down: true },
                KeyWireEvent { sym, down: false },
            ]
        } else if !entry.is_down() {
            entry.set_down(true);
            vec![KeyWireEvent { sym, down: true }]
        } else {
            // Deduplicate repeats that arrive without an intervening release.
            Vec::new()
        }
    }

    fn release(&mut self, idx: usize) -> Vec<KeyWireEvent> {
        let sym = self.chosen_sym(idx);
        let entry = &mut self.entries[idx];
        let attrs = entry.attrs;

        // Lock toggles fire on release; the press already sent used the
        // pre-toggle state, which is the designed behavior (spec §4.D).
        if attrs & attr::IS_CAPSLOCK != 0 {
            self.caps_locked = !self.caps_locked;
        }
        if attrs & attr::IS_NUMLOCK != 0 {
            self.num_locked = !self.num_locked;
        }

        let entry = &mut self.entries[idx];
        if attrs & attr::AUTO_REPEAT != 0 {
            // Release was already synthesized on press; no wire traffic.
            Vec::new()
        } else if entry.is_down() {
            entry.set_down(false);
            vec![KeyWireEvent { sym, down: false }]
        } else {
            Vec::new()
        }
    }
}

/// The default US-layout scancode table (spec §4.D + the original xrdp
/// `vnc` module's `mod_init`), with the documented scancode 71/72 duplicate
/// resolved per spec §9: 71=Home, 72=Up, 79=End, 80=Down, 73=PgUp, 81=PgDn,
/// 75=Left, 77=Right, 69=NumLock, 70=ScrollLock, 78=SysRq.
fn default_entries() -> [KeymapEntry; 256] {
    use attr::{AUTO_REPEAT as AR, CAPS_LOCKABLE as CL, IS_CAPSLOCK, IS_NUMLOCK};

    let mut keys = [KeymapEntry::default(); 256];
    let mut set = |idx: usize, attrs: u16, sym: u32, shifted: u32| {
        keys[idx] = KeymapEntry::new(attrs, sym, shifted);
    };

    // a-z
    const LETTERS: [(usize, u32, u32); 26] = [
        (30, 0x0061, 0x0041),
        (48, 0x0062, 0x0042),
        (46, 0x0063, 0x0043),
        (32, 0x0064, 0x0044),
        (18, 0x0065, 0x0045),
        (33, 0x0066, 0x0046),
        (34, 0x0067, 0x0047),
        (35, 0x0068, 0x0048),
        (23, 0x0069, 0x0049),
        (36, 0x006a, 0x004a),
        (37, 0x006b, 0x004b),
        (38, 0x006c, 0x004c),
        (50, 0x006d, 0x004d),
        (49, 0x006e, 0x004e),
        (24, 0x006f, 0x004f),
        (25, 0x0070, 0x0050),
        (16, 0x0071, 0x0051),
        (19, 0x0072, 0x0052),
        (31, 0x0073, 0x0053),
        (20, 0x0074, 0x0054),
        (22, 0x0075, 0x0055),
        (47, 0x0076, 0x0056),
        (17, 0x0077, 0x0057),
        (45, 0x0078, 0x0058),
        (21, 0x0079, 0x0059),
        (44, 0x007a, 0x005a),
    ];
    for &(idx, sym, shifted) in &LETTERS {
        set(idx, AR | CL, sym, shifted);
    }

    // 0-9 with shifted punctuation
    const DIGITS: [(usize, u32, u32); 10] = [
        (11, 0x0030, 0x0029),
        (2, 0x0031, 0x0021),
        (3, 0x0032, 0x0040),
        (4, 0x0033, 0x0023),
        (5, 0x0034, 0x0024),
        (6, 0x0035, 0x0025),
        (7, 0x0036, 0x005e),
        (8, 0x0037, 0x0026),
        (9, 0x0038, 0x002a),
        (10, 0x0039, 0x0028),
    ];
    for &(idx, sym, shifted) in &DIGITS {
        set(idx, AR, sym, shifted);
    }

    // F1-F12: 0xFFBE..=0xFFC9
    for (i, idx) in (59..=68).chain(87..=88).enumerate() {
        let sym = 0xFFBEu32 + i as u32;
        set(idx, AR, sym, sym);
    }

    // modifiers: shift, ctrl, alt — no auto-repeat
    set(SHIFT_SCANCODE, 0, 0xFFE1, 0xFFE1);
    set(29, 0, 0xFFE3, 0xFFE3);
    set(56, 0, 0xFFE9, 0xFFE9);

    // caps lock
    set(58, IS_CAPSLOCK, 0xFFE5, 0xFFE5);

    // esc, tab, and punctuation
    set(1, AR, 0xFF1B, 0xFF1B);
    set(15, AR, 0xFF09, 0xFF09);
    set(43, AR, 0x005C, 0x007C); // backslash
    set(51, AR, 0x002C, 0x003C); // ,
    set(52, AR, 0x002E, 0x003E); // .
    set(53, AR, 0x002F, 0x003F); // /
    set(39, AR, 0x003B, 0x003A); // ;
    set(40, AR, 0x0027, 0x0022); // '
    set(26, AR, 0x005B, 0x007B); // [
    set(27, AR, 0x005D, 0x007D); // ]
    set(12, AR, 0x002D, 0x005F); // -
    set(13, AR, 0x003D, 0x002B); // =
    set(41, AR, 0x0060, 0x007E); // `

    // del, backspace
    set(83, AR, 0xFF9F, 0xFF9F);
    set(14, AR, 0xFF08, 0xFF08);

    // navigation/editing (duplicate 71/72 assignment in the original
    // resolved per spec §9's fixed mapping)
    set(71, AR, 0xFF95, 0xFF95); // Home
    set(72, AR, 0xFF52, 0xFF52); // Up
    set(79, AR, 0xFF9C, 0xFF9C); // End
    set(80, AR, 0xFF54, 0xFF54); // Down
    set(73, AR, 0xFF55, 0xFF55); // PgUp
    set(81, AR, 0xFF56, 0xFF56); // PgDn
    set(75, AR, 0xFF51, 0xFF51); // Left
    set(77, AR, 0xFF53, 0xFF53); // Right

    // num-lock, scroll-lock, sysrq
    set(69, IS_NUMLOCK, 0xFF7F, 0xFF7F);
    set(70, AR, 0xFF14, 0xFF14); // ScrollLock
    set(78, AR, 0xFF15, 0xFF61); // SysRq

    keys
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(k: &mut Keymap, scancode: i32) -> Vec<KeyWireEvent> {
        k.handle_key(scancode, 0)
    }
    fn release(k: &mut Keymap, scancode: i32) -> Vec<KeyWireEvent> {
        k.handle_key(scancode, RELEASE_FLAG)
    }

    #[test]
    fn auto_repeat_key_always_emits_press_and_release() {
        let mut k = Keymap::new();
        for _ in 0..3 {
            let events = press(&mut k, 30); // 'a'
            assert_eq!(
                events,
                vec![
                    KeyWireEvent { sym: 0x61, down: true },
                    KeyWireEvent { sym: 0x61, down: false },
                ]
            );
        }
        // release never produces wire traffic for auto-repeat keys
        assert!(release(&mut k, 30).is_empty());
    }

    #[test]
    fn non_auto_repeat_deduplicates_presses_and_releases() {
        let mut k = Keymap::new();
        assert_eq!(press(&mut k, 29), vec![KeyWireEvent { sym: 0xFFE3, down: true }]); // ctrl
        assert!(press(&mut k, 29).is_empty(), "second press without release dropped");
        assert_eq!(release(&mut k, 29), vec![KeyWireEvent { sym: 0xFFE3, down: false }]);
        assert!(release(&mut k, 29).is_empty(), "second release without press dropped");
    }

    #[test]
    fn out_of_range_and_unmapped_scancodes_are_swallowed() {
        let mut k = Keymap::new();
        assert!(press(&mut k, 300).is_empty());
        assert!(press(&mut k, -1).is_empty());
        assert!(press(&mut k, 200).is_empty()); // unmapped slot
    }

    #[test]
    fn caps_lock_toggles_on_release_not_press() {
        let mut k = Keymap::new();
        assert!(!k.caps_locked());
        let _ = press(&mut k, 58); // capslock key itself, uses pre-toggle state
        assert!(!k.caps_locked(), "toggle must not happen on press");
        let _ = release(&mut k, 58);
        assert!(k.caps_locked());
    }

    #[test]
    fn caps_lock_shifts_letters_without_holding_shift() {
        let mut k = Keymap::new();
        let _ = press(&mut k, 58);
        let _ = release(&mut k, 58); // caps_locked now true
        let events = press(&mut k, 30); // 'a'
        assert_eq!(events[0].sym, 0x41, "capslock alone should produce uppercase");
    }

    #[test]
    fn shift_held_uses_shifted_sym_for_digit() {
        let mut k = Keymap::new();
        let _ = press(&mut k, SHIFT_SCANCODE as i32);
        let events = press(&mut k, 2); // '1' -> '!'
        assert_eq!(events[0].sym, 0x21);
        let _ = release(&mut k, SHIFT_SCANCODE as i32);
    }
}
