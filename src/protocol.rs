//! RFB wire constants: message types, security types, and encodings this
//! client negotiates or decodes (spec §1, §4.G, §4.H). Pseudo-encodings are
//! carried on the wire as an unsigned 32-bit field; this module keeps the
//! negative mnemonic value and converts with `as u32` at the call site, the
//! way the spec's GLOSSARY describes them.

/// The only RFB protocol version this client speaks (spec §1 Non-goals).
pub const PROTOCOL_VERSION: &[u8; 12] = b"RFB 003.003\n";

// Client-to-server message types.
pub const CLIENT_MSG_SET_PIXEL_FORMAT: u8 = 0;
pub const CLIENT_MSG_SET_ENCODINGS: u8 = 2;
pub const CLIENT_MSG_FRAMEBUFFER_UPDATE_REQUEST: u8 = 3;
pub const CLIENT_MSG_KEY_EVENT: u8 = 4;
pub const CLIENT_MSG_POINTER_EVENT: u8 = 5;
pub const CLIENT_MSG_CUT_TEXT: u8 = 6;
pub const CLIENT_MSG_SET_DESKTOP_SIZE: u8 = 251;

// Server-to-client message types.
pub const SERVER_MSG_FRAMEBUFFER_UPDATE: u8 = 0;
pub const SERVER_MSG_SET_COLOUR_MAP_ENTRIES: u8 = 1;
pub const SERVER_MSG_BELL: u8 = 2;
pub const SERVER_MSG_CUT_TEXT: u8 = 3;

// Security types.
pub const SECURITY_TYPE_INVALID: u32 = 0;
pub const SECURITY_TYPE_NONE: u32 = 1;
pub const SECURITY_TYPE_VNC_AUTH: u32 = 2;

/// Real (non-pseudo) encodings this client always advertises.
pub const ENCODING_RAW: i32 = 0;
pub const ENCODING_COPYRECT: i32 = 1;

/// Pseudo-encodings. Negative mnemonic values; convert with `as u32` when
/// comparing against the wire's unsigned encoding field.
pub const ENCODING_CURSOR: i32 = -239;
pub const ENCODING_DESKTOP_SIZE: i32 = -223;
pub const ENCODING_EXTENDED_DESKTOP_SIZE: i32 = -308;

/// Bit 0 of `enabled_encodings_mask`: advertise ExtendedDesktopSize
/// (spec §4.H step 10).
pub const MASK_EXTENDED_DESKTOP_SIZE: u32 = 1 << 0;

/// ExtendedDesktopSize status codes carried in the rectangle's `y` field
/// when replying to our own `SetDesktopSize` request (spec §4.F).
pub const EDS_STATUS_MESSAGES: [&str; 5] = [
    "No error",
    "Resize is administratively prohibited",
    "Out of resources",
    "Invalid screen layout",
    "Unknown code",
];

/// Maps an ExtendedDesktopSize status code to its diagnostic string,
/// clamping anything out of range to "Unknown code".
pub fn eds_status_message(code: u16) -> &'static str {
    EDS_STATUS_MESSAGES
        .get(code as usize)
        .copied()
        .unwrap_or(EDS_STATUS_MESSAGES[EDS_STATUS_MESSAGES.len() - 1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eds_status_message_maps_known_codes() {
        assert_eq!(eds_status_message(0), "No error");
        assert_eq!(eds_status_message(3), "Invalid screen layout");
        assert_eq!(eds_status_message(99), "Unknown code");
    }
}
