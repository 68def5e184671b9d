//! Typed sink for `set_param` (spec §6), sitting in front of the original
//! module's stringly-typed `(name, value)` setter the way a CLI's typed
//! config struct sits in front of raw env/arg parsing.

use log::debug;

use crate::screen::ScreenLayout;

/// Parameters the host configures before `connect` (and a few, like
/// `disabled_encodings_mask`, that can change later).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionParams {
    pub username: String,
    pub password: String,
    pub ip: String,
    pub port: u16,
    pub keylayout: String,
    pub delay_ms: u64,
    /// 16-byte xrdp GUID; when present, auth derives the DES password from
    /// its SHA-1 hash instead of using `password` directly (spec §4.H step 5).
    pub guid: Option<[u8; 16]>,
    /// Bitmask of encodings the host wants withheld even though this module
    /// supports them; stored negated at the wire-negotiation boundary so a
    /// set bit here means "disabled" (spec §6).
    pub disabled_encodings_mask: u32,
    /// The downstream client's desired multi-monitor layout.
    pub client_info: Option<ScreenLayout>,
}

impl SessionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one `name`/`value` pair, mirroring spec §6's recognized set.
    /// Unknown names are logged and ignored (matches the original module's
    /// `mod_set_param`, which silently accepts unknown names too).
    pub fn set_param(&mut self, name: &str, value: &str) {
        match name {
            "username" => self.username = value.to_string(),
            "password" => self.password = value.to_string(),
            "ip" => self.ip = value.to_string(),
            "port" => match value.parse() {
                Ok(p) => self.port = p,
                Err(_) => debug!("set_param: invalid port {value:?}, ignoring"),
            },
            "keylayout" => self.keylayout = value.to_string(),
            "delay_ms" => match value.parse() {
                Ok(ms) => self.delay_ms = ms,
                Err(_) => debug!("set_param: invalid delay_ms {value:?}, ignoring"),
            },
            "disabled_encodings_mask" => match value.parse::<u32>() {
                Ok(mask) => self.disabled_encodings_mask = !mask,
                Err(_) => debug!("set_param: invalid disabled_encodings_mask {value:?}, ignoring"),
            },
            _ => debug!("set_param: unrecognized parameter {name:?}, ignoring"),
        }
    }

    /// Sets the 16-byte xrdp GUID directly (binary, not through the
    /// stringly-typed `set_param` path — spec §6 describes `guid` as
    /// "16-byte binary").
    pub fn set_guid(&mut self, guid: [u8; 16]) {
        self.guid = Some(guid);
    }

    pub fn set_client_info(&mut self, layout: ScreenLayout) {
        self.client_info = Some(layout);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognized_names_populate_fields() {
        let mut p = SessionParams::new();
        p.set_param("username", "alice");
        p.set_param("password", "hunter2");
        p.set_param("ip", "10.0.0.5");
        p.set_param("port", "5900");
        p.set_param("delay_ms", "250");
        assert_eq!(p.username, "alice");
        assert_eq!(p.password, "hunter2");
        assert_eq!(p.ip, "10.0.0.5");
        assert_eq!(p.port, 5900);
        assert_eq!(p.delay_ms, 250);
    }

    #[test]
    fn unknown_name_is_ignored_not_an_error() {
        let mut p = SessionParams::new();
        p.set_param("bogus", "whatever");
        assert_eq!(p, SessionParams::new());
    }

    #[test]
    fn disabled_encodings_mask_is_stored_negated() {
        let mut p = SessionParams::new();
        p.set_param("disabled_encodings_mask", "1");
        assert_eq!(p.disabled_encodings_mask, !1u32);
    }
}
