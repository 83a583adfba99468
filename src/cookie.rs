//! Record model: the structured cookie both pipelines produce and consume.
//!
//! # Flags
//! On disk the flag word is a little-endian `u32` with bit 0 = Secure and
//! bit 2 = HttpOnly.  Only the four combinations in [`FLAG_TABLE`] are
//! named; anything else decodes to [`Flag::Unknown`].
//!
//! # Timestamps
//! Stored as `f64` seconds since the Mac epoch (2001-01-01T00:00:00Z).
//! In memory they are [`DateTime<Utc>`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds between the Unix epoch and the Mac epoch.
pub const MAC_EPOCH_UNIX_SECONDS: i64 = 978_307_200;

// ── Flag ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Flag {
    #[serde(rename = "Secure")]
    Secure,
    #[serde(rename = "HttpOnly")]
    HttpOnly,
    #[serde(rename = "Secure; HttpOnly")]
    SecureHttpOnly,
    #[serde(rename = "Unknown")]
    Unknown,
}

/// The single bidirectional flag mapping.  Both directions scan this table;
/// there is no second lookup to drift out of sync.
pub const FLAG_TABLE: [(Flag, u32); 4] = [
    (Flag::Unknown,        0),
    (Flag::Secure,         1),
    (Flag::HttpOnly,       4),
    (Flag::SecureHttpOnly, 5),
];

impl Flag {
    /// Decode an on-disk flag word.  Never fails.
    pub fn from_raw(raw: u32) -> Self {
        Self::try_from_raw(raw).unwrap_or(Flag::Unknown)
    }

    /// Exact table lookup; `None` for unmapped values.
    pub fn try_from_raw(raw: u32) -> Option<Self> {
        FLAG_TABLE.iter().find(|(_, r)| *r == raw).map(|(f, _)| *f)
    }

    /// Canonical on-disk value.
    pub fn raw(self) -> u32 {
        FLAG_TABLE
            .iter()
            .find(|(f, _)| *f == self)
            .map(|(_, r)| *r)
            .unwrap_or(0)
    }

    pub fn is_secure(self) -> bool {
        self.raw() & 0x1 != 0
    }

    pub fn is_http_only(self) -> bool {
        self.raw() & 0x4 != 0
    }

    /// Display name, identical to the serde representation.
    pub fn name(self) -> &'static str {
        match self {
            Flag::Secure         => "Secure",
            Flag::HttpOnly       => "HttpOnly",
            Flag::SecureHttpOnly => "Secure; HttpOnly",
            Flag::Unknown        => "Unknown",
        }
    }

    /// Accepts the display name or the upper-case variant spelling
    /// (`SECURE_HTTPONLY`), case-insensitively.
    pub fn from_name(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "secure"                               => Some(Flag::Secure),
            "httponly"                             => Some(Flag::HttpOnly),
            "secure; httponly" | "secure_httponly" => Some(Flag::SecureHttpOnly),
            "unknown"                              => Some(Flag::Unknown),
            _                                      => None,
        }
    }
}

impl std::fmt::Display for Flag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── Timestamps ───────────────────────────────────────────────────────────────

/// How encode writes timestamps.  Decode always keeps the full double.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimestampPrecision {
    /// Truncate toward zero to whole seconds.  Byte-compatible with the
    /// files other binarycookies writers produce.
    #[default]
    WholeSeconds,
    /// Keep nanoseconds, as far as an `f64` can hold them.
    Subsecond,
}

/// Convert stored Mac-epoch seconds to an instant.
/// `None` for NaN, infinities and values chrono cannot represent.
pub fn from_mac_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    let whole = seconds.floor();
    // ±2^53 keeps the integer part exact and far inside i64.
    if whole.abs() > 9_007_199_254_740_992.0 {
        return None;
    }
    let mut secs  = whole as i64;
    let mut nanos = ((seconds - whole) * 1e9).round() as u32;
    if nanos >= 1_000_000_000 {
        secs  += 1;
        nanos -= 1_000_000_000;
    }
    DateTime::from_timestamp(secs.checked_add(MAC_EPOCH_UNIX_SECONDS)?, nanos)
}

/// Convert an instant to Mac-epoch seconds.
pub fn to_mac_seconds(t: &DateTime<Utc>, precision: TimestampPrecision) -> f64 {
    let secs  = t.timestamp() - MAC_EPOCH_UNIX_SECONDS;
    let nanos = t.timestamp_subsec_nanos();
    match precision {
        TimestampPrecision::WholeSeconds => {
            // timestamp() floors; truncation rounds negative values up.
            if secs < 0 && nanos > 0 { (secs + 1) as f64 } else { secs as f64 }
        }
        TimestampPrecision::Subsecond => secs as f64 + f64::from(nanos) / 1e9,
    }
}

/// The Mac epoch as an instant.
pub fn mac_epoch() -> DateTime<Utc> {
    DateTime::from_timestamp(MAC_EPOCH_UNIX_SECONDS, 0).unwrap_or_default()
}

// ── Cookie ───────────────────────────────────────────────────────────────────

/// One stored cookie.  Fields are transported verbatim; no domain matching
/// or expiry enforcement happens here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cookie {
    pub name:            String,
    pub value:           String,
    pub url:             String,
    pub path:            String,
    pub create_datetime: DateTime<Utc>,
    pub expiry_datetime: DateTime<Utc>,
    pub flag:            Flag,
}

impl Cookie {
    /// One line of a Netscape `cookies.txt` file.
    pub fn to_netscape_line(&self) -> String {
        let http_only = if self.flag.is_http_only() { "#HttpOnly_" } else { "" };
        let subdomains = if self.url.starts_with('.') { "TRUE" } else { "FALSE" };
        let secure = if self.flag.is_secure() { "TRUE" } else { "FALSE" };
        format!(
            "{}{}\t{}\t{}\t{}\t{}\t{}\t{}",
            http_only,
            self.url,
            subdomains,
            self.path,
            secure,
            self.expiry_datetime.timestamp().max(0),
            self.name,
            self.value,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn flag_table_is_a_bijection() {
        for (flag, raw) in FLAG_TABLE {
            assert_eq!(Flag::from_raw(raw), flag);
            assert_eq!(flag.raw(), raw);
        }
    }

    #[test]
    fn unmapped_flag_values_decode_to_unknown() {
        for raw in [2, 3, 6, 7, 8, 0xFFFF_FFFF] {
            assert_eq!(Flag::from_raw(raw), Flag::Unknown);
            assert_eq!(Flag::try_from_raw(raw), None);
        }
    }

    #[test]
    fn flag_bits() {
        assert!(Flag::SecureHttpOnly.is_secure() && Flag::SecureHttpOnly.is_http_only());
        assert!(Flag::Secure.is_secure() && !Flag::Secure.is_http_only());
        assert!(!Flag::Unknown.is_secure());
    }

    #[test]
    fn flag_names() {
        assert_eq!(Flag::from_name("Secure; HttpOnly"), Some(Flag::SecureHttpOnly));
        assert_eq!(Flag::from_name("SECURE_HTTPONLY"), Some(Flag::SecureHttpOnly));
        assert_eq!(Flag::from_name("httponly"), Some(Flag::HttpOnly));
        assert_eq!(Flag::from_name("SameSite"), None);
        assert_eq!(serde_json::to_string(&Flag::SecureHttpOnly).unwrap(), "\"Secure; HttpOnly\"");
    }

    #[test]
    fn mac_epoch_conversions() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(to_mac_seconds(&t, TimestampPrecision::WholeSeconds), 725_760_000.0);
        assert_eq!(from_mac_seconds(725_760_000.0), Some(t));
        assert_eq!(from_mac_seconds(0.0), Some(mac_epoch()));
        assert_eq!(mac_epoch(), Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn whole_seconds_truncates_toward_zero() {
        let after = mac_epoch() + chrono::TimeDelta::milliseconds(1_500);
        let before = mac_epoch() - chrono::TimeDelta::milliseconds(1_500);
        assert_eq!(to_mac_seconds(&after, TimestampPrecision::WholeSeconds), 1.0);
        assert_eq!(to_mac_seconds(&before, TimestampPrecision::WholeSeconds), -1.0);
        assert_eq!(to_mac_seconds(&after, TimestampPrecision::Subsecond), 1.5);
        assert_eq!(to_mac_seconds(&before, TimestampPrecision::Subsecond), -1.5);
    }

    #[test]
    fn fractional_seconds_decode() {
        let t = from_mac_seconds(-0.25).unwrap();
        assert_eq!(t, mac_epoch() - chrono::TimeDelta::milliseconds(250));
    }

    #[test]
    fn unrepresentable_seconds() {
        assert_eq!(from_mac_seconds(f64::NAN), None);
        assert_eq!(from_mac_seconds(f64::INFINITY), None);
        assert_eq!(from_mac_seconds(1e300), None);
    }

    #[test]
    fn netscape_line() {
        let c = Cookie {
            name:            "sid".into(),
            value:           "abc".into(),
            url:             ".example.com".into(),
            path:            "/".into(),
            create_datetime: mac_epoch(),
            expiry_datetime: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            flag:            Flag::SecureHttpOnly,
        };
        assert_eq!(
            c.to_netscape_line(),
            "#HttpOnly_.example.com\tTRUE\t/\tTRUE\t1735689600\tsid\tabc"
        );
    }
}
