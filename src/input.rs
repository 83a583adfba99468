//! Encode-side input boundary.
//!
//! Callers hand the encoder a [`CookieInput`]: typed records, or loosely
//! typed JSON mappings that are coerced field by field.  Coercion happens
//! exactly once, in [`CookieInput::into_cookies`]; the encoder itself only
//! ever sees [`Cookie`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::cookie::{Cookie, Flag};
use crate::error::{BinaryCookiesError, Result};

type Mapping = Map<String, Value>;

const FIELDS: [&str; 7] = ["name", "value", "url", "path", "create_datetime", "expiry_datetime", "flag"];

#[derive(Debug, Clone)]
pub enum CookieInput {
    Single(Cookie),
    Many(Vec<Cookie>),
    Mapping(Mapping),
    Mappings(Vec<Mapping>),
}

impl CookieInput {
    pub fn into_cookies(self) -> Result<Vec<Cookie>> {
        match self {
            CookieInput::Single(c)   => Ok(vec![c]),
            CookieInput::Many(v)     => Ok(v),
            CookieInput::Mapping(m)  => Ok(vec![coerce(&m, "")?]),
            CookieInput::Mappings(v) => v
                .iter()
                .enumerate()
                .map(|(i, m)| coerce(m, &format!("[{i}].")))
                .collect(),
        }
    }
}

impl From<Cookie> for CookieInput {
    fn from(c: Cookie) -> Self {
        CookieInput::Single(c)
    }
}

impl From<&Cookie> for CookieInput {
    fn from(c: &Cookie) -> Self {
        CookieInput::Single(c.clone())
    }
}

impl From<Vec<Cookie>> for CookieInput {
    fn from(v: Vec<Cookie>) -> Self {
        CookieInput::Many(v)
    }
}

impl From<&[Cookie]> for CookieInput {
    fn from(v: &[Cookie]) -> Self {
        CookieInput::Many(v.to_vec())
    }
}

impl From<Mapping> for CookieInput {
    fn from(m: Mapping) -> Self {
        CookieInput::Mapping(m)
    }
}

impl From<Vec<Mapping>> for CookieInput {
    fn from(v: Vec<Mapping>) -> Self {
        CookieInput::Mappings(v)
    }
}

impl TryFrom<Value> for CookieInput {
    type Error = BinaryCookiesError;

    /// An object is one cookie, an array of objects is many.  Anything else
    /// is not a container the encoder accepts.
    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(m) => Ok(CookieInput::Mapping(m)),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| match item {
                    Value::Object(m) => Ok(m),
                    other => Err(BinaryCookiesError::InvalidInput(format!(
                        "element {i} is {}, expected an object",
                        kind(&other)
                    ))),
                })
                .collect::<Result<Vec<_>>>()
                .map(CookieInput::Mappings),
            other => Err(BinaryCookiesError::InvalidInput(format!(
                "expected an object or an array of objects, got {}",
                kind(&other)
            ))),
        }
    }
}

// ── Coercion ─────────────────────────────────────────────────────────────────

fn coerce(m: &Mapping, prefix: &str) -> Result<Cookie> {
    if let Some(extra) = m.keys().find(|k| !FIELDS.contains(&k.as_str())) {
        return Err(BinaryCookiesError::validation(format!("{prefix}{extra}"), "unrecognized field"));
    }
    let get = |field: &str| {
        m.get(field)
            .filter(|v| !v.is_null())
            .ok_or_else(|| BinaryCookiesError::validation(format!("{prefix}{field}"), "field required"))
    };
    let fail = |field: &str, reason: String| BinaryCookiesError::validation(format!("{prefix}{field}"), reason);

    let string = |field: &str| -> Result<String> {
        match get(field)? {
            Value::String(s) => Ok(s.clone()),
            other => Err(fail(field, format!("expected a string, got {}", kind(other)))),
        }
    };
    let datetime = |field: &str| -> Result<DateTime<Utc>> {
        match get(field)? {
            Value::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| fail(field, format!("invalid RFC 3339 timestamp {s:?}: {e}"))),
            Value::Number(n) => unix_seconds(n).ok_or_else(|| fail(field, format!("timestamp {n} out of range"))),
            other => Err(fail(field, format!("expected a timestamp, got {}", kind(other)))),
        }
    };

    let flag = match get("flag")? {
        Value::String(s) => Flag::from_name(s).ok_or_else(|| fail("flag", format!("unknown flag {s:?}")))?,
        Value::Number(n) => n
            .as_u64()
            .and_then(|raw| u32::try_from(raw).ok())
            .and_then(Flag::try_from_raw)
            .ok_or_else(|| fail("flag", format!("{n} is not a known flag value")))?,
        other => return Err(fail("flag", format!("expected a flag, got {}", kind(other)))),
    };

    Ok(Cookie {
        name:            string("name")?,
        value:           string("value")?,
        url:             string("url")?,
        path:            string("path")?,
        create_datetime: datetime("create_datetime")?,
        expiry_datetime: datetime("expiry_datetime")?,
        flag,
    })
}

fn unix_seconds(n: &serde_json::Number) -> Option<DateTime<Utc>> {
    if let Some(secs) = n.as_i64() {
        return DateTime::from_timestamp(secs, 0);
    }
    let f = n.as_f64().filter(|f| f.is_finite())?;
    let whole = f.floor();
    if whole.abs() > 9_007_199_254_740_992.0 {
        return None;
    }
    let nanos = (((f - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null      => "null",
        Value::Bool(_)   => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_)  => "an array",
        Value::Object(_) => "an object",
    }
}
