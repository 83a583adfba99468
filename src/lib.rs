//! Reader and writer for Apple's `Cookies.binarycookies` container.
//!
//! ```no_run
//! let bytes = std::fs::read("Cookies.binarycookies")?;
//! let cookies = binarycookies::loads(&bytes)?;
//! for c in &cookies {
//!     println!("{} {}={} ({})", c.url, c.name, c.value, c.flag);
//! }
//! let out = binarycookies::dumps(cookies)?;
//! std::fs::write("copy.binarycookies", out)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod layout;
pub mod cookie;
pub mod checksum;
pub mod decode;
pub mod encode;
pub mod input;
pub mod error;

use std::io::{Read, Write};

pub use cookie::{Cookie, Flag, TimestampPrecision};
pub use decode::{decode, decode_with, ChecksumPolicy, ChecksumStatus, DecodeOptions, Decoded, PageInfo};
pub use encode::{encode, encode_one, encode_with, ChecksumOrder, EncodeOptions};
pub use error::{BinaryCookiesError, ChecksumWarning, Result};
pub use input::CookieInput;

/// Decode a buffer with default options.
pub fn loads(bytes: &[u8]) -> Result<Vec<Cookie>> {
    decode(bytes)
}

pub fn loads_with(bytes: &[u8], opts: &DecodeOptions) -> Result<Decoded> {
    decode_with(bytes, opts)
}

/// Read the whole stream, then decode it.
pub fn load<R: Read>(reader: R) -> Result<Vec<Cookie>> {
    load_with(reader, &DecodeOptions::default()).map(|d| d.cookies)
}

pub fn load_with<R: Read>(mut reader: R, opts: &DecodeOptions) -> Result<Decoded> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    decode_with(&bytes, opts)
}

/// Coerce and encode with default options.
pub fn dumps(cookies: impl Into<CookieInput>) -> Result<Vec<u8>> {
    dumps_with(cookies, &EncodeOptions::default())
}

pub fn dumps_with(cookies: impl Into<CookieInput>, opts: &EncodeOptions) -> Result<Vec<u8>> {
    let cookies = cookies.into().into_cookies()?;
    encode_with(&cookies, opts)
}

/// Encode fully, then write the bytes in one call.  Nothing is written if
/// encoding fails.
pub fn dump<W: Write>(cookies: impl Into<CookieInput>, writer: W) -> Result<()> {
    dump_with(cookies, writer, &EncodeOptions::default())
}

pub fn dump_with<W: Write>(cookies: impl Into<CookieInput>, mut writer: W, opts: &EncodeOptions) -> Result<()> {
    let bytes = dumps_with(cookies, opts)?;
    writer.write_all(&bytes)?;
    writer.flush()?;
    Ok(())
}
