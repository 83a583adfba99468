//! Decoder: raw `Cookies.binarycookies` bytes to [`Cookie`] records.
//!
//! # Failure model
//! Structural corruption (bad magic, short reads, offsets that leave their
//! page or record, string offsets that point into the fixed header or out
//! of url/name/path/value order, invalid UTF-8) fails fast with
//! [`BinaryCookiesError::Format`] carrying the absolute byte offset.
//! Two conditions are soft:
//!   - unmapped flag words decode to [`Flag::Unknown`];
//!   - a checksum mismatch is returned as a [`ChecksumWarning`] next to the
//!     records, unless [`ChecksumPolicy::Strict`] is selected.
//!
//! The stored checksum is accepted in either byte order: Safari writes it
//! big-endian, several third-party writers emit it little-endian.
//! [`ChecksumStatus::Verified`] records which one matched.

use log::{debug, trace, warn};

use crate::checksum::Checksum;
use crate::cookie::{from_mac_seconds, Cookie, Flag};
use crate::encode::ChecksumOrder;
use crate::error::{BinaryCookiesError, ChecksumWarning, Result};
use crate::layout::{Endian, Field, COOKIE_HEADER, FILE_HEADER, FILE_TRAILER, PAGE_HEADER};

// ── Options ──────────────────────────────────────────────────────────────────

/// What to do with the trailing checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumPolicy {
    /// Do not read or verify it.
    Ignore,
    /// Verify; return a [`ChecksumWarning`] with the data on mismatch.
    #[default]
    Warn,
    /// Verify; a mismatch is an error and no records are returned.
    Strict,
}

/// Configuration for [`decode_with`].
#[derive(Debug, Clone, Default)]
pub struct DecodeOptions {
    pub checksum: ChecksumPolicy,
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumStatus {
    /// Stored value matches the recomputed one in the given byte order.
    Verified(ChecksumOrder),
    Mismatch(ChecksumWarning),
    /// Input ends right after the last page.
    Absent,
    /// [`ChecksumPolicy::Ignore`] was selected.
    Skipped,
}

/// Per-page diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageInfo {
    /// Absolute offset of the page in the input.
    pub offset:       usize,
    pub size:         usize,
    pub magic:        [u8; 4],
    pub cookie_count: usize,
}

#[derive(Debug, Clone)]
pub struct Decoded {
    pub cookies:  Vec<Cookie>,
    pub pages:    Vec<PageInfo>,
    pub checksum: ChecksumStatus,
}

impl Decoded {
    /// The non-fatal checksum warning, if one was raised.
    pub fn warning(&self) -> Option<&ChecksumWarning> {
        match &self.checksum {
            ChecksumStatus::Mismatch(w) => Some(w),
            _ => None,
        }
    }
}

// ── Entry points ─────────────────────────────────────────────────────────────

/// Decode with default options, discarding diagnostics.
pub fn decode(bytes: &[u8]) -> Result<Vec<Cookie>> {
    decode_with(bytes, &DecodeOptions::default()).map(|d| d.cookies)
}

pub fn decode_with(bytes: &[u8], opts: &DecodeOptions) -> Result<Decoded> {
    if !FILE_HEADER.magic.matches_literal(bytes, 0)? {
        return Err(BinaryCookiesError::format(0, "missing `cook` file magic"));
    }

    let page_count = FILE_HEADER.page_count.read_u32(bytes, 0)? as usize;
    // Every entry is read before use, so a bogus count fails on the first
    // missing entry instead of allocating.
    let mut page_sizes = Vec::with_capacity(page_count.min(bytes.len() / 4));
    for i in 0..page_count {
        page_sizes.push(FILE_HEADER.page_size.entry(i).read_u32(bytes, 0)? as usize);
    }

    let mut cursor  = FILE_HEADER.len(page_count);
    let mut cookies = Vec::new();
    let mut pages   = Vec::with_capacity(page_count);
    let mut sum     = Checksum::new();

    for (i, size) in page_sizes.into_iter().enumerate() {
        let end = cursor
            .checked_add(size)
            .filter(|&end| end <= bytes.len())
            .ok_or_else(|| {
                BinaryCookiesError::format(
                    bytes.len(),
                    format!("page {i} declares {size} bytes at {cursor}, input ends at {}", bytes.len()),
                )
            })?;
        let page = &bytes[cursor..end];
        let info = decode_page(page, cursor, &mut cookies)?;
        debug!("page {i}: {} cookie(s), {} bytes at {}", info.cookie_count, info.size, info.offset);
        sum.update(page);
        pages.push(info);
        cursor = end;
    }

    let checksum = match opts.checksum {
        ChecksumPolicy::Ignore => ChecksumStatus::Skipped,
        _ if cursor == bytes.len() => {
            debug!("no checksum after last page");
            ChecksumStatus::Absent
        }
        policy => {
            let trailer  = &bytes[cursor..];
            let field    = FILE_TRAILER.checksum;
            let stored   = field.read_u32(trailer, cursor)?;
            let stored_le = field.with_endian(Endian::Little).read_u32(trailer, cursor)?;
            let computed = sum.finalize();
            if computed == stored {
                ChecksumStatus::Verified(ChecksumOrder::Big)
            } else if computed == stored_le {
                ChecksumStatus::Verified(ChecksumOrder::Little)
            } else {
                let w = ChecksumWarning { stored, computed };
                if policy == ChecksumPolicy::Strict {
                    return Err(BinaryCookiesError::Checksum(w));
                }
                warn!("{w}");
                ChecksumStatus::Mismatch(w)
            }
        }
    };

    Ok(Decoded { cookies, pages, checksum })
}

// ── Page ─────────────────────────────────────────────────────────────────────

/// Decode one page into `out`.  `base` is the page's absolute offset.
fn decode_page(page: &[u8], base: usize, out: &mut Vec<Cookie>) -> Result<PageInfo> {
    let mut magic = [0u8; 4];
    magic.copy_from_slice(PAGE_HEADER.magic.bytes(page, base)?);
    if !PAGE_HEADER.magic.matches_literal(page, base)? {
        warn!("page at {base}: unexpected magic {}", hex::encode(magic));
    }

    let count = PAGE_HEADER.cookie_count.read_u32(page, base)? as usize;
    let mut offsets = Vec::with_capacity(count.min(page.len() / 4));
    for i in 0..count {
        offsets.push(PAGE_HEADER.cookie_offset.entry(i).read_u32(page, base)? as usize);
    }

    out.reserve(count);
    let mut records_end = PAGE_HEADER.data_start(count);
    for (i, start) in offsets.into_iter().enumerate() {
        let table_entry = base + PAGE_HEADER.cookie_offset.entry(i).offset;
        let rest = page.get(start..).ok_or_else(|| {
            BinaryCookiesError::format(
                table_entry,
                format!("cookie {i} offset {start} lies outside a {}-byte page", page.len()),
            )
        })?;
        let size = COOKIE_HEADER.declared_size.read_u32(rest, base + start)? as usize;
        if size < COOKIE_HEADER.size {
            return Err(BinaryCookiesError::format(
                base + start,
                format!("cookie {i} declares {size} bytes, shorter than its {}-byte header", COOKIE_HEADER.size),
            ));
        }
        let record = rest.get(..size).ok_or_else(|| {
            BinaryCookiesError::format(
                base + page.len(),
                format!("cookie {i} declares {size} bytes at {start}, page ends at {}", page.len()),
            )
        })?;
        let cookie = decode_cookie(record, base + start)?;
        records_end = start + size;
        trace!("cookie {i} at {}: {}={} ({})", base + start, cookie.name, cookie.value, cookie.flag);
        out.push(cookie);
    }

    if records_end != page.len() {
        // Safari pages carry trailing bytes after the last record.
        debug!("page at {base}: records end at +{records_end}, page is {} bytes", page.len());
    }

    Ok(PageInfo { offset: base, size: page.len(), magic, cookie_count: count })
}

// ── Cookie record ────────────────────────────────────────────────────────────

/// Decode exactly one record.  `record` spans the declared size; `base` is
/// its absolute offset.
pub fn decode_cookie(record: &[u8], base: usize) -> Result<Cookie> {
    let h = COOKIE_HEADER;
    let flag = Flag::from_raw(h.flag.read_u32(record, base)?);

    // Strings follow the header in url, name, path, value order.
    let mut floor = h.size;
    let mut strings = Vec::with_capacity(4);
    for field in h.string_offsets() {
        let start = field.read_u32(record, base)? as usize;
        if start < floor {
            return Err(BinaryCookiesError::format(
                base + field.offset,
                format!("`{}` {start} must be at least {floor}", field.name),
            ));
        }
        let s = read_string(record, base, field, start)?;
        floor = start + s.len() + 1;
        strings.push(s);
    }
    let [url, name, path, value]: [String; 4] = strings
        .try_into()
        .map_err(|_| BinaryCookiesError::format(base, "record is missing a string"))?;

    let expiry_datetime = read_time(record, base, h.expiry_time)?;
    let create_datetime = read_time(record, base, h.create_time)?;

    Ok(Cookie { name, value, url, path, create_datetime, expiry_datetime, flag })
}

/// Follow an offset field to a NUL-terminated UTF-8 string.
fn read_string(record: &[u8], base: usize, offset_field: Field, start: usize) -> Result<String> {
    let tail = record.get(start..).filter(|t| !t.is_empty()).ok_or_else(|| {
        BinaryCookiesError::format(
            base + offset_field.offset,
            format!("`{}` {start} lies outside a {}-byte record", offset_field.name, record.len()),
        )
    })?;
    let len = tail.iter().position(|&b| b == 0).ok_or_else(|| {
        BinaryCookiesError::format(
            base + record.len(),
            format!("string at `{}` {start} runs off the end of its record", offset_field.name),
        )
    })?;
    String::from_utf8(tail[..len].to_vec()).map_err(|e| {
        BinaryCookiesError::format(
            base + start + e.utf8_error().valid_up_to(),
            format!("string at `{}` is not valid UTF-8", offset_field.name),
        )
    })
}

fn read_time(record: &[u8], base: usize, field: Field) -> Result<chrono::DateTime<chrono::Utc>> {
    let seconds = field.read_f64(record, base)?;
    from_mac_seconds(seconds).ok_or_else(|| {
        BinaryCookiesError::format(
            base + field.offset,
            format!("`{}` {seconds} is not a representable timestamp", field.name),
        )
    })
}
