//! Encoder: [`Cookie`] records to `Cookies.binarycookies` bytes.
//!
//! Three levels, each reusable on its own:
//!   - [`encode_one`]: one cookie record (56-byte header + four strings);
//!   - [`encode_page`]: page header, offset table, padding, records;
//!   - [`encode_with`]: file header, pages, checksum, optional footer.
//!
//! Every input is validated before the first byte is produced; a failed
//! encode leaves nothing behind.

use log::{debug, trace};

use crate::checksum::Checksum;
use crate::cookie::{to_mac_seconds, Cookie, TimestampPrecision};
use crate::error::{BinaryCookiesError, Result};
use crate::layout::{Endian, COOKIE_HEADER, FILE_FOOTER, FILE_HEADER, FILE_TRAILER, PAGE_HEADER};

// ── Options ──────────────────────────────────────────────────────────────────

/// Byte order of the trailing checksum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumOrder {
    /// What Safari writes.
    #[default]
    Big,
    /// What several third-party writers emit.
    Little,
}

/// Configuration for [`encode_with`].
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    pub precision:        TimestampPrecision,
    /// `None` puts every cookie in one page.
    pub cookies_per_page: Option<usize>,
    pub checksum_order:   ChecksumOrder,
    /// Append Safari's 8-byte trailer after the checksum.
    pub footer:           bool,
}

// ── Record ───────────────────────────────────────────────────────────────────

/// Encode one cookie with whole-second timestamps.
pub fn encode_one(cookie: &Cookie) -> Result<Vec<u8>> {
    encode_one_with(cookie, TimestampPrecision::WholeSeconds)
}

pub fn encode_one_with(cookie: &Cookie, precision: TimestampPrecision) -> Result<Vec<u8>> {
    let h = COOKIE_HEADER;
    let strings: [(&str, &[u8]); 4] = [
        ("url",   cookie.url.as_bytes()),
        ("name",  cookie.name.as_bytes()),
        ("path",  cookie.path.as_bytes()),
        ("value", cookie.value.as_bytes()),
    ];
    for (field, bytes) in strings {
        if bytes.contains(&0) {
            return Err(BinaryCookiesError::validation(field, "contains a NUL byte"));
        }
    }

    let total = h.size + strings.iter().map(|(_, s)| s.len() + 1).sum::<usize>();
    let total_u32 = u32::try_from(total)
        .map_err(|_| BinaryCookiesError::validation("cookie", format!("record of {total} bytes exceeds u32")))?;

    let mut buf = vec![0u8; h.size];
    buf.reserve_exact(total - h.size);
    h.flag.write_u32(&mut buf, cookie.flag.raw());

    let mut at = h.size;
    for (field, (_, bytes)) in h.string_offsets().into_iter().zip(strings) {
        field.write_u32(&mut buf, at as u32);
        at += bytes.len() + 1;
    }

    h.expiry_time.write_f64(&mut buf, to_mac_seconds(&cookie.expiry_datetime, precision));
    h.create_time.write_f64(&mut buf, to_mac_seconds(&cookie.create_datetime, precision));

    for (_, bytes) in strings {
        buf.extend_from_slice(bytes);
        buf.push(0);
    }

    // Size goes in last, once the buffer is complete.
    debug_assert_eq!(buf.len(), total);
    h.declared_size.write_u32(&mut buf, total_u32);
    Ok(buf)
}

// ── Page ─────────────────────────────────────────────────────────────────────

/// Assemble a page from already-encoded records.
pub fn encode_page(records: &[Vec<u8>]) -> Result<Vec<u8>> {
    let p = PAGE_HEADER;
    let data_start = p.data_start(records.len());
    let page_len = data_start + records.iter().map(Vec::len).sum::<usize>();
    let count = u32::try_from(records.len())
        .map_err(|_| BinaryCookiesError::InvalidInput(format!("{} cookies do not fit one page", records.len())))?;
    if u32::try_from(page_len).is_err() {
        return Err(BinaryCookiesError::InvalidInput(format!("page of {page_len} bytes exceeds u32")));
    }

    let mut page = vec![0u8; data_start];
    page.reserve_exact(page_len - data_start);
    p.magic.write_literal(&mut page);
    p.cookie_count.write_u32(&mut page, count);

    let mut at = data_start;
    for (i, rec) in records.iter().enumerate() {
        p.cookie_offset.entry(i).write_u32(&mut page, at as u32);
        at += rec.len();
    }
    for rec in records {
        page.extend_from_slice(rec);
    }
    trace!("page: {} record(s), {} bytes", records.len(), page.len());
    Ok(page)
}

// ── File ─────────────────────────────────────────────────────────────────────

/// Encode with default options: one page, whole seconds, big-endian checksum.
pub fn encode(cookies: &[Cookie]) -> Result<Vec<u8>> {
    encode_with(cookies, &EncodeOptions::default())
}

pub fn encode_with(cookies: &[Cookie], opts: &EncodeOptions) -> Result<Vec<u8>> {
    let per_page = match opts.cookies_per_page {
        Some(0) => return Err(BinaryCookiesError::InvalidInput("cookies_per_page must be at least 1".into())),
        Some(n) => n,
        None    => cookies.len().max(1),
    };

    let records = cookies
        .iter()
        .enumerate()
        .map(|(i, c)| {
            encode_one_with(c, opts.precision).map_err(|e| match e {
                BinaryCookiesError::Validation { field, reason } => {
                    BinaryCookiesError::Validation { field: format!("[{i}].{field}"), reason }
                }
                other => other,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let mut pages = Vec::new();
    if records.is_empty() {
        pages.push(encode_page(&[])?);
    }
    for chunk in records.chunks(per_page) {
        pages.push(encode_page(chunk)?);
    }
    let page_count = u32::try_from(pages.len())
        .map_err(|_| BinaryCookiesError::InvalidInput(format!("{} pages exceed u32", pages.len())))?;

    let header_len = FILE_HEADER.len(pages.len());
    let body_len: usize = pages.iter().map(Vec::len).sum();
    let trailer_len = if opts.footer { FILE_TRAILER.footer.end() } else { FILE_TRAILER.checksum.end() };

    let mut out = vec![0u8; header_len];
    out.reserve_exact(body_len + trailer_len);
    FILE_HEADER.magic.write_literal(&mut out);
    FILE_HEADER.page_count.write_u32(&mut out, page_count);
    for (i, page) in pages.iter().enumerate() {
        // encode_page already bounded each page length to u32.
        FILE_HEADER.page_size.entry(i).write_u32(&mut out, page.len() as u32);
    }

    let mut sum = Checksum::new();
    for page in &pages {
        sum.update(page);
        out.extend_from_slice(page);
    }

    let order = match opts.checksum_order {
        ChecksumOrder::Big    => Endian::Big,
        ChecksumOrder::Little => Endian::Little,
    };
    let mut trailer = vec![0u8; trailer_len];
    FILE_TRAILER.checksum.with_endian(order).write_u32(&mut trailer, sum.finalize());
    if opts.footer {
        FILE_TRAILER.footer.write_literal(&mut trailer);
        debug_assert_eq!(&trailer[4..], &FILE_FOOTER);
    }
    out.extend_from_slice(&trailer);

    debug!("encoded {} cookie(s) into {} page(s), {} bytes", cookies.len(), pages.len(), out.len());
    Ok(out)
}
