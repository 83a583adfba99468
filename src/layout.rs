//! Layout registry: every byte offset, width and byte order the codec uses.
//!
//! # Structures
//! A `Cookies.binarycookies` file is laid out as:
//!
//! ```text
//! +--------+------------+----------------------+-----------+----------+----------+
//! | "cook" | page_count | page_size[page_count] | page 0 .. | checksum | (footer) |
//! |  4 B   |   4 B BE   |      4 B BE each      | page n-1  |   4 B    |   8 B    |
//! +--------+------------+----------------------+-----------+----------+----------+
//! ```
//!
//! Each page starts with a 4-byte magic (`00 00 01 00`), a little-endian
//! cookie count, one little-endian offset per cookie (relative to the page
//! start) and 12 reserved bytes.  Each cookie record starts with the 56-byte
//! header described by [`COOKIE_HEADER`]; its four strings follow, addressed
//! by offsets that are absolute within the record.
//!
//! # Rules
//! The decoder and the encoder never type a literal offset.  They look a
//! [`Field`] up here and use its accessors, so both directions agree on the
//! wire layout by construction.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::error::{BinaryCookiesError, Result};

// ── Field description ────────────────────────────────────────────────────────

/// Byte order of a numeric field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endian {
    Big,
    Little,
}

/// What a field holds on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// A fixed byte string that must (or should) appear verbatim.
    Literal(&'static [u8]),
    /// Unsigned 32-bit integer.
    U32,
    /// IEEE-754 double.
    F64,
}

/// One entry of the registry: where a field lives inside its structure.
///
/// `offset` is relative to the start of the enclosing structure (file, page
/// or cookie record).  Table fields (page sizes, cookie offsets) describe
/// entry 0; use [`Field::entry`] to address entry `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    pub name:   &'static str,
    pub offset: usize,
    pub width:  usize,
    pub kind:   FieldKind,
    pub endian: Endian,
}

impl Field {
    const fn new(name: &'static str, offset: usize, width: usize, kind: FieldKind, endian: Endian) -> Self {
        Self { name, offset, width, kind, endian }
    }

    /// Entry `i` of a table field whose entries are packed back to back.
    #[inline]
    pub const fn entry(self, i: usize) -> Self {
        Self { offset: self.offset + self.width * i, ..self }
    }

    /// Same field, different byte order.
    #[inline]
    pub const fn with_endian(self, endian: Endian) -> Self {
        Self { endian, ..self }
    }

    /// First byte after this field.
    #[inline]
    pub const fn end(self) -> usize {
        self.offset + self.width
    }

    /// Raw bytes of this field inside `buf`.
    ///
    /// `base` is the absolute position of `buf[0]` in the original input and
    /// is only used to report where a short read happened.
    pub fn bytes<'a>(&self, buf: &'a [u8], base: usize) -> Result<&'a [u8]> {
        buf.get(self.offset..self.end()).ok_or_else(|| {
            BinaryCookiesError::format(
                base + buf.len().min(self.end()),
                format!(
                    "truncated while reading `{}` ({} bytes at +{}, {} available)",
                    self.name, self.width, self.offset, buf.len(),
                ),
            )
        })
    }

    /// `true` when the bytes in `buf` equal this field's literal.
    pub fn matches_literal(&self, buf: &[u8], base: usize) -> Result<bool> {
        let raw = self.bytes(buf, base)?;
        match self.kind {
            FieldKind::Literal(expected) => Ok(raw == expected),
            _ => Ok(false),
        }
    }

    pub fn read_u32(&self, buf: &[u8], base: usize) -> Result<u32> {
        debug_assert_eq!(self.kind, FieldKind::U32);
        let raw = self.bytes(buf, base)?;
        Ok(match self.endian {
            Endian::Big    => BigEndian::read_u32(raw),
            Endian::Little => LittleEndian::read_u32(raw),
        })
    }

    pub fn read_f64(&self, buf: &[u8], base: usize) -> Result<f64> {
        debug_assert_eq!(self.kind, FieldKind::F64);
        let raw = self.bytes(buf, base)?;
        Ok(match self.endian {
            Endian::Big    => BigEndian::read_f64(raw),
            Endian::Little => LittleEndian::read_f64(raw),
        })
    }

    /// Write into a buffer that is already sized to hold the structure.
    ///
    /// # Panics
    /// If `buf` is shorter than `self.end()`; callers size the buffer from
    /// this same registry first.
    pub fn write_u32(&self, buf: &mut [u8], value: u32) {
        let raw = &mut buf[self.offset..self.end()];
        match self.endian {
            Endian::Big    => BigEndian::write_u32(raw, value),
            Endian::Little => LittleEndian::write_u32(raw, value),
        }
    }

    pub fn write_f64(&self, buf: &mut [u8], value: f64) {
        let raw = &mut buf[self.offset..self.end()];
        match self.endian {
            Endian::Big    => BigEndian::write_f64(raw, value),
            Endian::Little => LittleEndian::write_f64(raw, value),
        }
    }

    /// Copy this field's literal into `buf`.  No-op for numeric fields.
    pub fn write_literal(&self, buf: &mut [u8]) {
        if let FieldKind::Literal(bytes) = self.kind {
            buf[self.offset..self.offset + bytes.len()].copy_from_slice(bytes);
        }
    }
}

// ── File header ──────────────────────────────────────────────────────────────

pub const FILE_MAGIC: &[u8; 4] = b"cook";

#[derive(Debug, Clone, Copy)]
pub struct FileHeaderLayout {
    pub magic:      Field,
    pub page_count: Field,
    /// Entry 0 of the page-size table; one entry per page.
    pub page_size:  Field,
}

impl FileHeaderLayout {
    /// Header length (and offset of the first page) for `pages` pages.
    #[inline]
    pub const fn len(&self, pages: usize) -> usize {
        self.page_size.entry(pages).offset
    }
}

pub const FILE_HEADER: FileHeaderLayout = FileHeaderLayout {
    magic:      Field::new("magic",      0, 4, FieldKind::Literal(FILE_MAGIC), Endian::Big),
    page_count: Field::new("page_count", 4, 4, FieldKind::U32, Endian::Big),
    page_size:  Field::new("page_size",  8, 4, FieldKind::U32, Endian::Big),
};

// ── File trailer ─────────────────────────────────────────────────────────────

/// Trailer Safari appends after the checksum.
pub const FILE_FOOTER: [u8; 8] = [0x07, 0x17, 0x20, 0x05, 0x00, 0x00, 0x00, 0x4b];

#[derive(Debug, Clone, Copy)]
pub struct FileTrailerLayout {
    /// Offset is relative to the first byte after the last page.
    pub checksum: Field,
    pub footer:   Field,
}

pub const FILE_TRAILER: FileTrailerLayout = FileTrailerLayout {
    checksum: Field::new("checksum", 0, 4, FieldKind::U32, Endian::Big),
    footer:   Field::new("footer",   4, 8, FieldKind::Literal(&FILE_FOOTER), Endian::Big),
};

// ── Page header ──────────────────────────────────────────────────────────────

pub const PAGE_MAGIC: &[u8; 4] = &[0x00, 0x00, 0x01, 0x00];

#[derive(Debug, Clone, Copy)]
pub struct PageHeaderLayout {
    pub magic:         Field,
    pub cookie_count:  Field,
    /// Entry 0 of the offset table; one entry per cookie.
    pub cookie_offset: Field,
    /// Zero bytes between the offset table and the first record.
    pub reserved_len:  usize,
}

impl PageHeaderLayout {
    /// Offset of the first cookie record in a page holding `cookies` records.
    #[inline]
    pub const fn data_start(&self, cookies: usize) -> usize {
        self.cookie_offset.entry(cookies).offset + self.reserved_len
    }
}

pub const PAGE_HEADER: PageHeaderLayout = PageHeaderLayout {
    magic:         Field::new("page_magic",    0, 4, FieldKind::Literal(PAGE_MAGIC), Endian::Big),
    cookie_count:  Field::new("cookie_count",  4, 4, FieldKind::U32, Endian::Little),
    cookie_offset: Field::new("cookie_offset", 8, 4, FieldKind::U32, Endian::Little),
    reserved_len:  12,
};

// ── Cookie record header ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct CookieHeaderLayout {
    pub declared_size: Field,
    pub flag:          Field,
    pub url_offset:    Field,
    pub name_offset:   Field,
    pub path_offset:   Field,
    pub value_offset:  Field,
    pub expiry_time:   Field,
    pub create_time:   Field,
    /// Fixed header length; string data starts here.
    pub size:          usize,
}

impl CookieHeaderLayout {
    /// The string-offset fields in on-disk payload order.
    #[inline]
    pub const fn string_offsets(&self) -> [Field; 4] {
        [self.url_offset, self.name_offset, self.path_offset, self.value_offset]
    }
}

pub const COOKIE_HEADER: CookieHeaderLayout = CookieHeaderLayout {
    declared_size: Field::new("declared_size",  0, 4, FieldKind::U32, Endian::Little),
    flag:          Field::new("flag",           8, 4, FieldKind::U32, Endian::Little),
    url_offset:    Field::new("url_offset",    16, 4, FieldKind::U32, Endian::Little),
    name_offset:   Field::new("name_offset",   20, 4, FieldKind::U32, Endian::Little),
    path_offset:   Field::new("path_offset",   24, 4, FieldKind::U32, Endian::Little),
    value_offset:  Field::new("value_offset",  28, 4, FieldKind::U32, Endian::Little),
    expiry_time:   Field::new("expiry_time",   40, 8, FieldKind::F64, Endian::Little),
    create_time:   Field::new("create_time",   48, 8, FieldKind::F64, Endian::Little),
    size:          56,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_header_fields_fit_inside_fixed_header() {
        let h = COOKIE_HEADER;
        for f in [h.declared_size, h.flag, h.expiry_time, h.create_time]
            .into_iter()
            .chain(h.string_offsets())
        {
            assert!(f.end() <= h.size, "{} overruns the header", f.name);
        }
        assert_eq!(h.create_time.end(), h.size);
    }

    #[test]
    fn table_entries_are_packed() {
        assert_eq!(FILE_HEADER.page_size.entry(0).offset, 8);
        assert_eq!(FILE_HEADER.page_size.entry(3).offset, 20);
        assert_eq!(FILE_HEADER.len(1), 12);
        assert_eq!(PAGE_HEADER.data_start(0), 20);
        assert_eq!(PAGE_HEADER.data_start(2), 28);
    }

    #[test]
    fn mixed_endianness_reads() {
        let buf = [0x00, 0x00, 0x00, 0x02, 0x02, 0x00, 0x00, 0x00];
        let be = Field::new("x", 0, 4, FieldKind::U32, Endian::Big);
        let le = Field::new("y", 4, 4, FieldKind::U32, Endian::Little);
        assert_eq!(be.read_u32(&buf, 0).unwrap(), 2);
        assert_eq!(le.read_u32(&buf, 0).unwrap(), 2);
        assert_eq!(be.with_endian(Endian::Little).read_u32(&buf, 0).unwrap(), 0x0200_0000);
    }

    #[test]
    fn short_read_reports_absolute_offset() {
        let buf = [0u8; 6];
        let err = FILE_HEADER.page_size.read_u32(&buf, 100).unwrap_err();
        match err {
            BinaryCookiesError::Format { offset, .. } => assert_eq!(offset, 106),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn literal_write_and_match() {
        let mut buf = [0u8; 8];
        FILE_HEADER.magic.write_literal(&mut buf);
        assert_eq!(&buf[..4], b"cook");
        assert!(FILE_HEADER.magic.matches_literal(&buf, 0).unwrap());
        assert!(!PAGE_HEADER.magic.matches_literal(&buf, 0).unwrap());
    }

    #[test]
    fn f64_roundtrip_through_field() {
        let mut buf = [0u8; 56];
        COOKIE_HEADER.expiry_time.write_f64(&mut buf, 725_760_000.0);
        assert_eq!(&buf[40..48], &725_760_000.0f64.to_le_bytes());
        assert_eq!(COOKIE_HEADER.expiry_time.read_f64(&buf, 0).unwrap(), 725_760_000.0);
    }
}
