use binarycookies::layout::{COOKIE_HEADER, FILE_HEADER, PAGE_HEADER};
use binarycookies::{
    ChecksumOrder, ChecksumPolicy, ChecksumStatus, Cookie, DecodeOptions, EncodeOptions, Flag,
    TimestampPrecision,
};
use chrono::{TimeZone, Utc};
use std::fs::File;
use tempfile::NamedTempFile;

fn scenario_a() -> Cookie {
    Cookie {
        name:            "a".into(),
        value:           "b".into(),
        url:             "http://x.com".into(),
        path:            "/".into(),
        create_datetime: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
        expiry_datetime: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        flag:            Flag::Secure,
    }
}

fn jar() -> Vec<Cookie> {
    let mut v = vec![scenario_a()];
    for (i, flag) in [Flag::HttpOnly, Flag::SecureHttpOnly, Flag::Unknown].into_iter().enumerate() {
        v.push(Cookie {
            name:  format!("n{i}"),
            value: "välue ✓".repeat(i + 1),
            url:   ".example.org".into(),
            path:  format!("/p/{i}"),
            flag,
            ..scenario_a()
        });
    }
    v
}

#[test]
fn test_scenario_a_single_record() {
    let bytes = binarycookies::dumps(scenario_a()).unwrap();
    let cookies = binarycookies::loads(&bytes).unwrap();
    assert_eq!(cookies, vec![scenario_a()]);
    assert_eq!(cookies[0].flag, Flag::Secure);
}

#[test]
fn test_scenario_b_empty_list() {
    let bytes = binarycookies::dumps(Vec::<Cookie>::new()).unwrap();
    assert_eq!(FILE_HEADER.page_count.read_u32(&bytes, 0).unwrap(), 1);
    let page = &bytes[FILE_HEADER.len(1)..];
    assert_eq!(PAGE_HEADER.cookie_count.read_u32(page, 0).unwrap(), 0);

    let decoded = binarycookies::loads_with(&bytes, &DecodeOptions::default()).unwrap();
    assert!(decoded.cookies.is_empty());
    assert_eq!(decoded.checksum, ChecksumStatus::Verified(ChecksumOrder::Big));
}

#[test]
fn test_scenario_c_truncated_to_ten_bytes() {
    let bytes = binarycookies::dumps(scenario_a()).unwrap();
    let err = binarycookies::loads(&bytes[..10]).unwrap_err();
    let offset = err.offset().expect("format error carries an offset");
    assert!(offset <= 10, "offset {offset} past truncation point");
}

#[test]
fn test_truncated_at_every_length() {
    let bytes = binarycookies::dumps(jar()).unwrap();
    let pages_end = bytes.len() - 4;
    for len in (0..bytes.len()).filter(|&len| len != pages_end) {
        let err = binarycookies::loads(&bytes[..len]).unwrap_err();
        assert!(err.offset().unwrap() <= len, "len {len}: {err}");
    }
    // Ending exactly after the last page just means no checksum.
    let decoded = binarycookies::loads_with(&bytes[..pages_end], &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.checksum, ChecksumStatus::Absent);
    assert_eq!(decoded.cookies, jar());
}

#[test]
fn test_scenario_d_flipped_page_byte() {
    let mut bytes = binarycookies::dumps(scenario_a()).unwrap();
    // First reserved word after the one-entry offset table: positions that
    // are a multiple of 4 feed the checksum, and nothing reads this one.
    let at = FILE_HEADER.len(1) + PAGE_HEADER.cookie_offset.entry(1).offset;
    bytes[at] ^= 0xFF;

    let decoded = binarycookies::loads_with(&bytes, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.cookies, vec![scenario_a()]);
    let warning = decoded.warning().expect("checksum warning");
    assert_ne!(warning.stored, warning.computed);

    let strict = DecodeOptions { checksum: ChecksumPolicy::Strict };
    assert!(binarycookies::loads_with(&bytes, &strict).is_err());
}

#[test]
fn test_many_records_roundtrip() {
    let bytes = binarycookies::dumps(jar()).unwrap();
    assert_eq!(binarycookies::loads(&bytes).unwrap(), jar());
}

#[test]
fn test_multi_page_roundtrip() {
    let opts = EncodeOptions { cookies_per_page: Some(3), ..Default::default() };
    let bytes = binarycookies::dumps_with(jar(), &opts).unwrap();
    let decoded = binarycookies::loads_with(&bytes, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.cookies, jar());
    assert_eq!(decoded.pages.iter().map(|p| p.cookie_count).collect::<Vec<_>>(), vec![3, 1]);
    assert_eq!(decoded.checksum, ChecksumStatus::Verified(ChecksumOrder::Big));
}

#[test]
fn test_little_endian_checksum_and_footer_verify() {
    let opts = EncodeOptions {
        checksum_order: ChecksumOrder::Little,
        footer: true,
        ..Default::default()
    };
    let bytes = binarycookies::dumps_with(jar(), &opts).unwrap();
    let decoded = binarycookies::loads_with(&bytes, &DecodeOptions::default()).unwrap();
    assert_eq!(decoded.checksum, ChecksumStatus::Verified(ChecksumOrder::Little));
    assert_eq!(decoded.cookies, jar());
}

#[test]
fn test_subsecond_precision() {
    let mut c = scenario_a();
    c.expiry_datetime = c.expiry_datetime + chrono::TimeDelta::milliseconds(250);

    let truncated = binarycookies::loads(&binarycookies::dumps(c.clone()).unwrap()).unwrap();
    assert_eq!(truncated[0].expiry_datetime, scenario_a().expiry_datetime);

    let opts = EncodeOptions { precision: TimestampPrecision::Subsecond, ..Default::default() };
    let precise = binarycookies::loads(&binarycookies::dumps_with(c.clone(), &opts).unwrap()).unwrap();
    assert_eq!(precise[0].expiry_datetime, c.expiry_datetime);
}

#[test]
fn test_load_dump_through_files() {
    let temp_file = NamedTempFile::new().unwrap();
    binarycookies::dump(jar(), File::create(temp_file.path()).unwrap()).unwrap();
    let cookies = binarycookies::load(File::open(temp_file.path()).unwrap()).unwrap();
    assert_eq!(cookies, jar());
}

#[test]
fn test_failed_dump_writes_nothing() {
    let mut bad = scenario_a();
    bad.path = "/\0".into();
    let mut sink = Vec::new();
    assert!(binarycookies::dump(bad, &mut sink).is_err());
    assert!(sink.is_empty());
}

#[test]
fn test_json_mappings_encode() {
    let value = serde_json::json!([
        {
            "name": "a", "value": "b", "url": "http://x.com", "path": "/",
            "create_datetime": "2024-01-01T00:00:00Z",
            "expiry_datetime": "2025-01-01T00:00:00+00:00",
            "flag": "Secure"
        }
    ]);
    let input = binarycookies::CookieInput::try_from(value).unwrap();
    let bytes = binarycookies::dumps(input).unwrap();
    assert_eq!(bytes, binarycookies::dumps(scenario_a()).unwrap());
}

#[test]
fn test_reference_byte_layout() {
    let bytes = binarycookies::dumps(scenario_a()).unwrap();
    let page_at = FILE_HEADER.len(1);
    let record_at = page_at + PAGE_HEADER.data_start(1);
    let record = &bytes[record_at..bytes.len() - 4];

    assert_eq!(&bytes[..4], b"cook");
    assert_eq!(&bytes[page_at..page_at + 4], &[0, 0, 1, 0]);
    assert_eq!(COOKIE_HEADER.declared_size.read_u32(record, 0).unwrap() as usize, record.len());
    assert_eq!(COOKIE_HEADER.create_time.read_f64(record, 0).unwrap(), 725_760_000.0);
    assert_eq!(COOKIE_HEADER.expiry_time.read_f64(record, 0).unwrap(), 757_382_400.0);
    assert_eq!(&record[56..], b"http://x.com\0a\0/\0b\0");
}

#[test]
fn test_corrupt_url_offset_is_rejected() {
    let mut bytes = binarycookies::dumps(scenario_a()).unwrap();
    let record_at = FILE_HEADER.len(1) + PAGE_HEADER.data_start(1);
    let at = record_at + COOKIE_HEADER.url_offset.offset;
    bytes[at..at + 4].copy_from_slice(&0u32.to_le_bytes());

    let err = binarycookies::loads(&bytes).unwrap_err();
    assert_eq!(err.offset(), Some(at));
}
