// tests/fingerprint.rs
use announce_monitor::model::isoformat;
use announce_monitor::{Fingerprint, RawAnnouncement};
use chrono::DateTime;

fn raw(exchange: &str, title: &str, time: &str, url: &str) -> RawAnnouncement {
    RawAnnouncement {
        exchange: exchange.into(),
        title: title.into(),
        time: DateTime::parse_from_rfc3339(time).unwrap(),
        url: url.into(),
    }
}

#[test]
fn same_fields_same_fingerprint() {
    let a = raw("X", "Delisting ABC", "2024-01-01T00:00:00+00:00", "u1");
    let b = a.clone();
    assert_eq!(a.fingerprint(), b.fingerprint());
    // recomputed from scratch, as a fresh process would
    let again = Fingerprint::compute("X", "Delisting ABC", &a.time, "u1");
    assert_eq!(a.fingerprint(), again);
}

#[test]
fn every_field_changes_the_fingerprint() {
    let base = raw("X", "Delisting ABC", "2024-01-01T00:00:00+00:00", "u1");
    let fp = base.fingerprint();
    assert_ne!(fp, raw("Y", "Delisting ABC", "2024-01-01T00:00:00+00:00", "u1").fingerprint());
    assert_ne!(fp, raw("X", "Delisting ABD", "2024-01-01T00:00:00+00:00", "u1").fingerprint());
    assert_ne!(fp, raw("X", "Delisting ABC", "2024-01-01T00:00:01+00:00", "u1").fingerprint());
    assert_ne!(fp, raw("X", "Delisting ABC", "2024-01-01T00:00:00+00:00", "u2").fingerprint());
}

#[test]
fn same_instant_in_another_offset_is_a_different_fingerprint() {
    // the offset is part of the rendered time
    let utc = raw("X", "t", "2024-01-01T08:00:00+00:00", "u");
    let cst = raw("X", "t", "2024-01-01T16:00:00+08:00", "u");
    assert_eq!(utc.time, cst.time);
    assert_ne!(utc.fingerprint(), cst.fingerprint());
}

#[test]
fn tag_is_not_part_of_the_fingerprint() {
    let r = raw("OKX", "上线 XYZ", "2024-06-01T10:30:00+08:00", "https://okx.test/a");
    let tagged = r.clone().with_tag(Some("new".into()));
    let untagged = r.clone().with_tag(None);
    assert_eq!(tagged.fingerprint(), untagged.fingerprint());
    assert_eq!(tagged.fingerprint(), r.fingerprint());
}

#[test]
fn rendered_time_uses_numeric_offsets() {
    let t = DateTime::parse_from_rfc3339("2024-06-01T10:30:00.250Z").unwrap();
    assert_eq!(isoformat(&t), "2024-06-01T10:30:00.250000+00:00");
}
