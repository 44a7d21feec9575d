// tests/filter_policy.rs
use announce_monitor::{Announcement, AnnouncementFilter, FilterPolicy};
use chrono::DateTime;

fn ann(tag: Option<&str>) -> Announcement {
    Announcement {
        exchange: "OKX".into(),
        title: "t".into(),
        time: DateTime::parse_from_rfc3339("2024-01-01T00:00:00+00:00").unwrap(),
        url: "u".into(),
        tag: tag.map(str::to_string),
    }
}

#[test]
fn empty_allow_list_passes_everything() {
    let f = AnnouncementFilter::new(FilterPolicy::default());
    assert!(f.should_notify(&ann(Some("delist"))));
    assert!(f.should_notify(&ann(Some("anything"))));
    assert!(f.should_notify(&ann(None)));

    // allow_no_tag is irrelevant while the list is empty
    let f = AnnouncementFilter::new(FilterPolicy::allowing(Vec::<String>::new(), false));
    assert!(f.should_notify(&ann(None)));
}

#[test]
fn untagged_follows_allow_no_tag() {
    let strict = AnnouncementFilter::new(FilterPolicy::allowing(["new"], false));
    assert!(!strict.should_notify(&ann(None)));

    let lenient = AnnouncementFilter::new(FilterPolicy::allowing(["new"], true));
    assert!(lenient.should_notify(&ann(None)));
}

#[test]
fn tagged_passes_only_when_listed() {
    let f = AnnouncementFilter::new(FilterPolicy::allowing(["new", "delist"], true));
    assert!(f.should_notify(&ann(Some("new"))));
    assert!(f.should_notify(&ann(Some("delist"))));
    assert!(!f.should_notify(&ann(Some("airdrop"))));
    // exact match, no case folding
    assert!(!f.should_notify(&ann(Some("NEW"))));
}
