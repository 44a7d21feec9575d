// src/model.rs
//! Canonical announcement records and their content fingerprint.

use chrono::{DateTime, FixedOffset, Local, Timelike};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// A notice as produced by one feed, before classification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawAnnouncement {
    pub exchange: String, // e.g. "Binance", "OKX"
    pub title: String,
    pub time: DateTime<FixedOffset>,
    pub url: String,
}

/// A raw announcement plus the tag assigned by the tagger (if any).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Announcement {
    pub exchange: String,
    pub title: String,
    pub time: DateTime<FixedOffset>,
    pub url: String,
    pub tag: Option<String>,
}

impl RawAnnouncement {
    pub fn with_tag(self, tag: Option<String>) -> Announcement {
        Announcement {
            exchange: self.exchange,
            title: self.title,
            time: self.time,
            url: self.url,
            tag,
        }
    }

    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.exchange, &self.title, &self.time, &self.url)
    }
}

impl Announcement {
    /// Fingerprint over exchange, title, time and url. The tag is not part of it.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.exchange, &self.title, &self.time, &self.url)
    }

    pub fn local_time(&self) -> DateTime<Local> {
        self.time.with_timezone(&Local)
    }
}

/// Hex SHA-256 of `"{exchange}-{title}-{isoformat(time)}-{url}"`.
///
/// The construction is shared with history files written by earlier
/// deployments, so it must stay byte-for-byte stable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn compute(exchange: &str, title: &str, time: &DateTime<FixedOffset>, url: &str) -> Self {
        let unique = format!("{exchange}-{title}-{}-{url}", isoformat(time));
        let digest = Sha256::digest(unique.as_bytes());
        Self(digest.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Parse a stored fingerprint: exactly 64 hex digits, normalized to lowercase.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()) {
            Some(Self(s.to_ascii_lowercase()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// ISO-8601 rendering with explicit offset:
/// `YYYY-MM-DDTHH:MM:SS[.ffffff]+HH:MM[:SS]`.
/// Microseconds appear only when non-zero; UTC is `+00:00`, never `Z`.
pub fn isoformat(time: &DateTime<FixedOffset>) -> String {
    let mut out = time.format("%Y-%m-%dT%H:%M:%S").to_string();

    let micros = time.nanosecond() % 1_000_000_000 / 1_000;
    if micros != 0 {
        out.push_str(&format!(".{micros:06}"));
    }

    let offset = time.offset().local_minus_utc();
    let sign = if offset < 0 { '-' } else { '+' };
    let abs = offset.unsigned_abs();
    let (h, m, s) = (abs / 3600, abs % 3600 / 60, abs % 60);
    out.push_str(&format!("{sign}{h:02}:{m:02}"));
    if s != 0 {
        out.push_str(&format!(":{s:02}"));
    }
    out
}
