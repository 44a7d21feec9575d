// src/tagger.rs
//! Title tagger: ordered regex rules, first match wins.
//!
//! Rules come from the `[[tag_rules]]` tables of the monitor config:
//! ```toml
//! [[tag_rules]]
//! tag = "delist"
//! patterns = ["下架|delist"]
//! case_sensitive = false   # optional, default false
//! ```
//! Each pattern is a regex searched anywhere in the title. Invalid patterns
//! are skipped with a warning; they never prevent the tagger from building.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::{Announcement, RawAnnouncement};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagRule {
    pub tag: String,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default)]
    pub case_sensitive: bool,
}

impl TagRule {
    pub fn new(tag: &str, patterns: &[&str]) -> Self {
        Self {
            tag: tag.to_string(),
            patterns: patterns.iter().map(|p| p.to_string()).collect(),
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self) -> Self {
        self.case_sensitive = true;
        self
    }
}

#[derive(Debug)]
struct CompiledRule {
    tag: String,
    patterns: Vec<Regex>,
}

impl CompiledRule {
    fn matches(&self, title: &str) -> bool {
        self.patterns.iter().any(|re| re.is_match(title))
    }
}

#[derive(Debug, Default)]
pub struct Tagger {
    rules: Vec<CompiledRule>,
}

impl Tagger {
    /// Compile rules in their configured order.
    pub fn new(rules: &[TagRule]) -> Self {
        let mut compiled = Vec::with_capacity(rules.len());
        for rule in rules {
            if rule.tag.trim().is_empty() {
                warn!(target: "monitor", "tag rule without a tag name skipped");
                continue;
            }
            let mut patterns = Vec::with_capacity(rule.patterns.len());
            for p in &rule.patterns {
                match RegexBuilder::new(p)
                    .case_insensitive(!rule.case_sensitive)
                    .build()
                {
                    Ok(re) => patterns.push(re),
                    Err(e) => {
                        warn!(target: "monitor", tag = %rule.tag, pattern = %p, error = %e, "invalid tag pattern skipped")
                    }
                }
            }
            compiled.push(CompiledRule {
                tag: rule.tag.clone(),
                patterns,
            });
        }
        Self { rules: compiled }
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    /// Tag of the first rule whose patterns match `title`.
    pub fn match_tag(&self, title: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|r| r.matches(title))
            .map(|r| r.tag.as_str())
    }

    pub fn tag(&self, raw: RawAnnouncement) -> Announcement {
        let tag = self.match_tag(&raw.title).map(str::to_string);
        raw.with_tag(tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange_rules() -> Vec<TagRule> {
        vec![
            TagRule::new("delist", &["下架|delist"]),
            TagRule::new("new", &["上线|listing", r"will list"]),
            TagRule::new("maintenance", &["维护", "maintenance"]),
        ]
    }

    #[test]
    fn first_matching_rule_wins() {
        let t = Tagger::new(&exchange_rules());
        assert_eq!(t.match_tag("币安下架并上线XYZ"), Some("delist"));
        assert_eq!(t.match_tag("币安将上线 XYZ/USDT 交易对"), Some("new"));
        assert_eq!(t.match_tag("这是一个普通公告"), None);
    }

    #[test]
    fn matching_is_case_insensitive_by_default() {
        let t = Tagger::new(&exchange_rules());
        assert_eq!(t.match_tag("Binance Will List ABC (ABC)"), Some("new"));
        assert_eq!(t.match_tag("Scheduled MAINTENANCE Notification"), Some("maintenance"));
    }

    #[test]
    fn case_sensitive_rule_respects_case() {
        let t = Tagger::new(&[TagRule::new("ann", &["ANN"]).case_sensitive()]);
        assert_eq!(t.match_tag("ANN: news"), Some("ann"));
        assert_eq!(t.match_tag("ann: news"), None);
    }

    #[test]
    fn invalid_pattern_skipped_rest_of_rule_kept() {
        let t = Tagger::new(&[TagRule::new("delist", &["(unclosed", "delist"])]);
        assert_eq!(t.rule_count(), 1);
        assert_eq!(t.match_tag("Delisting Notice"), Some("delist"));
    }

    #[test]
    fn nameless_rule_is_dropped() {
        let t = Tagger::new(&[TagRule::new("  ", &["x"])]);
        assert_eq!(t.rule_count(), 0);
        assert_eq!(t.match_tag("x"), None);
    }
}
