// src/filter.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::model::Announcement;

/// `[filter]` section of the monitor config.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FilterPolicy {
    #[serde(default)]
    pub allowed_tags: HashSet<String>,
    #[serde(default)]
    pub allow_no_tag: bool,
}

impl FilterPolicy {
    pub fn allowing<I, S>(tags: I, allow_no_tag: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed_tags: tags.into_iter().map(Into::into).collect(),
            allow_no_tag,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AnnouncementFilter {
    policy: FilterPolicy,
}

impl AnnouncementFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Empty allow-list passes everything (unconfigured mode).
    pub fn should_notify(&self, ann: &Announcement) -> bool {
        if self.policy.allowed_tags.is_empty() {
            return true;
        }
        match ann.tag.as_deref() {
            Some(tag) => self.policy.allowed_tags.contains(tag),
            None => self.policy.allow_no_tag,
        }
    }
}
