// src/ingest/providers/okx.rs
//! OKX help-centre sections. The page embeds its data as JSON in a
//! `<script id="appState">` tag; the article list lives at
//! `appContext.initialProps.sectionData.articleList.items`.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::BROWSER_UA;
use crate::ingest::types::AnnouncementSource;
use crate::model::RawAnnouncement;

pub const DEFAULT_SECTION: &str = "announcements-latest-announcements";

static RE_APP_STATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<script[^>]*id="appState"[^>]*>(.*?)</script>"#).expect("static regex")
});

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    slug: Option<String>,
    #[serde(rename = "publishTime")]
    publish_time: Option<String>,
}

pub struct OkxSource {
    mode: Mode,
    sections: Vec<String>,
    lang: String,
}

enum Mode {
    Fixture(String),
    Http { client: Client },
}

impl OkxSource {
    pub fn from_fixture_str(html: &str) -> Self {
        Self {
            mode: Mode::Fixture(html.to_string()),
            sections: vec![DEFAULT_SECTION.to_string()],
            lang: "zh-hans".to_string(),
        }
    }

    pub fn from_http(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_UA)
            .timeout(timeout)
            .build()
            .context("okx http client")?;
        Ok(Self {
            mode: Mode::Http { client },
            sections: vec![DEFAULT_SECTION.to_string()],
            lang: "zh-hans".to_string(),
        })
    }

    pub fn with_sections(mut self, sections: Vec<String>) -> Self {
        self.sections = sections;
        self
    }

    /// `en`, `zh-hans`, `zh-hant`, ...
    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.trim().to_ascii_lowercase();
        self
    }

    fn lang_prefix(&self) -> String {
        if self.lang == "en" {
            "https://www.okx.com".to_string()
        } else {
            format!("https://www.okx.com/{}", self.lang)
        }
    }

    pub fn section_url(&self, section: &str) -> String {
        format!("{}/help/section/{section}", self.lang_prefix())
    }

    pub fn article_url(&self, slug: &str) -> String {
        format!("{}/help/{slug}", self.lang_prefix())
    }

    fn accept_language(&self) -> String {
        if self.lang.starts_with("zh") {
            "zh-CN,zh;q=0.9,en;q=0.8".to_string()
        } else if self.lang.starts_with("en") {
            "en-US,en;q=0.9".to_string()
        } else {
            format!("{},en;q=0.8", self.lang)
        }
    }

    async fn fetch_section(&self, section: &str, limit: usize) -> Result<Vec<RawAnnouncement>> {
        let html = match &self.mode {
            Mode::Fixture(s) => s.clone(),
            Mode::Http { client } => client
                .get(self.section_url(section))
                .header("Accept-Language", self.accept_language())
                .header("Cache-Control", "no-cache")
                .send()
                .await
                .context("okx http get()")?
                .error_for_status()
                .context("okx non-2xx")?
                .text()
                .await
                .context("okx http .text()")?,
        };

        let items = extract_items(&html)?;
        if items.is_empty() {
            bail!("okx section {section} has no announcements");
        }
        Ok(items
            .into_iter()
            .take(limit)
            .filter_map(|it| self.to_raw(it))
            .collect())
    }

    fn to_raw(&self, it: Item) -> Option<RawAnnouncement> {
        let slug = it.slug.filter(|s| !s.is_empty())?;
        let time = DateTime::parse_from_rfc3339(it.publish_time.as_deref()?.trim()).ok()?;
        Some(RawAnnouncement {
            exchange: "OKX".to_string(),
            title: it.title.unwrap_or_default(),
            time,
            url: self.article_url(&slug),
        })
    }
}

fn extract_items(html: &str) -> Result<Vec<Item>> {
    let json = RE_APP_STATE
        .captures(html)
        .and_then(|c| c.get(1))
        .ok_or_else(|| anyhow!("appState script not found"))?
        .as_str();
    let state: serde_json::Value = serde_json::from_str(json).context("parsing okx appState json")?;
    let Some(items) = state
        .pointer("/appContext/initialProps/sectionData/articleList/items")
        .and_then(|v| v.as_array())
    else {
        return Ok(Vec::new());
    };
    // one bad item drops only itself
    Ok(items
        .iter()
        .filter_map(|v| match Item::deserialize(v) {
            Ok(it) => Some(it),
            Err(e) => {
                tracing::debug!(target: "ingest", source = "OKX", error = %e, "okx item skipped");
                None
            }
        })
        .collect())
}

#[async_trait]
impl AnnouncementSource for OkxSource {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawAnnouncement>> {
        let mut all = Vec::new();
        let mut failures = 0usize;
        for section in &self.sections {
            match self.fetch_section(section, limit).await {
                Ok(mut v) => all.append(&mut v),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(target: "ingest", source = "OKX", section = %section, error = %format!("{e:#}"), "section fetch failed");
                }
            }
        }
        if failures > 0 && failures == self.sections.len() {
            bail!("all {failures} okx sections failed");
        }
        all.sort_by(|a, b| b.time.cmp(&a.time));
        all.truncate(limit);
        Ok(all)
    }

    fn name(&self) -> &str {
        "OKX"
    }
}
