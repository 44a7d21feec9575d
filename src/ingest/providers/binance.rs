// src/ingest/providers/binance.rs
use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{Local, TimeZone};
use serde_json::Value;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use super::BROWSER_UA;
use crate::ingest::types::AnnouncementSource;
use crate::model::RawAnnouncement;

pub const LIST_URL: &str = "https://www.binance.com/bapi/composite/v1/public/cms/article/list/query";
pub const ARTICLE_URL: &str = "https://www.binance.com/zh-CN/support/announcement";

/// Latest news (49), delistings (161), wallet maintenance (157).
pub const DEFAULT_CATALOGS: [u32; 3] = [49, 161, 157];

/// The list API serves at most 20 articles per page.
const MAX_PAGE_SIZE: usize = 20;

#[derive(Debug, Deserialize)]
struct ListResponse {
    code: String,
    data: Option<ListData>,
}

#[derive(Debug, Deserialize)]
struct ListData {
    #[serde(default)]
    catalogs: Vec<Catalog>,
}

#[derive(Debug, Deserialize)]
struct Catalog {
    #[serde(rename = "catalogId")]
    catalog_id: u32,
    /// Kept raw; each article is decoded on its own.
    #[serde(default)]
    articles: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Article {
    code: Option<String>,
    title: Option<String>,
    #[serde(rename = "releaseDate")]
    release_date: Option<i64>, // unix millis
}

pub struct BinanceSource {
    mode: Mode,
    catalogs: Vec<u32>,
}

enum Mode {
    Fixture(String),
    Http { client: Client },
}

impl BinanceSource {
    /// Serve every catalog from one canned list response.
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
            catalogs: DEFAULT_CATALOGS.to_vec(),
        }
    }

    pub fn from_http(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_UA)
            .timeout(timeout)
            .build()
            .context("binance http client")?;
        Ok(Self {
            mode: Mode::Http { client },
            catalogs: DEFAULT_CATALOGS.to_vec(),
        })
    }

    pub fn with_catalogs(mut self, catalogs: Vec<u32>) -> Self {
        self.catalogs = catalogs;
        self
    }

    async fn fetch_catalog(&self, catalog: u32, limit: usize) -> Result<Vec<RawAnnouncement>> {
        match &self.mode {
            Mode::Fixture(body) => {
                let mut out = parse_catalog(body, catalog)?;
                out.truncate(limit);
                Ok(out)
            }
            Mode::Http { client } => {
                let mut out = Vec::new();
                let pages = limit.div_ceil(MAX_PAGE_SIZE);
                for page_no in 1..=pages {
                    let page_size = (limit - out.len()).min(MAX_PAGE_SIZE);
                    if page_size == 0 {
                        break;
                    }
                    match fetch_page(client, catalog, page_no, page_size).await {
                        Ok(mut items) => {
                            let short = items.len() < page_size;
                            out.append(&mut items);
                            if short {
                                break;
                            }
                        }
                        // later pages are best effort; keep what we have
                        Err(e) if page_no > 1 => {
                            tracing::debug!(target: "ingest", catalog, page_no, error = %format!("{e:#}"), "binance page failed");
                            break;
                        }
                        Err(e) => return Err(e),
                    }
                }
                out.truncate(limit);
                Ok(out)
            }
        }
    }
}

async fn fetch_page(
    client: &Client,
    catalog: u32,
    page_no: usize,
    page_size: usize,
) -> Result<Vec<RawAnnouncement>> {
    let body = client
        .get(LIST_URL)
        .query(&[
            ("type", "1".to_string()),
            ("pageNo", page_no.to_string()),
            ("pageSize", page_size.min(MAX_PAGE_SIZE).to_string()),
        ])
        .header("Accept", "application/json")
        .send()
        .await
        .context("binance http get()")?
        .error_for_status()
        .context("binance non-2xx")?
        .text()
        .await
        .context("binance http .text()")?;
    parse_catalog(&body, catalog)
}

/// Pull one catalog's articles out of a list response.
fn parse_catalog(body: &str, catalog: u32) -> Result<Vec<RawAnnouncement>> {
    let rsp: ListResponse = serde_json::from_str(body).context("parsing binance list json")?;
    if rsp.code != "000000" {
        bail!("binance api error code {}", rsp.code);
    }
    let catalogs = rsp.data.map(|d| d.catalogs).unwrap_or_default();
    if catalogs.is_empty() {
        bail!("binance response has no catalogs");
    }
    let cat = catalogs
        .into_iter()
        .find(|c| c.catalog_id == catalog)
        .ok_or_else(|| anyhow!("catalog {catalog} missing from binance response"))?;

    Ok(cat
        .articles
        .into_iter()
        .filter_map(|v| match serde_json::from_value::<Article>(v) {
            Ok(a) => to_raw(a),
            Err(e) => {
                tracing::debug!(target: "ingest", catalog, error = %e, "binance article skipped");
                None
            }
        })
        .collect())
}

/// Articles without a code, title or release date are dropped. The time is
/// part of the fingerprint, so it is never invented.
fn to_raw(a: Article) -> Option<RawAnnouncement> {
    let code = a.code.filter(|c| !c.is_empty())?;
    let title = a.title.filter(|t| !t.trim().is_empty())?;
    let time = Local
        .timestamp_millis_opt(a.release_date?)
        .single()?
        .fixed_offset();
    Some(RawAnnouncement {
        exchange: "Binance".to_string(),
        title,
        time,
        url: format!("{ARTICLE_URL}/{code}"),
    })
}

#[async_trait]
impl AnnouncementSource for BinanceSource {
    async fn fetch_latest(&self, limit: usize) -> Result<Vec<RawAnnouncement>> {
        let mut all = Vec::new();
        let mut failures = 0usize;
        for (i, &catalog) in self.catalogs.iter().enumerate() {
            if i > 0 && matches!(self.mode, Mode::Http { .. }) {
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
            match self.fetch_catalog(catalog, limit).await {
                Ok(mut v) => all.append(&mut v),
                Err(e) => {
                    failures += 1;
                    tracing::warn!(target: "ingest", source = "Binance", catalog, error = %format!("{e:#}"), "catalog fetch failed");
                }
            }
        }
        if failures > 0 && failures == self.catalogs.len() {
            bail!("all {failures} binance catalogs failed");
        }

        all.sort_by(|a, b| b.time.cmp(&a.time));
        all.truncate(limit);
        Ok(all)
    }

    fn name(&self) -> &str {
        "Binance"
    }
}
