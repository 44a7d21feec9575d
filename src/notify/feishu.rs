// src/notify/feishu.rs
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::Sink;
use crate::model::Announcement;

pub const ENV_WEBHOOK_URL: &str = "FEISHU_WEBHOOK_URL";

/// Feishu (Lark) custom bot webhook.
#[derive(Clone)]
pub struct FeishuSink {
    webhook: String,
    client: Client,
    timeout: Duration,
    max_retries: u8,
}

impl FeishuSink {
    pub fn new(webhook: String) -> Self {
        Self {
            webhook,
            client: Client::new(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
        }
    }

    /// Fails when `FEISHU_WEBHOOK_URL` is unset or blank; callers treat that as fatal.
    pub fn from_env() -> Result<Self> {
        let url = std::env::var(ENV_WEBHOOK_URL)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("{ENV_WEBHOOK_URL} is not set"))?;
        Ok(Self::new(url.trim().to_string()))
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    pub fn with_retries(mut self, retries: u8) -> Self {
        self.max_retries = retries.max(1);
        self
    }

    async fn post_once(&self, payload: &FeishuText) -> Result<()> {
        let rsp = self
            .client
            .post(&self.webhook)
            .timeout(self.timeout)
            .json(payload)
            .send()
            .await
            .context("feishu post")?
            .error_for_status()
            .context("feishu non-2xx")?;

        let body: FeishuReply = rsp.json().await.context("feishu reply body")?;
        if body.code != 0 {
            // rejected by the bot API; retrying the same payload will not help
            return Err(anyhow!(
                "feishu api error {}: {}",
                body.code,
                body.msg.unwrap_or_default()
            ))
            .context(Rejected);
        }
        Ok(())
    }
}

#[derive(Debug)]
struct Rejected;

impl std::fmt::Display for Rejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("rejected by feishu")
    }
}

#[async_trait::async_trait]
impl Sink for FeishuSink {
    async fn send(&self, ann: &Announcement) -> Result<()> {
        let payload = FeishuText::new(render_text(ann));

        let mut attempt: u8 = 0;
        loop {
            attempt += 1;
            match self.post_once(&payload).await {
                Ok(()) => return Ok(()),
                Err(e) if e.downcast_ref::<Rejected>().is_some() => return Err(e),
                Err(e) => {
                    if attempt < self.max_retries {
                        tracing::debug!(target: "notify", attempt, error = %e, "feishu retry");
                        tokio::time::sleep(Duration::from_millis(500u64 << (attempt - 1))).await;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    fn name(&self) -> &'static str {
        "feishu"
    }
}

/// Plain-text message body shown in the Feishu chat.
pub fn render_text(ann: &Announcement) -> String {
    let tag = ann
        .tag
        .as_deref()
        .map(|t| format!("[{t}] "))
        .unwrap_or_default();
    format!(
        "🔔 {} 交易所公告\n\n{}{}\n\n发布时间: {}\n详情链接: {}",
        ann.exchange,
        tag,
        ann.title,
        ann.local_time().format("%Y-%m-%d %H:%M:%S"),
        ann.url
    )
}

#[derive(Debug, Serialize)]
struct FeishuText {
    msg_type: &'static str,
    content: FeishuContent,
}

#[derive(Debug, Serialize)]
struct FeishuContent {
    text: String,
}

impl FeishuText {
    fn new(text: String) -> Self {
        Self {
            msg_type: "text",
            content: FeishuContent { text },
        }
    }
}

#[derive(Debug, Deserialize)]
struct FeishuReply {
    #[serde(default)]
    code: i64,
    msg: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    #[test]
    fn text_includes_tag_prefix_and_link() {
        let ann = Announcement {
            exchange: "Binance".into(),
            title: "币安将上线 TEST/USDT 交易对".into(),
            time: DateTime::parse_from_rfc3339("2024-11-23T10:00:00+00:00").unwrap(),
            url: "https://www.binance.com/test".into(),
            tag: Some("new".into()),
        };
        let text = render_text(&ann);
        assert!(text.starts_with("🔔 Binance 交易所公告\n\n[new] 币安将上线"));
        assert!(text.ends_with("详情链接: https://www.binance.com/test"));
    }

    #[test]
    fn untagged_has_no_bracket_prefix() {
        let ann = Announcement {
            exchange: "OKX".into(),
            title: "System upgrade".into(),
            time: DateTime::parse_from_rfc3339("2024-11-23T10:00:00+00:00").unwrap(),
            url: "u".into(),
            tag: None,
        };
        assert!(render_text(&ann).contains("\n\nSystem upgrade\n\n"));
    }

    #[test]
    fn payload_shape_matches_bot_api() {
        let v = serde_json::to_value(FeishuText::new("hi".into())).unwrap();
        assert_eq!(v, serde_json::json!({"msg_type": "text", "content": {"text": "hi"}}));
    }

    #[serial_test::serial]
    #[test]
    fn from_env_requires_webhook() {
        std::env::remove_var(ENV_WEBHOOK_URL);
        assert!(FeishuSink::from_env().is_err());
        std::env::set_var(ENV_WEBHOOK_URL, "https://open.feishu.cn/open-apis/bot/v2/hook/x");
        assert!(FeishuSink::from_env().is_ok());
        std::env::remove_var(ENV_WEBHOOK_URL);
    }
}
