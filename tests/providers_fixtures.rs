// tests/providers_fixtures.rs
use announce_monitor::ingest::providers::binance::ARTICLE_URL;
use announce_monitor::ingest::providers::{BinanceSource, OkxSource};
use announce_monitor::AnnouncementSource;

const BINANCE: &str = include_str!("fixtures/binance_list.json");
const OKX: &str = include_str!("fixtures/okx_section.html");

#[tokio::test]
async fn binance_merges_catalogs_newest_first() {
    let src = BinanceSource::from_fixture_str(BINANCE);
    assert_eq!(src.name(), "Binance");
    let items = src.fetch_latest(10).await.unwrap();

    // articles without a code, or with a missing or malformed date, are dropped
    assert_eq!(items.len(), 4);
    assert!(items.windows(2).all(|w| w[0].time >= w[1].time));
    assert_eq!(items[0].title, "币安将下架 DEF/USDT 交易对");
    assert_eq!(items[0].url, format!("{ARTICLE_URL}/d31e77"));
    assert_eq!(items[0].time.timestamp_millis(), 1717329600000);
    assert!(items.iter().all(|r| r.exchange == "Binance"));
}

#[tokio::test]
async fn binance_respects_limit_and_catalog_choice() {
    let src = BinanceSource::from_fixture_str(BINANCE);
    assert_eq!(src.fetch_latest(2).await.unwrap().len(), 2);

    let only_delist = BinanceSource::from_fixture_str(BINANCE).with_catalogs(vec![161]);
    let items = only_delist.fetch_latest(10).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn binance_fingerprints_are_stable_across_fetches() {
    let src = BinanceSource::from_fixture_str(BINANCE);
    let first: Vec<_> = src.fetch_latest(10).await.unwrap().iter().map(|r| r.fingerprint()).collect();
    let second: Vec<_> = src.fetch_latest(10).await.unwrap().iter().map(|r| r.fingerprint()).collect();
    assert_eq!(first, second);
}

#[tokio::test]
async fn binance_error_body_fails_the_source() {
    let src = BinanceSource::from_fixture_str(r#"{"code":"000002","message":"busy","data":null}"#);
    assert!(src.fetch_latest(10).await.is_err());
}

#[tokio::test]
async fn okx_reads_embedded_app_state() {
    let src = OkxSource::from_fixture_str(OKX);
    assert_eq!(src.name(), "OKX");
    let items = src.fetch_latest(10).await.unwrap();

    // the item with an empty slug and the one with a numeric time are dropped
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].title, "OKX 关于下架 JKL 现货交易对的公告");
    assert_eq!(
        items[0].url,
        "https://www.okx.com/zh-hans/help/okx-to-delist-jkl"
    );
    // offsets are kept as published
    assert_eq!(items[1].time.offset().local_minus_utc(), 8 * 3600);
    assert!(items.windows(2).all(|w| w[0].time >= w[1].time));
}

#[tokio::test]
async fn okx_english_urls_have_no_language_prefix() {
    let src = OkxSource::from_fixture_str(OKX).with_lang("en");
    let items = src.fetch_latest(1).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].url, "https://www.okx.com/help/okx-to-delist-jkl");
}
