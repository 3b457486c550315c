//! Keyword search against the aggregator's RSS endpoint.
//!
//! One request per keyword, no retries: a keyword whose feed fails is
//! reported and skipped by the caller. The search term is percent-encoded in
//! full (spaces, accents and punctuation), e.g.
//!
//! ```text
//! https://news.google.com/rss/search?q=s%C3%A3o%20sebasti%C3%A3o&hl=pt-BR&gl=BR&ceid=BR%3Apt-419
//! ```

use crate::config::FeedConfig;
use crate::error::FeedError;
use crate::http::FetchAsync;
use crate::models::FeedItem;
use crate::utils::{collapse_whitespace, strip_html};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Debug, Deserialize)]
struct RssDocument {
    channel: RssChannel,
}

#[derive(Debug, Deserialize)]
struct RssChannel {
    #[serde(rename = "item", default)]
    items: Vec<RssItem>,
}

#[derive(Debug, Deserialize)]
struct RssItem {
    title: Option<String>,
    link: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
    source: Option<RssSource>,
}

#[derive(Debug, Deserialize)]
struct RssSource {
    #[serde(rename = "$text")]
    name: Option<String>,
}

/// Build the search URL for `term` with the configured locale parameters.
pub fn build_search_url(config: &FeedConfig, term: &str) -> Result<Url, FeedError> {
    let term = term.trim();
    if term.is_empty() {
        return Err(FeedError::EmptyTerm);
    }
    let url = format!(
        "{}?q={}&hl={}&gl={}&ceid={}",
        config.search_url.trim_end_matches('?'),
        urlencoding::encode(term),
        urlencoding::encode(&config.language),
        urlencoding::encode(&config.country),
        urlencoding::encode(&config.edition),
    );
    Ok(Url::parse(&url)?)
}

/// Parse an RFC 2822 (RSS) or RFC 3339 (Atom-ish) timestamp into UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Parse an RSS 2.0 document into feed items, in document order.
///
/// Items without an absolute `http(s)` link are dropped.
pub fn parse_rss(xml: &str) -> Result<Vec<FeedItem>, FeedError> {
    let doc: RssDocument =
        quick_xml::de::from_str(xml).map_err(|e| FeedError::Parse(e.to_string()))?;

    let items = doc
        .channel
        .items
        .into_iter()
        .filter_map(|item| {
            let raw_link = item.link.as_deref().map(str::trim).unwrap_or_default();
            let wrapper_link = match Url::parse(raw_link) {
                Ok(url) if matches!(url.scheme(), "http" | "https") => url,
                _ => {
                    debug!(link = raw_link, "Skipping feed item without usable link");
                    return None;
                }
            };
            Some(FeedItem {
                title: collapse_whitespace(item.title.as_deref().unwrap_or_default()),
                wrapper_link,
                published_at: item.pub_date.as_deref().and_then(parse_timestamp),
                summary: strip_html(item.description.as_deref().unwrap_or_default()),
                source_name: item
                    .source
                    .and_then(|s| s.name)
                    .map(|n| collapse_whitespace(&n))
                    .filter(|n| !n.is_empty()),
            })
        })
        .collect();
    Ok(items)
}

/// Most-recent-first when every item is dated, upstream order otherwise.
pub fn order_items(items: &mut [FeedItem]) {
    if items.iter().all(|i| i.published_at.is_some()) {
        items.sort_by(|a, b| b.published_at.cmp(&a.published_at));
    }
}

/// Fetches and parses keyword search feeds.
#[derive(Debug, Clone)]
pub struct FeedFetcher {
    config: FeedConfig,
}

impl FeedFetcher {
    pub fn new(config: FeedConfig) -> Self {
        Self { config }
    }

    /// Fetch up to `limit` items for `term`.
    ///
    /// A `limit` of zero returns an empty list without touching the network.
    #[instrument(level = "info", skip(self, fetcher))]
    pub async fn fetch<F: FetchAsync>(
        &self,
        fetcher: &F,
        term: &str,
        limit: usize,
    ) -> Result<Vec<FeedItem>, FeedError> {
        let url = build_search_url(&self.config, term)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let page = fetcher.fetch(&url).await?;
        let mut items = parse_rss(&page.body)?;
        let upstream = items.len();
        order_items(&mut items);
        items.truncate(limit);

        info!(%url, upstream, kept = items.len(), "Fetched search feed");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::mock::MockFetcher;

    const FEED: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:media="http://search.yahoo.com/mrss/">
  <channel>
    <generator>NFE/5.0</generator>
    <title>"ilhabela" - Google Notícias</title>
    <link>https://news.google.com/search?q=ilhabela</link>
    <language>pt-BR</language>
    <item>
      <title>Balsa de Ilhabela opera com fila de 2 horas - G1</title>
      <link>https://news.google.com/rss/articles/CBMiAAA?oc=5</link>
      <guid isPermaLink="false">CBMiAAA</guid>
      <pubDate>Sat, 17 Oct 2026 10:00:00 GMT</pubDate>
      <description>&lt;a href="https://news.google.com/rss/articles/CBMiAAA?oc=5"&gt;Balsa de Ilhabela&lt;/a&gt;&amp;nbsp;&amp;nbsp;&lt;font color="#6f6f6f"&gt;G1&lt;/font&gt;</description>
      <source url="https://g1.globo.com">G1</source>
    </item>
    <item>
      <title><![CDATA[Regata & festa: Ilhabela recebe velejadores]]></title>
      <link>https://news.google.com/rss/articles/CBMiBBB?oc=5</link>
      <pubDate>Sat, 17 Oct 2026 12:30:00 GMT</pubDate>
      <description>Regata</description>
    </item>
    <item>
      <title>Sem link</title>
      <pubDate>Sat, 17 Oct 2026 13:00:00 GMT</pubDate>
    </item>
  </channel>
</rss>"##;

    fn config() -> FeedConfig {
        FeedConfig::default()
    }

    #[test]
    fn test_search_url_encodes_reserved_characters() {
        let url = build_search_url(&config(), "  são sebastião & f1 #surf/vôlei+praia ").unwrap();
        let query = url.query().unwrap();
        assert!(
            query.starts_with(
                "q=s%C3%A3o%20sebasti%C3%A3o%20%26%20f1%20%23surf%2Fv%C3%B4lei%2Bpraia&"
            ),
            "unexpected query: {query}"
        );
        assert!(query.ends_with("&hl=pt-BR&gl=BR&ceid=BR%3Apt-419"));

        // The encoded term must survive a decode round trip untouched.
        let q = url
            .query_pairs()
            .find(|(k, _)| k == "q")
            .map(|(_, v)| v.into_owned())
            .unwrap();
        assert_eq!(q, "são sebastião & f1 #surf/vôlei+praia");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_search_url_rejects_blank_term() {
        assert!(matches!(
            build_search_url(&config(), " \t "),
            Err(FeedError::EmptyTerm)
        ));
    }

    #[test]
    fn test_parse_rss_items() {
        let items = parse_rss(FEED).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title, "Balsa de Ilhabela opera com fila de 2 horas - G1");
        assert_eq!(
            first.wrapper_link.as_str(),
            "https://news.google.com/rss/articles/CBMiAAA?oc=5"
        );
        assert_eq!(
            first.published_at.unwrap().to_rfc3339(),
            "2026-10-17T10:00:00+00:00"
        );
        assert_eq!(first.summary, "Balsa de Ilhabela G1");
        assert_eq!(first.source_name.as_deref(), Some("G1"));

        assert_eq!(items[1].title, "Regata & festa: Ilhabela recebe velejadores");
        assert_eq!(items[1].source_name, None);
    }

    #[test]
    fn test_parse_rss_malformed() {
        assert!(matches!(
            parse_rss("<rss><channel><item>"),
            Err(FeedError::Parse(_))
        ));
        assert!(matches!(
            parse_rss("<rss><title>no channel</title></rss>"),
            Err(FeedError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("Sat, 17 Oct 2026 10:00:00 GMT").is_some());
        assert!(parse_timestamp("2026-10-17T10:00:00-03:00").is_some());
        assert!(parse_timestamp("ontem").is_none());
    }

    #[test]
    fn test_order_most_recent_first_when_all_dated() {
        let mut items = parse_rss(FEED).unwrap();
        order_items(&mut items);
        assert!(items[0].title.starts_with("Regata"));
    }

    #[test]
    fn test_order_kept_when_some_undated() {
        let mut items = parse_rss(FEED).unwrap();
        items[1].published_at = None;
        order_items(&mut items);
        assert!(items[0].title.starts_with("Balsa"));
    }

    #[tokio::test]
    async fn test_limit_zero_makes_no_request() {
        let mock = MockFetcher::new();
        let items = FeedFetcher::new(config())
            .fetch(&mock, "ubatuba", 0)
            .await
            .unwrap();
        assert!(items.is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_orders_then_truncates() {
        let url = build_search_url(&config(), "ilhabela").unwrap();
        let mock = MockFetcher::new().page(url.as_str(), FEED);

        let items = FeedFetcher::new(config())
            .fetch(&mock, "ilhabela", 1)
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert!(items[0].title.starts_with("Regata"));
        assert_eq!(mock.calls(), vec![url.to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_error_is_reported() {
        let mock = MockFetcher::new();
        let err = FeedFetcher::new(config())
            .fetch(&mock, "ilhabela", 5)
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Fetch(_)));
    }
}
