//! Data models for feed items, resolved links, extracted articles and run results.
//!
//! This module defines the records that flow through the pipeline:
//! - [`FeedItem`]: one search result from the keyword feed
//! - [`ResolvedLink`]: the publisher URL behind a wrapper link
//! - [`ExtractedArticle`]: clean title/body/image pulled from the publisher page
//! - [`PipelineResult`]: the terminal outcome for one feed item
//! - [`RunReport`]: everything a single run produced, grouped by keyword

use crate::error::FetchError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// A news item as listed by the aggregator's search feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedItem {
    /// Headline as given by the feed.
    pub title: String,
    /// Aggregator link that points (directly or not) at the publisher.
    pub wrapper_link: Url,
    /// Publication time, when the feed carries a parseable one.
    pub published_at: Option<DateTime<Utc>>,
    /// Feed description with markup removed.
    pub summary: String,
    /// Publisher name from the feed's `<source>` element.
    pub source_name: Option<String>,
}

/// Which strategy produced a [`ResolvedLink`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionMethod {
    /// Absolute URL embedded in the wrapper's query string.
    QueryParam,
    /// HTTP redirects landed on a non-aggregator host.
    Redirect,
    MetaRefresh,
    Canonical,
    OpenGraphUrl,
    AmpLink,
    FirstExternalAnchor,
    /// Nothing worked; the wrapper link itself is returned.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub canonical_url: Url,
    pub method: ResolutionMethod,
    /// Set when the wrapper itself could not be downloaded.
    #[serde(skip)]
    pub fetch_error: Option<FetchError>,
}

impl ResolvedLink {
    pub fn new(canonical_url: Url, method: ResolutionMethod) -> Self {
        Self {
            canonical_url,
            method,
            fetch_error: None,
        }
    }

    /// The wrapper returned as-is after its download failed.
    pub fn unreachable(wrapper: Url, error: FetchError) -> Self {
        Self {
            canonical_url: wrapper,
            method: ResolutionMethod::Unresolved,
            fetch_error: Some(error),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.method != ResolutionMethod::Unresolved
    }
}

/// Clean article content pulled from a publisher page.
///
/// `char_count` is always the number of characters in `plain_text`, and
/// `paragraph_count` the number of text blocks (`<p>`, `<h2>`–`<h4>`,
/// `<li>`) in `body_html`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedArticle {
    pub title: String,
    pub body_html: String,
    pub plain_text: String,
    pub lead_image: Option<Url>,
    pub paragraph_count: usize,
    pub char_count: usize,
    pub source_url: Url,
}

/// Why a feed item was not accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RejectReason {
    /// Published outside the recency window.
    Stale,
    /// No extraction tier reached the substance thresholds.
    ContentInsufficient {
        char_count: usize,
        paragraph_count: usize,
    },
    /// Same title and canonical URL were seen before.
    Duplicate,
    /// The article could not be downloaded.
    FetchFailed { message: String },
}

/// Terminal outcome for one feed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineResult {
    Accepted {
        article: ExtractedArticle,
        published_at: Option<DateTime<Utc>>,
    },
    Rejected {
        title: String,
        link: Url,
        reason: RejectReason,
    },
}

impl PipelineResult {
    pub fn rejected(item: &FeedItem, reason: RejectReason) -> Self {
        PipelineResult::Rejected {
            title: item.title.clone(),
            link: item.wrapper_link.clone(),
            reason,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, PipelineResult::Accepted { .. })
    }

    pub fn article(&self) -> Option<&ExtractedArticle> {
        match self {
            PipelineResult::Accepted { article, .. } => Some(article),
            PipelineResult::Rejected { .. } => None,
        }
    }
}

/// Results for a single keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordResults {
    pub keyword: String,
    pub results: Vec<PipelineResult>,
}

/// A keyword whose feed could not be fetched or parsed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedFailure {
    pub keyword: String,
    pub error: String,
}

/// Everything one pipeline run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub keywords: Vec<KeywordResults>,
    pub feed_failures: Vec<FeedFailure>,
}

impl RunReport {
    /// Accepted articles with their keyword, in run order.
    pub fn accepted(&self) -> impl Iterator<Item = (&str, &ExtractedArticle)> {
        self.keywords.iter().flat_map(|k| {
            k.results
                .iter()
                .filter_map(move |r| r.article().map(|a| (k.keyword.as_str(), a)))
        })
    }

    /// The last accepted article for `keyword`, if any.
    pub fn latest_accepted(&self, keyword: &str) -> Option<&ExtractedArticle> {
        self.keywords
            .iter()
            .find(|k| k.keyword == keyword)
            .and_then(|k| k.results.iter().rev().find_map(|r| r.article()))
    }

    pub fn accepted_count(&self) -> usize {
        self.accepted().count()
    }

    pub fn processed_count(&self) -> usize {
        self.keywords.iter().map(|k| k.results.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(url: &str) -> ExtractedArticle {
        ExtractedArticle {
            title: "Maré alta em Ilhabela".to_string(),
            body_html: "<p>Texto</p>".to_string(),
            plain_text: "Texto".to_string(),
            lead_image: None,
            paragraph_count: 1,
            char_count: 5,
            source_url: Url::parse(url).unwrap(),
        }
    }

    fn item() -> FeedItem {
        FeedItem {
            title: "Regata em Ilhabela".to_string(),
            wrapper_link: Url::parse("https://news.google.com/rss/articles/abc").unwrap(),
            published_at: None,
            summary: String::new(),
            source_name: None,
        }
    }

    #[test]
    fn test_rejected_keeps_item_context() {
        let result = PipelineResult::rejected(&item(), RejectReason::Stale);
        match result {
            PipelineResult::Rejected { title, link, reason } => {
                assert_eq!(title, "Regata em Ilhabela");
                assert_eq!(link.host_str(), Some("news.google.com"));
                assert_eq!(reason, RejectReason::Stale);
            }
            PipelineResult::Accepted { .. } => panic!("expected rejection"),
        }
    }

    #[test]
    fn test_result_serialization_is_tagged() {
        let result = PipelineResult::rejected(
            &item(),
            RejectReason::ContentInsufficient {
                char_count: 40,
                paragraph_count: 1,
            },
        );
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"]["kind"], "content_insufficient");
        assert_eq!(json["reason"]["char_count"], 40);
    }

    #[test]
    fn test_report_latest_accepted() {
        let now = Utc::now();
        let report = RunReport {
            started_at: now,
            finished_at: now,
            keywords: vec![
                KeywordResults {
                    keyword: "surf".to_string(),
                    results: vec![
                        PipelineResult::Accepted {
                            article: article("https://example.com/1"),
                            published_at: None,
                        },
                        PipelineResult::rejected(&item(), RejectReason::Duplicate),
                        PipelineResult::Accepted {
                            article: article("https://example.com/2"),
                            published_at: Some(now),
                        },
                    ],
                },
                KeywordResults {
                    keyword: "vôlei".to_string(),
                    results: vec![PipelineResult::rejected(&item(), RejectReason::Stale)],
                },
            ],
            feed_failures: vec![],
        };

        assert_eq!(report.accepted_count(), 2);
        assert_eq!(report.processed_count(), 4);
        assert_eq!(
            report.latest_accepted("surf").unwrap().source_url.as_str(),
            "https://example.com/2"
        );
        assert!(report.latest_accepted("vôlei").is_none());
        assert!(report.latest_accepted("f1").is_none());
    }

    #[test]
    fn test_is_resolved() {
        let url = Url::parse("https://example.com/a").unwrap();
        assert!(ResolvedLink::new(url.clone(), ResolutionMethod::QueryParam).is_resolved());
        assert!(!ResolvedLink::new(url.clone(), ResolutionMethod::Unresolved).is_resolved());

        let down = ResolvedLink::unreachable(
            url.clone(),
            FetchError::Timeout {
                url: url.to_string(),
            },
        );
        assert!(!down.is_resolved());
        assert_eq!(
            serde_json::to_value(&down).unwrap(),
            serde_json::json!({ "canonical_url": "https://example.com/a", "method": "unresolved" })
        );
    }
}
