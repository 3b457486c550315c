//! Pipeline configuration.
//!
//! Every value has a default so a YAML file only needs to name what it
//! changes. The binary layers its command-line flags on top and the merged
//! result is checked with [`PipelineConfig::validate`] before any
//! network call is made.
//!
//! ```yaml
//! keywords: ["ilhabela", "ubatuba"]
//! gate:
//!   min_chars: 300
//!   recency_window_minutes: 180
//! resolver:
//!   pre_resolve_delay_ms: 2000
//! ```

use crate::error::ConfigError;
use crate::extractor::boilerplate::BoilerplateFilter;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration as StdDuration;
use tracing::{info, instrument};
use url::Url;

/// Upper bound for any single politeness or resolution wait.
const MAX_WAIT_MS: u64 = 30_000;
/// Upper bound for attempts against one URL.
const MAX_ATTEMPTS: u32 = 5;
/// Upper bound for the recency window: 30 days.
const MAX_RECENCY_WINDOW_MINUTES: u64 = 30 * 24 * 60;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Search terms, one feed request each.
    pub keywords: Vec<String>,
    pub feed: FeedConfig,
    pub resolver: ResolverConfig,
    pub extractor: ExtractorConfig,
    pub gate: GateConfig,
    pub http: HttpConfig,
    pub politeness: PolitenessConfig,
    pub store: StoreConfig,
    pub run: RunConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct FeedConfig {
    /// Search endpoint of the aggregator.
    pub search_url: String,
    /// Interface language (`hl`).
    pub language: String,
    /// Country (`gl`).
    pub country: String,
    /// Edition id (`ceid`).
    pub edition: String,
    /// Maximum feed items considered per keyword.
    pub items_per_keyword: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            search_url: "https://news.google.com/rss/search".to_string(),
            language: "pt-BR".to_string(),
            country: "BR".to_string(),
            edition: "BR:pt-419".to_string(),
            items_per_keyword: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Wait before the first network attempt on a wrapper link.
    pub pre_resolve_delay_ms: u64,
    /// Total attempts for the wrapper fetch.
    pub max_attempts: u32,
    /// Base backoff between wrapper fetch attempts.
    pub backoff_ms: u64,
    /// Hosts (and their subdomains) that never count as a publisher.
    pub aggregator_domains: Vec<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            pre_resolve_delay_ms: 0,
            max_attempts: 2,
            backoff_ms: 500,
            aggregator_domains: [
                "news.google.com",
                "google.com",
                "gstatic.com",
                "googleusercontent.com",
                "googleapis.com",
            ]
            .iter()
            .map(|d| d.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Case-insensitive regular expressions; a text block matching any of
    /// them is dropped before scoring.
    pub boilerplate_patterns: Vec<String>,
    /// Retry extraction on the `rel=amphtml` variant when the page is thin.
    pub follow_amp: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            boilerplate_patterns: default_boilerplate_patterns(),
            follow_amp: true,
        }
    }
}

fn default_boilerplate_patterns() -> Vec<String> {
    [
        r"^\s*(leia|veja|confira)\s+(também|mais|ainda)\b",
        r"^\s*(read|see)\s+(also|more)\b",
        r"^\s*(related|relacionad[ao]s?)\s*:",
        r"^\s*(publicidade|advertisement|anúncio|patrocinado|sponsored)\s*$",
        r"^\s*(compartilhe|compartilhar|share)\b.{0,80}$",
        r"^\s*(siga[- ]nos|follow\s+us)\b",
        r"^\s*(assine|inscreva-se|subscribe)\b.{0,60}\bnewsletter\b",
        r"^\s*(clique|click)\s+(aqui|here)\b",
        r"^.{0,40}\bcookies?\b.{0,80}\b(aceit|accept|polític|policy)",
        r"^\s*(foto|photo|imagem|image)\s*:",
    ]
    .iter()
    .map(|p| p.to_string())
    .collect()
}

/// What to do with feed items that carry no usable timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingTimestampPolicy {
    #[default]
    TreatAsRecent,
    TreatAsStale,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GateConfig {
    /// Rolling recency window measured back from now (UTC).
    pub recency_window_minutes: u64,
    pub min_chars: usize,
    pub min_paragraphs: usize,
    pub missing_timestamp: MissingTimestampPolicy,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            recency_window_minutes: 180,
            min_chars: 220,
            min_paragraphs: 2,
            missing_timestamp: MissingTimestampPolicy::TreatAsRecent,
        }
    }
}

impl GateConfig {
    pub fn recency_window(&self) -> Result<Duration, ConfigError> {
        let minutes = self.recency_window_minutes;
        if minutes == 0 || minutes > MAX_RECENCY_WINDOW_MINUTES {
            return Err(invalid(
                "gate.recency_window_minutes",
                format!("must be between 1 and {MAX_RECENCY_WINDOW_MINUTES}"),
            ));
        }
        i64::try_from(minutes)
            .ok()
            .and_then(Duration::try_minutes)
            .ok_or_else(|| invalid("gate.recency_window_minutes", "out of range"))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout, connect through body.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Attempts per article or AMP URL.
    pub max_attempts: u32,
    pub backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Random jitter added to each backoff, `0..=jitter_ms`.
    pub jitter_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 20,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36".to_string(),
            max_attempts: 2,
            backoff_ms: 1_000,
            max_backoff_ms: 8_000,
            jitter_ms: 250,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PolitenessConfig {
    /// Pause before each feed item is processed.
    pub item_delay_ms: u64,
    /// Pause after each feed request.
    pub feed_delay_ms: u64,
}

impl Default for PolitenessConfig {
    fn default() -> Self {
        Self {
            item_delay_ms: 5_000,
            feed_delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum remembered signatures before FIFO eviction.
    pub max_signatures: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_signatures: 5_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop processing once this many items were accepted in one run.
    pub max_accepted_per_run: Option<usize>,
    /// Keywords processed concurrently.
    pub keyword_lanes: usize,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_accepted_per_run: None,
            keyword_lanes: 1,
        }
    }
}

impl PipelineConfig {
    /// Load a YAML config file. Missing sections fall back to defaults.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = tokio::fs::read_to_string(path.as_ref()).await?;
        let config = Self::from_yaml_str(&raw)?;
        info!(keywords = config.keywords.len(), "Loaded pipeline configuration");
        Ok(config)
    }

    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(raw)?)
    }

    /// Trim keywords, drop blanks and duplicates, keeping first occurrence.
    pub fn normalize_keywords(&mut self) {
        use itertools::Itertools;
        self.keywords = self
            .keywords
            .iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .unique_by(|k| k.to_lowercase())
            .collect();
    }

    /// Check everything that would make a run meaningless or unbounded.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.keywords.iter().all(|k| k.trim().is_empty()) {
            return Err(ConfigError::EmptyKeywords);
        }
        self.validate_settings()
    }

    /// Same as [`validate`](Self::validate) minus the keyword list, for
    /// callers that pass keywords explicitly.
    pub fn validate_settings(&self) -> Result<(), ConfigError> {
        if self.gate.min_chars == 0 {
            return Err(invalid("gate.min_chars", "must be at least 1"));
        }
        if self.gate.min_paragraphs == 0 {
            return Err(invalid("gate.min_paragraphs", "must be at least 1"));
        }
        self.gate.recency_window()?;
        if self.store.max_signatures == 0 {
            return Err(invalid("store.max_signatures", "must be at least 1"));
        }
        if self.http.timeout_secs == 0 {
            return Err(invalid("http.timeout_secs", "must be at least 1"));
        }
        if self.run.keyword_lanes == 0 {
            return Err(invalid("run.keyword_lanes", "must be at least 1"));
        }
        check_attempts("resolver.max_attempts", self.resolver.max_attempts)?;
        check_attempts("http.max_attempts", self.http.max_attempts)?;
        check_wait("resolver.pre_resolve_delay_ms", self.resolver.pre_resolve_delay_ms)?;
        check_wait("resolver.backoff_ms", self.resolver.backoff_ms)?;
        check_wait("http.backoff_ms", self.http.backoff_ms)?;
        check_wait("http.max_backoff_ms", self.http.max_backoff_ms)?;
        check_wait("politeness.item_delay_ms", self.politeness.item_delay_ms)?;
        check_wait("politeness.feed_delay_ms", self.politeness.feed_delay_ms)?;
        Url::parse(&self.feed.search_url)
            .map_err(|e| invalid("feed.search_url", e.to_string()))?;
        BoilerplateFilter::from_config(&self.extractor)?;
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn check_attempts(field: &'static str, attempts: u32) -> Result<(), ConfigError> {
    if attempts == 0 || attempts > MAX_ATTEMPTS {
        return Err(invalid(field, format!("must be between 1 and {MAX_ATTEMPTS}")));
    }
    Ok(())
}

fn check_wait(field: &'static str, ms: u64) -> Result<(), ConfigError> {
    if ms > MAX_WAIT_MS {
        return Err(invalid(field, format!("must not exceed {MAX_WAIT_MS} ms")));
    }
    Ok(())
}
