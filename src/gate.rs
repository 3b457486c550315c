//! Admission checks: recency and minimum substance.
//!
//! Both predicates must pass for an item to be accepted. Recency is checked
//! before any network work on the item; substance after extraction (the
//! extractor applies the same thresholds to pick its tier).

use crate::config::{GateConfig, MissingTimestampPolicy};
use crate::error::ConfigError;
use crate::models::{ExtractedArticle, RejectReason};
use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone)]
pub struct QualityGate {
    window: Duration,
    min_chars: usize,
    min_paragraphs: usize,
    missing_timestamp: MissingTimestampPolicy,
}

impl QualityGate {
    pub fn new(config: &GateConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            window: config.recency_window()?,
            min_chars: config.min_chars,
            min_paragraphs: config.min_paragraphs,
            missing_timestamp: config.missing_timestamp,
        })
    }

    /// `now - published_at <= window`, inclusive. Future timestamps pass.
    pub fn is_recent(&self, published_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match published_at {
            Some(ts) => now.signed_duration_since(ts) <= self.window,
            None => self.missing_timestamp == MissingTimestampPolicy::TreatAsRecent,
        }
    }

    pub fn check_recency(
        &self,
        published_at: Option<DateTime<Utc>>,
        now: DateTime<Utc>,
    ) -> Result<(), RejectReason> {
        if self.is_recent(published_at, now) {
            Ok(())
        } else {
            Err(RejectReason::Stale)
        }
    }

    pub fn meets_substance(&self, char_count: usize, paragraph_count: usize) -> bool {
        char_count >= self.min_chars && paragraph_count >= self.min_paragraphs
    }

    pub fn check_substance(&self, article: &ExtractedArticle) -> Result<(), RejectReason> {
        if self.meets_substance(article.char_count, article.paragraph_count) {
            Ok(())
        } else {
            Err(RejectReason::ContentInsufficient {
                char_count: article.char_count,
                paragraph_count: article.paragraph_count,
            })
        }
    }

    pub fn min_chars(&self) -> usize {
        self.min_chars
    }

    pub fn min_paragraphs(&self) -> usize {
        self.min_paragraphs
    }
}
