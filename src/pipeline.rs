//! One ingestion pass: keyword → feed items → resolved, extracted, gated
//! articles.
//!
//! Per item the order is fixed: politeness pause, recency check, link
//! resolution, signature lookup, extraction, substance check, signature
//! insert. A failure on one item becomes a [`RejectReason`] and never stops
//! its siblings; a failing feed is recorded in the [`RunReport`] and the
//! next keyword carries on.

use crate::config::PipelineConfig;
use crate::error::{ConfigError, ExtractError, FeedError};
use crate::extractor::ContentExtractor;
use crate::feed::FeedFetcher;
use crate::gate::QualityGate;
use crate::http::{FetchAsync, RetryFetch, RetryPolicy};
use crate::models::{FeedFailure, FeedItem, KeywordResults, PipelineResult, RejectReason, RunReport};
use crate::resolver::LinkResolver;
use crate::signatures::{Signature, SignatureStore};
use crate::utils::{pause, truncate_for_log};
use chrono::Utc;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub struct Pipeline<F> {
    fetcher: F,
    config: PipelineConfig,
    store: Arc<SignatureStore>,
    feed: FeedFetcher,
    resolver: LinkResolver,
    extractor: ContentExtractor,
    gate: QualityGate,
    retry: RetryPolicy,
    accepted: AtomicUsize,
}

impl<F: FetchAsync> Pipeline<F> {
    /// Build a pipeline over `fetcher`. Settings are validated here; the
    /// keyword list is not (keywords are passed to
    /// [`process_all`](Self::process_all)).
    pub fn new(
        fetcher: F,
        config: PipelineConfig,
        store: Arc<SignatureStore>,
    ) -> Result<Self, ConfigError> {
        config.validate_settings()?;
        let gate = QualityGate::new(&config.gate)?;
        Ok(Self {
            feed: FeedFetcher::new(config.feed.clone()),
            resolver: LinkResolver::new(config.resolver.clone()),
            extractor: ContentExtractor::new(&config.extractor, gate.clone())?,
            retry: RetryPolicy::from_http(&config.http),
            gate,
            fetcher,
            config,
            store,
            accepted: AtomicUsize::new(0),
        })
    }

    pub fn store(&self) -> &Arc<SignatureStore> {
        &self.store
    }

    /// Run every keyword, `run.keyword_lanes` at a time, and collect the
    /// outcome. Keyword order is kept in the report.
    #[instrument(level = "info", skip_all, fields(keywords = terms.len()))]
    pub async fn process_all<S: AsRef<str>>(&self, terms: &[S]) -> Result<RunReport, ConfigError> {
        let terms: Vec<String> = terms
            .iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();
        if terms.is_empty() {
            return Err(ConfigError::EmptyKeywords);
        }

        self.accepted.store(0, Ordering::SeqCst);
        let started_at = Utc::now();
        let lanes = self.config.run.keyword_lanes.max(1);
        info!(keywords = terms.len(), lanes, "Starting ingestion run");

        let outcomes: Vec<(String, Result<Vec<PipelineResult>, FeedError>)> = stream::iter(terms)
            .map(|term| async move {
                let outcome = self.process_keyword(&term).await;
                (term, outcome)
            })
            .buffered(lanes)
            .collect()
            .await;

        let mut report = RunReport {
            started_at,
            finished_at: started_at,
            keywords: Vec::with_capacity(outcomes.len()),
            feed_failures: Vec::new(),
        };
        for (keyword, outcome) in outcomes {
            match outcome {
                Ok(results) => report.keywords.push(KeywordResults { keyword, results }),
                Err(e) => {
                    warn!(keyword = %keyword, error = %e, "Feed failed; skipping keyword");
                    report.feed_failures.push(FeedFailure {
                        keyword,
                        error: e.to_string(),
                    });
                }
            }
        }
        report.finished_at = Utc::now();

        let accepted = report.accepted_count();
        if accepted == 0 {
            info!("no eligible item this cycle");
        }
        info!(
            accepted,
            processed = report.processed_count(),
            feed_failures = report.feed_failures.len(),
            signatures = self.store.len(),
            elapsed_ms = (report.finished_at - report.started_at).num_milliseconds(),
            "Ingestion run finished"
        );
        Ok(report)
    }

    /// Fetch the feed for `term` and process its items in feed order.
    #[instrument(level = "info", skip(self))]
    pub async fn process_keyword(&self, term: &str) -> Result<Vec<PipelineResult>, FeedError> {
        let limit = self.config.feed.items_per_keyword;
        let items = self.feed.fetch(&self.fetcher, term, limit).await;
        if limit > 0 {
            pause(
                Duration::from_millis(self.config.politeness.feed_delay_ms),
                "feed",
            )
            .await;
        }
        let items = items?;

        let item_delay = Duration::from_millis(self.config.politeness.item_delay_ms);
        let mut results = Vec::with_capacity(items.len());
        for item in &items {
            pause(item_delay, "item").await;
            if self.cap_reached() {
                info!(
                    remaining = items.len() - results.len(),
                    "Acceptance cap reached; leaving remaining items"
                );
                break;
            }
            match self.process_item(item).await {
                Some(result) => {
                    log_result(&result);
                    results.push(result);
                }
                None => break,
            }
        }
        Ok(results)
    }

    /// `None` means the run's acceptance cap was hit while this item was in
    /// flight; the item produces no result.
    async fn process_item(&self, item: &FeedItem) -> Option<PipelineResult> {
        if let Err(reason) = self.gate.check_recency(item.published_at, Utc::now()) {
            return Some(PipelineResult::rejected(item, reason));
        }

        let resolved = self.resolver.resolve(&self.fetcher, &item.wrapper_link).await;
        debug!(
            canonical = %resolved.canonical_url,
            method = ?resolved.method,
            "Resolved wrapper link"
        );
        if let Some(e) = resolved.fetch_error.as_ref().filter(|_| !resolved.is_resolved()) {
            return Some(PipelineResult::rejected(
                item,
                RejectReason::FetchFailed {
                    message: e.to_string(),
                },
            ));
        }

        let signature = Signature::compute(&item.title, &resolved.canonical_url);
        if self.store.contains(&signature) {
            return Some(PipelineResult::rejected(item, RejectReason::Duplicate));
        }

        let fetcher = RetryFetch::new(&self.fetcher, self.retry);
        let article = match self
            .extractor
            .extract(&fetcher, &resolved.canonical_url, &item.title)
            .await
        {
            Ok(article) => article,
            Err(ExtractError::Fetch(e)) => {
                return Some(PipelineResult::rejected(
                    item,
                    RejectReason::FetchFailed {
                        message: e.to_string(),
                    },
                ));
            }
            Err(ExtractError::ContentInsufficient {
                char_count,
                paragraph_count,
            }) => {
                return Some(PipelineResult::rejected(
                    item,
                    RejectReason::ContentInsufficient {
                        char_count,
                        paragraph_count,
                    },
                ));
            }
        };
        if let Err(reason) = self.gate.check_substance(&article) {
            return Some(PipelineResult::rejected(item, reason));
        }

        if !self.reserve_slot() {
            return None;
        }
        if !self.store.add(signature) {
            // Another lane accepted the same article meanwhile.
            self.accepted.fetch_sub(1, Ordering::SeqCst);
            return Some(PipelineResult::rejected(item, RejectReason::Duplicate));
        }
        Some(PipelineResult::Accepted {
            article,
            published_at: item.published_at,
        })
    }

    fn cap_reached(&self) -> bool {
        self.config
            .run
            .max_accepted_per_run
            .is_some_and(|cap| self.accepted.load(Ordering::SeqCst) >= cap)
    }

    fn reserve_slot(&self) -> bool {
        let cap = self.config.run.max_accepted_per_run.unwrap_or(usize::MAX);
        self.accepted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < cap).then_some(n + 1)
            })
            .is_ok()
    }
}

fn log_result(result: &PipelineResult) {
    match result {
        PipelineResult::Accepted { article, .. } => info!(
            title = %truncate_for_log(&article.title, 120),
            url = %article.source_url,
            chars = article.char_count,
            paragraphs = article.paragraph_count,
            "Accepted article"
        ),
        PipelineResult::Rejected {
            title,
            link,
            reason,
        } => info!(
            title = %truncate_for_log(title, 120),
            %link,
            ?reason,
            "Rejected item"
        ),
    }
}
