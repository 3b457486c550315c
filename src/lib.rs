//! # News Ingest
//!
//! Keyword-driven news ingestion: search an aggregator's RSS feed, resolve
//! each wrapper link to the publisher's article, extract a clean body and
//! admit it only when it is recent, substantial and not seen before.
//!
//! # Architecture
//!
//! 1. **Feed** ([`feed`]): one RSS search request per keyword
//! 2. **Resolution** ([`resolver`]): wrapper link → publisher URL
//! 3. **Deduplication** ([`signatures`]): bounded ledger of seen articles
//! 4. **Extraction** ([`extractor`]): tiered body detection with AMP fallback
//! 5. **Admission** ([`gate`]): recency and substance thresholds
//! 6. **Orchestration** ([`pipeline`]): per-item containment and keyword lanes
//!
//! All network access goes through [`http::FetchAsync`], so every stage can
//! be exercised against canned pages.

pub mod config;
pub mod error;
pub mod extractor;
pub mod feed;
pub mod gate;
pub mod http;
pub mod models;
pub mod outputs;
pub mod pipeline;
pub mod resolver;
pub mod signatures;
pub mod utils;

pub use config::PipelineConfig;
pub use error::{ConfigError, ExtractError, FeedError, FetchError, StoreError};
pub use models::{ExtractedArticle, FeedItem, PipelineResult, RejectReason, RunReport};
pub use pipeline::Pipeline;
pub use signatures::{Signature, SignatureStore};
