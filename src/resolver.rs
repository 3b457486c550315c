//! Wrapper link → publisher URL.
//!
//! Strategies run in order and the first success wins:
//!
//! | Step | Method | Network |
//! |------|--------|---------|
//! | 1 | [`QueryParam`](ResolutionMethod::QueryParam): absolute URL in the query string | none |
//! | 2 | [`Redirect`](ResolutionMethod::Redirect): redirects end on a publisher host | wrapper fetch |
//! | 3 | [`MetaRefresh`](ResolutionMethod::MetaRefresh) | reuses wrapper page |
//! | 4 | [`Canonical`](ResolutionMethod::Canonical) | reuses wrapper page |
//! | 5 | [`OpenGraphUrl`](ResolutionMethod::OpenGraphUrl) | reuses wrapper page |
//! | 6 | [`AmpLink`](ResolutionMethod::AmpLink) | reuses wrapper page |
//! | 7 | [`FirstExternalAnchor`](ResolutionMethod::FirstExternalAnchor) | reuses wrapper page |
//!
//! When everything fails the wrapper itself comes back tagged
//! [`Unresolved`](ResolutionMethod::Unresolved). That is not an error: the
//! quality gate downstream rejects whatever an aggregator page yields. A
//! wrapper that could not be downloaded at all also carries the fetch error,
//! and the pipeline does not try it a second time.

use crate::config::ResolverConfig;
use crate::http::{FetchAsync, RetryFetch, RetryPolicy};
use crate::models::{ResolutionMethod, ResolvedLink};
use crate::utils::{absolute_http, pause};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

static META_HTTP_EQUIV: Lazy<Selector> =
    Lazy::new(|| Selector::parse("meta[http-equiv][content]").unwrap());
static BASE_HREF: Lazy<Selector> = Lazy::new(|| Selector::parse("base[href]").unwrap());
static CANONICAL: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="canonical"][href]"#).unwrap());
static OG_URL: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:url"][content], meta[name="og:url"][content]"#).unwrap()
});
static AMP_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="amphtml"][href]"#).unwrap());
static ANCHOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static REFRESH_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)url\s*=\s*['"]?([^'"\s>]+)"#).unwrap());

/// Resolves aggregator wrapper links to publisher URLs.
#[derive(Debug, Clone)]
pub struct LinkResolver {
    config: ResolverConfig,
}

impl LinkResolver {
    pub fn new(config: ResolverConfig) -> Self {
        Self { config }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.config.max_attempts,
            base_delay: Duration::from_millis(self.config.backoff_ms),
            max_delay: Duration::from_millis(self.config.backoff_ms.saturating_mul(4)),
            jitter: Duration::ZERO,
        }
    }

    /// Whether `url` points at the aggregator rather than a publisher.
    pub fn is_aggregator(&self, url: &Url, wrapper: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return true;
        };
        let host = host.trim_start_matches("www.").to_ascii_lowercase();
        if wrapper
            .host_str()
            .is_some_and(|w| w.trim_start_matches("www.").eq_ignore_ascii_case(&host))
        {
            return true;
        }
        self.config.aggregator_domains.iter().any(|domain| {
            let domain = domain.trim().trim_start_matches('.').to_ascii_lowercase();
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }

    /// Resolve `wrapper` to the publisher URL.
    ///
    /// Never fails; see the module docs for the strategy order.
    #[instrument(level = "info", skip_all, fields(wrapper = %wrapper))]
    pub async fn resolve<F: FetchAsync>(&self, fetcher: &F, wrapper: &Url) -> ResolvedLink {
        if let Some(url) = embedded_url(wrapper) {
            info!(canonical = %url, "Resolved from query parameter");
            return ResolvedLink::new(url, ResolutionMethod::QueryParam);
        }

        pause(
            Duration::from_millis(self.config.pre_resolve_delay_ms),
            "pre-resolution delay",
        )
        .await;

        let fetcher = RetryFetch::new(fetcher, self.retry_policy());
        let page = match fetcher.fetch(wrapper).await {
            Ok(page) => page,
            Err(e) => {
                warn!(error = %e, "Wrapper fetch failed; leaving link unresolved");
                return ResolvedLink::unreachable(wrapper.clone(), e);
            }
        };

        if !self.is_aggregator(&page.final_url, wrapper) {
            info!(canonical = %page.final_url, "Resolved through redirect");
            return ResolvedLink::new(page.final_url, ResolutionMethod::Redirect);
        }

        match self.resolve_from_html(&page.body, &page.final_url, wrapper) {
            Some(resolved) => {
                info!(canonical = %resolved.canonical_url, method = ?resolved.method, "Resolved from wrapper page");
                resolved
            }
            None => {
                info!("No strategy resolved the wrapper link");
                ResolvedLink::new(wrapper.clone(), ResolutionMethod::Unresolved)
            }
        }
    }

    /// Run the HTML strategies against an already fetched wrapper page.
    pub fn resolve_from_html(&self, html: &str, page_url: &Url, wrapper: &Url) -> Option<ResolvedLink> {
        let document = Html::parse_document(html);
        let base = document
            .select(&BASE_HREF)
            .next()
            .and_then(|b| b.value().attr("href"))
            .and_then(|href| page_url.join(href.trim()).ok())
            .unwrap_or_else(|| page_url.clone());
        let external = |url: &Url| !self.is_aggregator(url, wrapper);

        if let Some(url) = meta_refresh_target(&document, &base) {
            return Some(ResolvedLink::new(url, ResolutionMethod::MetaRefresh));
        }

        let attr_candidates = [
            (&*CANONICAL, "href", ResolutionMethod::Canonical),
            (&*OG_URL, "content", ResolutionMethod::OpenGraphUrl),
            (&*AMP_LINK, "href", ResolutionMethod::AmpLink),
            (&*ANCHOR, "href", ResolutionMethod::FirstExternalAnchor),
        ];
        for (selector, attr, method) in attr_candidates {
            let found = document
                .select(selector)
                .filter_map(|el| el.value().attr(attr))
                .filter_map(|raw| absolute_http(&base, raw))
                .find(|url| external(url));
            if let Some(url) = found {
                debug!(%url, ?method, "Wrapper page strategy matched");
                return Some(ResolvedLink::new(url, method));
            }
        }
        None
    }
}

/// First query parameter whose decoded value is an absolute `http(s)` URL.
pub fn embedded_url(wrapper: &Url) -> Option<Url> {
    wrapper
        .query_pairs()
        .filter_map(|(_, value)| Url::parse(value.trim()).ok())
        .find(|url| matches!(url.scheme(), "http" | "https") && url.host_str().is_some())
}

fn meta_refresh_target(document: &Html, base: &Url) -> Option<Url> {
    document
        .select(&META_HTTP_EQUIV)
        .filter(|el| {
            el.value()
                .attr("http-equiv")
                .is_some_and(|v| v.trim().eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|el| el.value().attr("content"))
        .filter_map(|content| REFRESH_TARGET.captures(content))
        .filter_map(|caps| absolute_http(base, &caps[1]))
        .next()
}
