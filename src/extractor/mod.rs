//! Publisher page → clean article.
//!
//! The page is fetched and parsed once, then [`ExtractionTier::CHAIN`] runs
//! in order; the first tier whose rebuilt body meets the substance
//! thresholds wins. When every tier comes out thin and the page advertises an
//! AMP variant, that variant is fetched once and the chain reruns on it.
//!
//! Parsing is synchronous ([`ContentExtractor::extract_document`]) so no
//! `scraper::Html` lives across an await point.

pub mod boilerplate;
pub mod dom;
pub mod strategies;

use crate::config::ExtractorConfig;
use crate::error::{ConfigError, ExtractError};
use crate::gate::QualityGate;
use crate::http::FetchAsync;
use crate::models::ExtractedArticle;
use crate::utils::{absolute_http, collapse_whitespace};
use boilerplate::BoilerplateFilter;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use strategies::{BodyCandidate, ExtractionTier};
use tracing::{debug, info, instrument, warn};
use url::Url;

static OG_TITLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:title"][content], meta[name="og:title"][content]"#)
        .unwrap()
});
static TITLE: Lazy<Selector> = Lazy::new(|| Selector::parse("title").unwrap());
static HEADING: Lazy<Selector> = Lazy::new(|| Selector::parse("h1, h2").unwrap());
static OG_IMAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="og:image"][content], meta[name="og:image"][content]"#)
        .unwrap()
});
static TWITTER_IMAGE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(
        r#"meta[name="twitter:image"][content], meta[property="twitter:image"][content]"#,
    )
    .unwrap()
});
static IMG: Lazy<Selector> = Lazy::new(|| Selector::parse("img[src], amp-img[src]").unwrap());
static AMP_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="amphtml"][href]"#).unwrap());

/// Every tier came out below the thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThinPage {
    /// Counts of the largest candidate seen.
    pub char_count: usize,
    pub paragraph_count: usize,
    /// The page's `rel=amphtml` link, if any.
    pub amp_url: Option<Url>,
}

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    gate: QualityGate,
    filter: BoilerplateFilter,
    follow_amp: bool,
}

impl ContentExtractor {
    pub fn new(config: &ExtractorConfig, gate: QualityGate) -> Result<Self, ConfigError> {
        let filter = BoilerplateFilter::from_config(config)?;
        debug!(
            patterns = filter.len(),
            follow_amp = config.follow_amp,
            "Content extractor ready"
        );
        Ok(Self {
            gate,
            filter,
            follow_amp: config.follow_amp,
        })
    }

    /// Run the tier chain over one HTML document.
    pub fn extract_document(
        &self,
        html: &str,
        page_url: &Url,
        fallback_title: &str,
    ) -> Result<ExtractedArticle, ThinPage> {
        let doc = Html::parse_document(html);
        let mut largest: Option<(usize, usize)> = None;

        for tier in ExtractionTier::CHAIN {
            let Some(candidate) = tier.run(&doc, &self.filter) else {
                debug!(?tier, "No candidate");
                continue;
            };
            let char_count = candidate.char_count();
            let paragraph_count = candidate.paragraph_count();
            if self.gate.meets_substance(char_count, paragraph_count) {
                debug!(?tier, char_count, paragraph_count, "Tier accepted");
                return Ok(build_article(&doc, &candidate, page_url, fallback_title));
            }
            debug!(?tier, char_count, paragraph_count, "Tier below thresholds");
            if largest.is_none_or(|(chars, _)| char_count > chars) {
                largest = Some((char_count, paragraph_count));
            }
        }

        let (char_count, paragraph_count) = largest.unwrap_or_default();
        let amp_url = doc
            .select(&AMP_LINK)
            .filter_map(|el| el.value().attr("href"))
            .filter_map(|href| absolute_http(page_url, href))
            .find(|amp| amp != page_url);
        Err(ThinPage {
            char_count,
            paragraph_count,
            amp_url,
        })
    }

    /// Fetch `url` and extract its article, trying the AMP variant once when
    /// the page itself is too thin.
    #[instrument(level = "info", skip_all, fields(%url))]
    pub async fn extract<F: FetchAsync>(
        &self,
        fetcher: &F,
        url: &Url,
        fallback_title: &str,
    ) -> Result<ExtractedArticle, ExtractError> {
        let page = fetcher.fetch(url).await?;
        let thin = match self.extract_document(&page.body, &page.final_url, fallback_title) {
            Ok(article) => return Ok(article),
            Err(thin) => thin,
        };

        let mut counts = (thin.char_count, thin.paragraph_count);
        if let Some(amp_url) = thin.amp_url.filter(|_| self.follow_amp) {
            debug!(%amp_url, "Primary page thin; trying AMP variant");
            match fetcher.fetch(&amp_url).await {
                Ok(amp) => match self.extract_document(&amp.body, &amp.final_url, fallback_title) {
                    Ok(mut article) => {
                        article.source_url = page.final_url.clone();
                        return Ok(article);
                    }
                    Err(amp_thin) if amp_thin.char_count > counts.0 => {
                        counts = (amp_thin.char_count, amp_thin.paragraph_count);
                    }
                    Err(_) => {}
                },
                Err(e) => warn!(%amp_url, error = %e, "AMP fetch failed"),
            }
        }

        let (char_count, paragraph_count) = counts;
        info!(
            url = %page.final_url,
            char_count,
            paragraph_count,
            min_chars = self.gate.min_chars(),
            min_paragraphs = self.gate.min_paragraphs(),
            "Content insufficient"
        );
        Err(ExtractError::ContentInsufficient {
            char_count,
            paragraph_count,
        })
    }
}

fn build_article(
    doc: &Html,
    candidate: &BodyCandidate<'_>,
    page_url: &Url,
    fallback_title: &str,
) -> ExtractedArticle {
    let plain_text = candidate.plain_text();
    ExtractedArticle {
        title: pick_title(doc, candidate.container, fallback_title),
        body_html: dom::render_blocks(&candidate.blocks),
        char_count: plain_text.chars().count(),
        paragraph_count: candidate.blocks.len(),
        plain_text,
        lead_image: pick_image(doc, candidate.container, page_url),
        source_url: page_url.clone(),
    }
}

fn first_content(doc: &Html, selector: &Selector) -> Option<String> {
    doc.select(selector)
        .filter_map(|el| el.value().attr("content"))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

fn pick_title(doc: &Html, container: ElementRef<'_>, fallback: &str) -> String {
    first_content(doc, &OG_TITLE)
        .or_else(|| {
            doc.select(&TITLE)
                .map(dom::visible_text)
                .find(|s| !s.is_empty())
        })
        .or_else(|| {
            container
                .select(&HEADING)
                .map(dom::visible_text)
                .find(|s| !s.is_empty())
        })
        .unwrap_or_else(|| collapse_whitespace(fallback))
}

fn pick_image(doc: &Html, container: ElementRef<'_>, page_url: &Url) -> Option<Url> {
    let meta = [&*OG_IMAGE, &*TWITTER_IMAGE].into_iter().find_map(|selector| {
        doc.select(selector)
            .filter_map(|el| el.value().attr("content"))
            .find_map(|raw| absolute_http(page_url, raw))
    });
    meta.or_else(|| {
        container
            .select(&IMG)
            .filter_map(|el| el.value().attr("src"))
            .find_map(|raw| absolute_http(page_url, raw))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GateConfig;
    use crate::error::FetchError;
    use crate::http::mock::MockFetcher;

    const P1: &str = "A prefeitura de Ubatuba confirmou nesta sexta-feira a interdição parcial da rodovia que liga o centro às praias do norte.";
    const P2: &str = "Segundo a Defesa Civil, o trecho afetado pelas chuvas deve passar por obras de contenção durante as próximas duas semanas.";
    const P3: &str = "Motoristas devem usar o desvio sinalizado pela estrada vicinal, que recebeu reforço de agentes de trânsito no fim de semana.";

    fn extractor(follow_amp: bool) -> ContentExtractor {
        let config = ExtractorConfig {
            follow_amp,
            ..ExtractorConfig::default()
        };
        let gate = QualityGate::new(&GateConfig::default()).unwrap();
        ContentExtractor::new(&config, gate).unwrap()
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn full_page() -> String {
        format!(
            r#"<html><head>
                <title>Rodovia interditada | Jornal</title>
                <meta property="og:title" content="  Rodovia   interditada em Ubatuba ">
                <meta property="og:image" content="/img/rodovia.jpg">
            </head><body>
                <header><p>Assine já</p></header>
                <div class="materia-conteudo">
                    <p>{P1}</p>
                    <p>Leia também: chuvas atingem o litoral</p>
                    <p>{P2}</p>
                    <p>{P3}</p>
                </div>
                <footer><p>Todos os direitos reservados</p></footer>
            </body></html>"#
        )
    }

    #[test]
    fn test_extract_document_rebuilds_body() {
        let page = url("https://jornal.example/cidades/rodovia.html");
        let article = extractor(true)
            .extract_document(&full_page(), &page, "feed title")
            .unwrap();

        assert_eq!(article.title, "Rodovia interditada em Ubatuba");
        assert_eq!(
            article.lead_image.as_ref().map(Url::as_str),
            Some("https://jornal.example/img/rodovia.jpg")
        );
        assert_eq!(article.paragraph_count, 3);
        assert_eq!(article.plain_text, format!("{P1}\n\n{P2}\n\n{P3}"));
        assert_eq!(article.char_count, article.plain_text.chars().count());
        assert!(!article.body_html.contains("Leia também"));
        assert!(!article.body_html.contains("direitos"));
        assert_eq!(article.source_url, page);
    }

    #[test]
    fn test_thin_page_reports_counts_and_amp() {
        let html = r#"<html><head><link rel="amphtml" href="/amp/a.html"></head>
            <body><article><p>Só uma linha curta.</p></article></body></html>"#;
        let thin = extractor(true)
            .extract_document(html, &url("https://jornal.example/a.html"), "t")
            .unwrap_err();
        assert_eq!(thin.char_count, "Só uma linha curta.".chars().count());
        assert_eq!(thin.paragraph_count, 1);
        assert_eq!(
            thin.amp_url.as_ref().map(Url::as_str),
            Some("https://jornal.example/amp/a.html")
        );
    }

    #[test]
    fn test_never_returns_below_threshold() {
        let extractor = extractor(true);
        let gate = QualityGate::new(&GateConfig::default()).unwrap();
        let pages = [
            full_page(),
            format!("<html><body><p>{P1}</p></body></html>"),
            format!("<html><body><ul><li>{P1}</li><li>{P2}</li></ul></body></html>"),
            "<html><body><div>texto solto sem parágrafos</div></body></html>".to_string(),
            String::new(),
        ];
        for html in pages {
            if let Ok(article) =
                extractor.extract_document(&html, &url("https://jornal.example/x"), "t")
            {
                assert!(gate.meets_substance(article.char_count, article.paragraph_count));
            }
        }
    }

    #[test]
    fn test_article_element_used_when_scored_paragraphs_are_thin() {
        let html = format!(
            r#"<html><body>
                <div class="destaque"><p>{P1}</p></div>
                <article>
                    <h2>Rodovia interditada</h2>
                    <ul><li>{P2}</li><li>{P3}</li></ul>
                </article>
            </body></html>"#
        );
        let article = extractor(true)
            .extract_document(&html, &url("https://jornal.example/n/3"), "t")
            .unwrap();

        assert_eq!(article.paragraph_count, 3);
        assert_eq!(
            article.plain_text,
            format!("Rodovia interditada\n\n{P2}\n\n{P3}")
        );
        assert!(article.body_html.contains("<ul><li>"));
        assert!(!article.plain_text.contains(P1));
    }

    #[test]
    fn test_scored_container_used_for_short_line_bulletins() {
        let lines = [
            "Fila na balsa: 2 horas.",
            "Pedestres: sem espera.",
            "Ônibus circulam normal.",
            "Chuva fraca no litoral.",
            "Mar agitado à tarde.",
            "Praias liberadas.",
            "Trânsito lento na SP-55.",
            "Balsa extra às 16h.",
            "Próximo boletim às 18h.",
            "Rodoviária sem atrasos.",
        ];
        let bulletin: String = lines.iter().map(|l| format!("<p>{l}</p>")).collect();
        let html = format!(
            r#"<html><body>
                <div class="aviso"><p>{P1}</p></div>
                <div id="boletim">{bulletin}</div>
            </body></html>"#
        );
        let article = extractor(true)
            .extract_document(&html, &url("https://jornal.example/boletim"), "t")
            .unwrap();

        assert_eq!(article.paragraph_count, lines.len());
        assert_eq!(article.plain_text, lines.join("\n\n"));
        assert_eq!(article.char_count, 235);
    }

    #[test]
    fn test_title_and_image_fallbacks() {
        let html = format!(
            r#"<html><body><article>
                <h1>Título da matéria</h1>
                <img src="data:image/png;base64,AAAA">
                <img src="fotos/capa.jpg">
                <p>{P1}</p><p>{P2}</p>
            </article></body></html>"#
        );
        let article = extractor(true)
            .extract_document(&html, &url("https://jornal.example/n/1"), "feed title")
            .unwrap();
        assert_eq!(article.title, "Título da matéria");
        assert_eq!(
            article.lead_image.as_ref().map(Url::as_str),
            Some("https://jornal.example/n/fotos/capa.jpg")
        );

        let bare = format!("<html><body><div><p>{P1}</p><p>{P2}</p></div></body></html>");
        let article = extractor(true)
            .extract_document(&bare, &url("https://jornal.example/n/2"), " feed  title ")
            .unwrap();
        assert_eq!(article.title, "feed title");
        assert_eq!(article.lead_image, None);
    }

    #[tokio::test]
    async fn test_amp_fallback_keeps_primary_url() {
        let primary = "https://jornal.example/a.html";
        let amp = "https://jornal.example/amp/a.html";
        let mock = MockFetcher::new()
            .page(
                primary,
                r#"<html><head><link rel="amphtml" href="/amp/a.html"></head>
                   <body><p>Conteúdo carregado por script.</p></body></html>"#,
            )
            .page(amp, &full_page());

        let article = extractor(true)
            .extract(&mock, &url(primary), "t")
            .await
            .unwrap();
        assert_eq!(article.source_url.as_str(), primary);
        assert_eq!(article.paragraph_count, 3);
        assert_eq!(mock.call_count(amp), 1);
    }

    #[tokio::test]
    async fn test_amp_not_followed_when_disabled() {
        let primary = "https://jornal.example/a.html";
        let mock = MockFetcher::new().page(
            primary,
            r#"<html><head><link rel="amphtml" href="/amp/a.html"></head>
               <body><article><p>Curto.</p></article></body></html>"#,
        );

        let err = extractor(false)
            .extract(&mock, &url(primary), "t")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExtractError::ContentInsufficient {
                char_count: 6,
                paragraph_count: 1
            }
        );
        assert_eq!(mock.calls(), vec![primary.to_string()]);
    }

    #[tokio::test]
    async fn test_amp_fetch_failure_keeps_primary_counts() {
        let primary = "https://jornal.example/a.html";
        let amp = "https://jornal.example/amp/a.html";
        let mock = MockFetcher::new().page(
            primary,
            r#"<html><head><link rel="amphtml" href="/amp/a.html"></head>
               <body><article><p>Curto.</p></article></body></html>"#,
        );

        let err = extractor(true)
            .extract(&mock, &url(primary), "t")
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExtractError::ContentInsufficient {
                char_count: 6,
                paragraph_count: 1
            }
        );
        assert_eq!(mock.calls(), vec![primary.to_string(), amp.to_string()]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_reported() {
        let primary = "https://jornal.example/down";
        let mock = MockFetcher::new().fail(
            primary,
            FetchError::Timeout {
                url: primary.to_string(),
            },
        );
        let err = extractor(true)
            .extract(&mock, &url(primary), "t")
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractError::Fetch(FetchError::Timeout { .. })));
    }
}
