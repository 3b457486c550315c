//! Body-container strategies, tried in order until one yields enough text.

use super::boilerplate::BoilerplateFilter;
use super::dom::{self, Block, BlockKind};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::hash::Hash;

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static PARAGRAPH: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static ARTICLE: Lazy<Selector> = Lazy::new(|| Selector::parse("article").unwrap());
static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

static POSITIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)article|body|content|entry|main|post|story|text|materia|noticia").unwrap()
});
static NEGATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)comment|footer|nav|sidebar|sponsor|share|related|promo|social|widget")
        .unwrap()
});

const MIN_SCORED_PARAGRAPH: usize = 25;
const CLASS_WEIGHT: f64 = 25.0;
const SCORED_PARAGRAPH_WEIGHT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionTier {
    Readability,
    ArticleElement,
    ScoredContainer,
}

impl ExtractionTier {
    pub const CHAIN: [ExtractionTier; 3] = [
        ExtractionTier::Readability,
        ExtractionTier::ArticleElement,
        ExtractionTier::ScoredContainer,
    ];

    pub fn run<'a>(self, doc: &'a Html, filter: &BoilerplateFilter) -> Option<BodyCandidate<'a>> {
        let container = match self {
            ExtractionTier::Readability => readability(doc)?,
            ExtractionTier::ArticleElement => article_element(doc, filter)?,
            ExtractionTier::ScoredContainer => scored_container(doc, filter)?,
        };
        let blocks = dom::collect_blocks(container, filter);
        if blocks.is_empty() {
            return None;
        }
        Some(BodyCandidate { container, blocks })
    }
}

/// A container picked by one tier, with its rebuilt blocks.
#[derive(Debug, Clone)]
pub struct BodyCandidate<'a> {
    pub container: ElementRef<'a>,
    pub blocks: Vec<Block>,
}

impl BodyCandidate<'_> {
    pub fn plain_text(&self) -> String {
        dom::plain_text(&self.blocks)
    }

    pub fn char_count(&self) -> usize {
        self.plain_text().chars().count()
    }

    pub fn paragraph_count(&self) -> usize {
        self.blocks.len()
    }
}

/// Accumulated scores keyed by node, remembering first-seen order so ties
/// resolve to the earliest element in the document.
struct ScoreBoard<'a, K> {
    index: HashMap<K, usize>,
    entries: Vec<(ElementRef<'a>, f64)>,
}

impl<'a, K: Hash + Eq> ScoreBoard<'a, K> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Add `score` to `el`, seeding a new entry with `initial(el)`.
    fn add(&mut self, key: K, el: ElementRef<'a>, score: f64, initial: impl Fn(ElementRef<'_>) -> f64) {
        match self.index.get(&key) {
            Some(&i) => self.entries[i].1 += score,
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((el, initial(el) + score));
            }
        }
    }

    fn map_scores(&mut self, f: impl Fn(ElementRef<'_>, f64) -> f64) {
        for (el, score) in &mut self.entries {
            *score = f(*el, *score);
        }
    }

    fn best(&self) -> Option<ElementRef<'a>> {
        let mut best: Option<(ElementRef<'a>, f64)> = None;
        for &(el, score) in &self.entries {
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((el, score));
            }
        }
        best.map(|(el, _)| el)
    }
}

fn class_weight(el: ElementRef<'_>) -> f64 {
    let mut weight = 0.0;
    for attr in [el.value().attr("class"), el.value().attr("id")].into_iter().flatten() {
        if NEGATIVE.is_match(attr) {
            weight -= CLASS_WEIGHT;
        }
        if POSITIVE.is_match(attr) {
            weight += CLASS_WEIGHT;
        }
    }
    weight
}

fn link_density(el: ElementRef<'_>) -> f64 {
    let total = dom::visible_text(el).chars().count();
    if total == 0 {
        return 0.0;
    }
    let links: usize = el
        .select(&LINK)
        .map(|a| dom::visible_text(a).chars().count())
        .sum();
    links as f64 / total as f64
}

fn parent_element(el: ElementRef<'_>) -> Option<ElementRef<'_>> {
    el.parent().and_then(ElementRef::wrap)
}

/// Paragraph-scoring heuristic: text-rich paragraphs vote for their parent
/// (full score) and grandparent (half), scaled down by link density.
fn readability(doc: &Html) -> Option<ElementRef<'_>> {
    let root = doc.root_element();
    let mut board = ScoreBoard::new();

    for p in doc.select(&PARAGRAPH) {
        if dom::inside_skipped(p, root) {
            continue;
        }
        let text = dom::visible_text(p);
        let len = text.chars().count();
        if len < MIN_SCORED_PARAGRAPH {
            continue;
        }
        let commas = text.matches([',', '，']).count();
        let score = 1.0 + commas as f64 + (len / 100).min(3) as f64;

        let Some(parent) = parent_element(p) else {
            continue;
        };
        board.add(parent.id(), parent, score, class_weight);
        if let Some(grandparent) = parent_element(parent) {
            board.add(grandparent.id(), grandparent, score / 2.0, class_weight);
        }
    }

    board.map_scores(|el, score| score * (1.0 - link_density(el)));
    board.best()
}

/// The `<article>` element with the most accepted text.
fn article_element<'a>(doc: &'a Html, filter: &BoilerplateFilter) -> Option<ElementRef<'a>> {
    let root = doc.root_element();
    let mut best: Option<(ElementRef<'a>, usize)> = None;
    for article in doc.select(&ARTICLE) {
        if dom::is_skipped(article.value()) || dom::inside_skipped(article, root) {
            continue;
        }
        let chars: usize = dom::collect_blocks(article, filter)
            .iter()
            .map(Block::char_count)
            .sum();
        if chars > 0 && best.is_none_or(|(_, top)| chars > top) {
            best = Some((article, chars));
        }
    }
    best.map(|(el, _)| el)
}

/// Every `div`/`main`/`section` scored by the paragraphs it holds.
fn scored_container<'a>(doc: &'a Html, filter: &BoilerplateFilter) -> Option<ElementRef<'a>> {
    let body = doc.select(&BODY).next()?;
    let mut board = ScoreBoard::new();

    for (el, block) in dom::block_elements(body, filter) {
        if block.kind != BlockKind::Paragraph {
            continue;
        }
        let score = SCORED_PARAGRAPH_WEIGHT + block.char_count() as f64;
        for ancestor in el.ancestors().take_while(|n| n.id() != body.id()) {
            let Some(container) = ElementRef::wrap(ancestor) else {
                continue;
            };
            if matches!(container.value().name(), "div" | "main" | "section") {
                board.add(container.id(), container, score, |_| 0.0);
            }
        }
    }
    board.best()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExtractorConfig;

    fn filter() -> BoilerplateFilter {
        BoilerplateFilter::from_config(&ExtractorConfig::default()).unwrap()
    }

    const LONG_A: &str = "O governo municipal anunciou, nesta sexta-feira, um novo plano de mobilidade para o litoral, com obras em três bairros.";
    const LONG_B: &str = "Segundo a prefeitura, as intervenções começam em novembro, devem durar seis meses e custar cerca de R$ 12 milhões.";

    #[test]
    fn test_readability_prefers_text_rich_container() {
        let html = format!(
            r#"<html><body>
                <div class="sidebar"><p>Mais lidas: um, dois, três, quatro, cinco, seis</p></div>
                <div class="story-body"><p>{LONG_A}</p><p>{LONG_B}</p></div>
            </body></html>"#
        );
        let doc = Html::parse_document(&html);
        let candidate = ExtractionTier::Readability.run(&doc, &filter()).unwrap();
        assert_eq!(candidate.container.value().attr("class"), Some("story-body"));
        assert_eq!(candidate.paragraph_count(), 2);
    }

    #[test]
    fn test_readability_ignores_short_paragraphs() {
        let doc = Html::parse_document("<html><body><div><p>Curto.</p></div></body></html>");
        assert!(ExtractionTier::Readability.run(&doc, &filter()).is_none());
    }

    #[test]
    fn test_layout_classes_on_body_keep_first_tiers() {
        let html = format!(
            r#"<html><body class="single-post right-sidebar"><div id="page">
                <article><p>{LONG_A}</p><p>{LONG_B}</p><p>{LONG_A}</p></article>
                <div class="mais"><p>Outra matéria sem relação com o texto principal.</p></div>
            </div></body></html>"#
        );
        let doc = Html::parse_document(&html);
        for tier in [ExtractionTier::Readability, ExtractionTier::ArticleElement] {
            let candidate = tier.run(&doc, &filter()).unwrap();
            assert_eq!(candidate.container.value().name(), "article", "{tier:?}");
            assert_eq!(candidate.paragraph_count(), 3, "{tier:?}");
            assert!(!candidate.plain_text().contains("Outra matéria"), "{tier:?}");
        }
    }

    #[test]
    fn test_article_element_picks_largest() {
        let html = format!(
            r#"<html><body>
                <article id="teaser"><p>Chamada curta</p></article>
                <article id="main"><p>{LONG_A}</p><p>{LONG_B}</p></article>
            </body></html>"#
        );
        let doc = Html::parse_document(&html);
        let candidate = ExtractionTier::ArticleElement.run(&doc, &filter()).unwrap();
        assert_eq!(candidate.container.value().attr("id"), Some("main"));
    }

    #[test]
    fn test_scored_container_sums_paragraphs() {
        let html = format!(
            r#"<html><body>
                <section id="outer"><div id="inner"><p>{LONG_A}</p><p>{LONG_B}</p></div></section>
                <div id="other"><p>Uma linha</p></div>
            </body></html>"#
        );
        let doc = Html::parse_document(&html);
        let candidate = ExtractionTier::ScoredContainer.run(&doc, &filter()).unwrap();
        // Outer and inner tie; the first seen (innermost ancestor) wins.
        assert_eq!(candidate.container.value().attr("id"), Some("inner"));
        assert_eq!(candidate.paragraph_count(), 2);
    }

    #[test]
    fn test_counts_follow_plain_text() {
        let doc = Html::parse_document(
            "<html><body><article><p>ação</p><p>fim</p></article></body></html>",
        );
        let candidate = ExtractionTier::ArticleElement.run(&doc, &filter()).unwrap();
        assert_eq!(candidate.plain_text(), "ação\n\nfim");
        assert_eq!(candidate.char_count(), 9);
    }
}
