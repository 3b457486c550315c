//! Text blocks: the whitelisted units an article body is rebuilt from.
//!
//! Only `<p>`, `<h2>`–`<h4>` and `<li>` survive. A block is dropped when it
//! sits inside a non-content element (scripts, navigation, forms, ad-like
//! containers), when it carries no letters or digits, when it is a list item
//! made of links, or when it matches the boilerplate filter.

use super::boilerplate::BoilerplateFilter;
use crate::utils::{collapse_whitespace, escape_html};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::node::Element;
use scraper::{ElementRef, Node, Selector};
use std::fmt::Write;

/// Subtrees never read as article text.
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "nav", "footer", "header", "form",
    "aside", "iframe", "button", "select", "figcaption",
];

/// Subtrees whose text nodes are never visible.
const INVISIBLE_TAGS: &[&str] = &["script", "style", "noscript", "template", "svg"];

static AD_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(^|[\s_-])(ads?|advert\w*|banner|promo\w*|sponsor\w*|share|sharing|social|related|newsletter|cookies?|comments?|sidebar|menu|breadcrumbs?|outbrain|taboola|paywall)($|[\s_-])",
    )
    .unwrap()
});

static LINK: Lazy<Selector> = Lazy::new(|| Selector::parse("a").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    Subheading(u8),
    ListItem,
}

impl BlockKind {
    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "p" => Some(BlockKind::Paragraph),
            "h2" => Some(BlockKind::Subheading(2)),
            "h3" => Some(BlockKind::Subheading(3)),
            "h4" => Some(BlockKind::Subheading(4)),
            "li" => Some(BlockKind::ListItem),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub text: String,
}

impl Block {
    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// Tag, class or id marks the element as non-content.
///
/// Page-level `html`/`body` classes describe the layout (`right-sidebar`,
/// `menu-open`) and never mark the document itself as skipped.
pub fn is_skipped(element: &Element) -> bool {
    if matches!(element.name(), "html" | "body") {
        return false;
    }
    if SKIPPED_TAGS.contains(&element.name()) || element.attr("hidden").is_some() {
        return true;
    }
    if element
        .attr("aria-hidden")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return true;
    }
    let class = element.attr("class").unwrap_or_default();
    let id = element.attr("id").unwrap_or_default();
    (!class.is_empty() && AD_LIKE.is_match(class)) || (!id.is_empty() && AD_LIKE.is_match(id))
}

/// Some ancestor of `el` strictly below `container` is skipped, or is
/// itself a block (the outer block already covers this text).
fn shadowed(el: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    el.ancestors()
        .take_while(|node| node.id() != container.id())
        .filter_map(|node| node.value().as_element())
        .any(|element| is_skipped(element) || BlockKind::from_tag(element.name()).is_some())
}

/// Whether `el` lies inside a skipped element below `container`.
pub fn inside_skipped(el: ElementRef<'_>, container: ElementRef<'_>) -> bool {
    el.ancestors()
        .take_while(|node| node.id() != container.id())
        .filter_map(|node| node.value().as_element())
        .any(is_skipped)
}

/// Whitespace-collapsed text of `el`, ignoring script/style content.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut raw = String::new();
    for node in el.descendants() {
        match node.value() {
            Node::Text(text) => {
                let hidden = node
                    .ancestors()
                    .take_while(|a| a.id() != el.id())
                    .filter_map(|a| a.value().as_element())
                    .any(|e| INVISIBLE_TAGS.contains(&e.name()));
                if !hidden {
                    raw.push_str(text);
                }
            }
            Node::Element(e) if e.name() == "br" => raw.push(' '),
            _ => {}
        }
    }
    collapse_whitespace(&raw)
}

fn link_heavy(el: ElementRef<'_>, text_chars: usize) -> bool {
    let link_chars: usize = el
        .select(&LINK)
        .map(|a| visible_text(a).chars().count())
        .sum();
    link_chars * 10 >= text_chars * 8
}

/// Accepted blocks under `container` with the element each came from,
/// in document order.
pub fn block_elements<'a>(
    container: ElementRef<'a>,
    filter: &BoilerplateFilter,
) -> Vec<(ElementRef<'a>, Block)> {
    let mut out = Vec::new();
    for node in container.descendants() {
        if node.id() == container.id() {
            continue;
        }
        let Some(el) = ElementRef::wrap(node) else {
            continue;
        };
        let Some(kind) = BlockKind::from_tag(el.value().name()) else {
            continue;
        };
        if is_skipped(el.value()) || shadowed(el, container) {
            continue;
        }
        let text = visible_text(el);
        if !text.chars().any(char::is_alphanumeric) {
            continue;
        }
        if kind == BlockKind::ListItem && link_heavy(el, text.chars().count()) {
            continue;
        }
        if filter.is_boilerplate(&text) {
            continue;
        }
        out.push((el, Block { kind, text }));
    }
    out
}

pub fn collect_blocks(container: ElementRef<'_>, filter: &BoilerplateFilter) -> Vec<Block> {
    block_elements(container, filter)
        .into_iter()
        .map(|(_, block)| block)
        .collect()
}

/// Blocks joined by blank lines.
pub fn plain_text(blocks: &[Block]) -> String {
    blocks
        .iter()
        .map(|b| b.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Minimal HTML for the blocks; consecutive list items share one `<ul>`.
pub fn render_blocks(blocks: &[Block]) -> String {
    let mut html = String::new();
    let mut in_list = false;
    for block in blocks {
        let text = escape_html(&block.text);
        match block.kind {
            BlockKind::ListItem => {
                if !in_list {
                    html.push_str("<ul>");
                    in_list = true;
                }
                let _ = write!(html, "<li>{text}</li>");
            }
            kind => {
                if in_list {
                    html.push_str("</ul>");
                    in_list = false;
                }
                match kind {
                    BlockKind::Subheading(level) => {
                        let _ = write!(html, "<h{level}>{text}</h{level}>");
                    }
                    _ => {
                        let _ = write!(html, "<p>{text}</p>");
                    }
                }
            }
        }
    }
    if in_list {
        html.push_str("</ul>");
    }
    html
}
