// Text extraction helpers shared by the HTML-scraping sources


use fancy_regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));
static CITATION_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\d+\]").expect("valid regex"));
static SECTION_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"==+\s*").expect("valid regex"));

const BOILERPLATE_TAGS: &str = "script, style, nav, footer, header";

const MAIN_CONTENT_SELECTORS: &[&str] = &[
    "div.main-content",
    "article",
    "div.course-content",
    "div#course-content",
    "div.body",
    "main",
    "div#main",
    "body",
];

/// Collapse every whitespace run to a single space and trim
#[inline]
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

/// Clean MediaWiki plain-text extracts: citation markers, `==` headings, whitespace
#[inline]
pub fn clean_wiki_text(text: &str) -> String {
    let text = CITATION_MARKERS.replace_all(text, "");
    let text = SECTION_MARKERS.replace_all(&text, "");
    collapse_whitespace(&text)
}

/// Compile one of the literal selectors used by the scrapers
#[inline]
pub fn selector(css: &str) -> Selector {
    Selector::parse(css).expect("valid selector")
}

/// Text content of an element, whitespace-collapsed
#[inline]
pub fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

/// Text of the first element matching `css`
#[inline]
pub fn first_text(document: &Html, css: &str) -> Option<String> {
    document
        .select(&selector(css))
        .next()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Parse a page and drop script, style and navigation chrome
#[inline]
pub fn parse_without_boilerplate(html: &str) -> Html {
    let mut document = Html::parse_document(html);
    remove_elements(&mut document, &selector(BOILERPLATE_TAGS));
    document
}

/// Detach every element matching `unwanted` from the tree
#[inline]
pub fn remove_elements(document: &mut Html, unwanted: &Selector) {
    let unwanted_node_ids: Vec<_> = document
        .select(unwanted)
        .map(|element| element.id())
        .collect();

    for node_id in unwanted_node_ids {
        if let Some(mut node) = document.tree.get_mut(node_id) {
            node.detach();
        }
    }
}

/// Body text of the page's main content container, falling back to `<body>`
#[inline]
pub fn main_content_text(html: &str) -> Option<String> {
    let document = parse_without_boilerplate(html);

    MAIN_CONTENT_SELECTORS
        .iter()
        .find_map(|css| document.select(&selector(css)).next())
        .map(element_text)
        .filter(|text| !text.is_empty())
}

/// Anchor text and resolved href of every link on a page
#[inline]
pub fn links(html: &str, base: &url::Url) -> Vec<(String, url::Url)> {
    let document = Html::parse_document(html);
    document
        .select(&selector("a[href]"))
        .filter_map(|element| {
            let href = element.value().attr("href")?;
            if href.starts_with("mailto:") || href.starts_with("javascript:") || href.starts_with('#')
            {
                return None;
            }
            let url = base.join(href).ok()?;
            Some((element_text(element), url))
        })
        .collect()
}
