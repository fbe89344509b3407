use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

/// Structural counts and layout flags for a document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DocumentStructure {
    /// Declared page count, 0 when unknown
    pub pages: u32,
    /// Sections or slides found in the container, 0 when unknown
    pub sections: usize,
    pub paragraphs: usize,
    pub lines: usize,
    pub words: usize,
    pub characters: usize,
    pub has_header: bool,
    pub has_footer: bool,
    pub has_toc: bool,
    pub has_index: bool,
    /// Lines that look like numbered headings
    pub numbered_headings: usize,
}

static HEADER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)머리말|머리글|\bheader\b").expect("header pattern"));
static FOOTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)꼬리말|바닥글|\bfooter\b").expect("footer pattern"));
static TOC_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:목\s*차|차\s*례|table of contents|contents)\s*$").expect("toc pattern")
});
static INDEX_TITLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?im)^\s*(?:색\s*인|찾아보기|index)\s*$").expect("index pattern")
});
/// `Introduction ........ 3`
static LEADER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^.+(?:\.{3,}|·{3,}|…+)\s*\d+\s*$").expect("leader pattern"));
/// `1.`, `1.2.3`, `IV.`, `가.`, `제3장`
static NUMBERED_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:\d+(?:\.\d+)*\.?|[IVX]+\.|[가-하]\.|제\s*\d+\s*[장절조편])\s+\S")
        .expect("heading pattern")
});

/// Leader lines needed before a table of contents is assumed.
const MIN_LEADER_LINES: usize = 3;

/// Derives [`DocumentStructure`] from decoded text.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructureAnalyzer;

impl StructureAnalyzer {
    pub fn analyze(&self, text: &str, pages: Option<u32>, sections: usize) -> DocumentStructure {
        let lines: Vec<&str> = text.lines().collect();
        let has_toc = TOC_TITLE.is_match(text) || LEADER_LINE.find_iter(text).count() >= MIN_LEADER_LINES;

        DocumentStructure {
            pages: pages.unwrap_or(0),
            sections,
            paragraphs: lines.iter().filter(|l| !l.trim().is_empty()).count(),
            lines: lines.len(),
            words: text.split_whitespace().count(),
            characters: text.chars().filter(|c| !c.is_whitespace()).count(),
            has_header: HEADER.is_match(text),
            has_footer: FOOTER.is_match(text),
            has_toc,
            has_index: INDEX_TITLE.is_match(text),
            numbered_headings: NUMBERED_HEADING.find_iter(text).count(),
        }
    }
}
