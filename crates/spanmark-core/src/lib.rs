use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("content load failed: {0}")]
    Content(String),
    #[error("unknown document: {0}")]
    UnknownDocument(String),
    #[error("page out of range: {0}")]
    PageOutOfRange(usize),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Page-break marker used by parsed-text content sources.
///
/// Form feed is what PDF text extractors emit between pages; plain-text
/// parsers that want pagination insert the same marker.
pub const PAGE_BREAK: char = '\u{000C}';

/// Split whole-document parsed text into pages on the page-break marker.
pub fn split_pages(text: &str) -> Vec<String> {
    text.split(PAGE_BREAK).map(|p| p.to_string()).collect()
}

/// A half-open `[start, end)` range of character offsets into a flat text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, pos: usize) -> bool {
        self.start <= pos && pos < self.end
    }

    /// Half-open range overlap.
    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Smallest span covering both.
    pub fn cover(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

/// The cascade tier that produced a match. Earlier variants are strictly
/// preferred when they succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    ExactPosition,
    ExactText,
    Prefix,
    WordOverlay,
    FuzzyRegion,
    DefaultHead,
}

impl MatchMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchMethod::ExactPosition => "exact-position",
            MatchMethod::ExactText => "exact-text",
            MatchMethod::Prefix => "prefix",
            MatchMethod::WordOverlay => "word-overlay",
            MatchMethod::FuzzyRegion => "fuzzy-region",
            MatchMethod::DefaultHead => "default-head",
        }
    }
}

impl std::fmt::Display for MatchMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate span in flat-text coordinates.
///
/// Transient: produced and consumed within one locate pass.
///
/// `segments` holds the individual highlight ranges for multi-range tiers
/// (word marks, merged sentence regions); contiguous tiers store a single
/// segment equal to `span`. `span` is always the covering range.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchCandidate {
    pub span: Span,
    pub segments: Vec<Span>,
    pub method: MatchMethod,
    pub score: f64,
}

impl MatchCandidate {
    pub fn contiguous(span: Span, method: MatchMethod, score: f64) -> Self {
        Self {
            span,
            segments: vec![span],
            method,
            score,
        }
    }
}

/// A unit of retrieved text with optional position/context metadata.
///
/// Immutable once produced by the upstream pipeline; the engine never
/// mutates a chunk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    /// Character offsets into the parsed document text, when known.
    #[serde(default)]
    pub start_idx: Option<usize>,
    #[serde(default)]
    pub end_idx: Option<usize>,
    /// 1-based page number, when the upstream pipeline recorded one.
    #[serde(default)]
    pub page_number: Option<usize>,
    /// Character offsets into the rendered-tree flat text, when known.
    /// Accepts the upstream store's `html_start`/`html_end` column names.
    #[serde(default, alias = "html_start")]
    pub rendered_start: Option<usize>,
    #[serde(default, alias = "html_end")]
    pub rendered_end: Option<usize>,
    /// Neighbor-chunk text, used only to disambiguate repeated matches.
    #[serde(default)]
    pub prev_anchor: Option<String>,
    #[serde(default)]
    pub next_anchor: Option<String>,
}

impl Chunk {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    /// Offsets into the parsed document text, when both ends are present.
    pub fn parsed_span(&self) -> Option<Span> {
        match (self.start_idx, self.end_idx) {
            (Some(s), Some(e)) if e > s => Some(Span::new(s, e)),
            _ => None,
        }
    }

    /// Offsets into the rendered-tree flat text, when both ends are present.
    pub fn rendered_span(&self) -> Option<Span> {
        match (self.rendered_start, self.rendered_end) {
            (Some(s), Some(e)) if e > s => Some(Span::new(s, e)),
            _ => None,
        }
    }
}

/// Presentation-boundary result of one locate request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocateOutcome {
    pub matched: bool,
    /// Tier name (`"exact-text"`, …) when matched.
    pub method: Option<MatchMethod>,
    pub span: Option<Span>,
}

impl LocateOutcome {
    pub fn unmatched() -> Self {
        Self {
            matched: false,
            method: None,
            span: None,
        }
    }
}

/// Read-only, lazily fetched document content (collaborator boundary).
///
/// Implementations live in the surrounding application (storage, query API,
/// renderer plumbing); the engine only awaits them before matching.
#[async_trait::async_trait]
pub trait ContentSource: Send + Sync {
    /// Parsed plain text, one entry per page (split on [`PAGE_BREAK`]).
    async fn parsed_pages(&self, doc_id: &str) -> Result<Vec<String>>;
    /// Raw rendered markup for the document, when a rendered view exists.
    async fn rendered_html(&self, doc_id: &str) -> Result<String>;
    /// Text-layer fragments per page, in layout order.
    async fn text_layer_pages(&self, doc_id: &str) -> Result<Vec<Vec<String>>>;
}
