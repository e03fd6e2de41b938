//! Highlight session: the single owner of the live highlight.
//!
//! One session per user selection. A new locate supersedes the prior
//! request (no queuing; only the most recent result is ever shown), and
//! marks are always cleared before new ones are applied, so two results
//! can never be live on the same document view.

use crate::cascade::{self, CascadeConfig, TierSet};
use crate::textlayer::TextLayerPage;
use crate::tree::{AnchorConfig, RenderedTree};
use spanmark_core::{Chunk, LocateOutcome, MatchCandidate, Span};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Locating,
    Matched,
    Unmatched,
}

/// A logical view of one source document in exactly one representation.
/// Switching representations invalidates any previous match.
#[derive(Debug, Clone)]
pub enum DocumentView {
    /// One page's extracted text, plus the page's offset in the
    /// whole-document coordinate space (chunk offsets are document-wide).
    PlainText { text: String, base: usize },
    Rendered(RenderedTree),
    TextLayer(TextLayerPage),
}

impl DocumentView {
    pub fn plain(text: impl Into<String>, base: usize) -> Self {
        DocumentView::PlainText {
            text: text.into(),
            base,
        }
    }

    pub fn clear_marks(&mut self) {
        match self {
            DocumentView::PlainText { .. } => {}
            DocumentView::Rendered(tree) => tree.clear(),
            DocumentView::TextLayer(page) => page.clear(),
        }
    }

    /// True when no fragment/mark remains flagged as highlighted.
    pub fn is_clear(&self) -> bool {
        match self {
            DocumentView::PlainText { .. } => true,
            DocumentView::Rendered(tree) => tree.is_clear(),
            DocumentView::TextLayer(page) => page.is_clear(),
        }
    }
}

/// Process-lifetime state for the current highlight request.
#[derive(Debug, Clone)]
pub struct HighlightSession {
    cascade: CascadeConfig,
    anchors: AnchorConfig,
    state: SessionState,
    chunk: Option<Chunk>,
    last: Option<MatchCandidate>,
}

impl Default for HighlightSession {
    fn default() -> Self {
        Self::new()
    }
}

impl HighlightSession {
    pub fn new() -> Self {
        Self::with_config(CascadeConfig::default(), AnchorConfig::default())
    }

    pub fn with_config(cascade: CascadeConfig, anchors: AnchorConfig) -> Self {
        Self {
            cascade,
            anchors,
            state: SessionState::Idle,
            chunk: None,
            last: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn current_chunk(&self) -> Option<&Chunk> {
        self.chunk.as_ref()
    }

    /// The last winning candidate, for diagnostics and tests.
    pub fn last_match(&self) -> Option<&MatchCandidate> {
        self.last.as_ref()
    }

    /// Locate `chunk` in `view`, superseding any prior request.
    ///
    /// Synchronous: matching over one document/page is CPU-bound and
    /// short, so `locating` lasts exactly one pass.
    pub fn locate(&mut self, chunk: &Chunk, view: &mut DocumentView) -> LocateOutcome {
        self.state = SessionState::Locating;
        view.clear_marks();
        self.chunk = Some(chunk.clone());

        let candidate = match view {
            DocumentView::PlainText { text, base } => {
                let hint = chunk.parsed_span().and_then(|s| {
                    (s.start >= *base).then(|| Span::new(s.start - *base, s.end - *base))
                });
                cascade::locate(&chunk.text, hint, text, TierSet::all(), &self.cascade)
            }
            DocumentView::Rendered(tree) => {
                let c = tree.locate(chunk, &self.cascade, &self.anchors);
                if let Some(c) = &c {
                    tree.apply(c);
                }
                c
            }
            DocumentView::TextLayer(page) => {
                let c = page.locate(chunk, &self.cascade);
                if let Some(c) = &c {
                    page.apply(c);
                }
                c
            }
        };

        match candidate {
            Some(c) => {
                tracing::debug!(method = %c.method, start = c.span.start, end = c.span.end, "matched");
                self.state = SessionState::Matched;
                let outcome = LocateOutcome {
                    matched: true,
                    method: Some(c.method),
                    span: Some(c.span),
                };
                self.last = Some(c);
                outcome
            }
            None => {
                tracing::debug!("unmatched");
                self.state = SessionState::Unmatched;
                self.last = None;
                LocateOutcome::unmatched()
            }
        }
    }

    /// Explicit clear: removes marks from the view and returns to idle.
    /// Callers invoke this before switching documents or pages.
    pub fn clear(&mut self, view: &mut DocumentView) {
        view.clear_marks();
        self.state = SessionState::Idle;
        self.chunk = None;
        self.last = None;
        tracing::debug!("session cleared");
    }
}
