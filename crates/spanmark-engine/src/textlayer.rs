//! Paginated text-layer adapter.
//!
//! One page of a paginated renderer's text layer: fragments in layout
//! order, concatenated into a flat string per page. Only the exact and
//! prefix tiers run here: position indices are not meaningful across
//! pagination, and fuzzy tiers on a single arbitrary page would mislead.
//! Marking is position-only (fragment indices), and marks from a previous
//! page must never survive into the next scan.

use crate::cascade::{self, CascadeConfig, TierSet};
use crate::fragments::FragmentIndex;
use spanmark_core::{Chunk, MatchCandidate, Span};

#[derive(Debug, Clone)]
pub struct TextLayerPage {
    index: FragmentIndex,
    marked: Vec<usize>,
    scroll_target: Option<usize>,
}

impl TextLayerPage {
    /// Build from one page's fragments, in layout order.
    pub fn from_fragments<S: AsRef<str>>(texts: &[S]) -> Self {
        Self {
            index: FragmentIndex::from_texts(texts),
            marked: Vec::new(),
            scroll_target: None,
        }
    }

    pub fn flat_text(&self) -> &str {
        self.index.flat()
    }

    pub fn fragment_index(&self) -> &FragmentIndex {
        &self.index
    }

    /// Indices of fragments currently marked as highlighted.
    pub fn marked(&self) -> &[usize] {
        &self.marked
    }

    pub fn scroll_target(&self) -> Option<usize> {
        self.scroll_target
    }

    pub fn is_clear(&self) -> bool {
        self.marked.is_empty() && self.scroll_target.is_none()
    }

    /// Exact/prefix matching against this page's flat text.
    pub fn locate(&self, chunk: &Chunk, cfg: &CascadeConfig) -> Option<MatchCandidate> {
        cascade::locate(
            &chunk.text,
            None,
            self.index.flat(),
            TierSet::exact_only(),
            cfg,
        )
    }

    /// Mark fragments whose range intersects the winning span. Clears
    /// first so a previous page's or request's marks never persist.
    pub fn apply(&mut self, candidate: &MatchCandidate) {
        self.clear();
        let mut marked: Vec<usize> = Vec::new();
        for seg in &candidate.segments {
            marked.extend(self.index.overlapping(seg));
        }
        if marked.is_empty() {
            if let Some(i) = self.index.fragment_near(candidate.span.start) {
                marked.push(i);
            }
        }
        marked.sort_unstable();
        marked.dedup();
        self.scroll_target = marked.first().copied();
        self.marked = marked;
        tracing::debug!(marked = self.marked.len(), scroll = ?self.scroll_target, "page marks applied");
    }

    pub fn clear(&mut self) {
        self.marked.clear();
        self.scroll_target = None;
    }

    /// Flat span of a marked fragment, for callers that scroll by range.
    pub fn fragment_span(&self, index: usize) -> Option<Span> {
        self.index.fragments().get(index).map(|f| f.flat)
    }
}
