//! Flat-text synthesis over discrete text fragments.
//!
//! A rendered tree or text layer exposes its visible text as many small
//! pieces. Matching wants one string, highlighting wants fragments; the
//! `FragmentIndex` is the bridge: it concatenates fragment text (plus one
//! separator character each) into a flat string while recording every
//! fragment's `{start, end}` in that string. Rebuilt whenever the
//! underlying document changes; never mutated in place.

use crate::cascade::char_count;
use html_scraper::Node;
use spanmark_core::Span;

/// One leaf text unit, mapped to a sub-range of the flat text.
#[derive(Debug, Clone)]
pub struct Fragment {
    /// Visible text (internal whitespace collapsed for tree fragments).
    pub text: String,
    /// Char offsets into the synthesized flat text.
    pub flat: Span,
    /// Byte range in the raw markup, when the build phase could locate it.
    pub raw: Option<std::ops::Range<usize>>,
    /// True when `raw` maps 1:1 onto `text`, so sub-range wrapping inside
    /// the fragment is structurally safe. False forces whole-fragment
    /// wrapping (entity-decoded or whitespace-collapsed source text).
    pub wrap_safe: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FragmentIndex {
    flat: String,
    fragments: Vec<Fragment>,
}

const SEPARATOR: char = '\n';

fn in_skipped_subtree(node: &ego_tree::NodeRef<'_, Node>) -> bool {
    node.ancestors().any(|a| match a.value() {
        Node::Element(el) => matches!(
            el.name(),
            "script" | "style" | "head" | "noscript" | "template"
        ),
        _ => false,
    })
}

impl FragmentIndex {
    /// Build from pre-split fragment texts (text-layer pages). Fragment
    /// order is layout order; texts are kept verbatim.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut flat = String::new();
        let mut fragments = Vec::with_capacity(texts.len());
        let mut cur = 0usize;
        for t in texts {
            let text = t.as_ref().to_string();
            let chars = char_count(&text);
            flat.push_str(&text);
            flat.push(SEPARATOR);
            fragments.push(Fragment {
                flat: Span::new(cur, cur + chars),
                raw: None,
                wrap_safe: true,
                text,
            });
            cur += chars + 1;
        }
        Self { flat, fragments }
    }

    /// Build from raw markup: walk the parsed tree's visible text nodes
    /// once, collapsing each node's whitespace, and map every fragment
    /// back to a byte range of the raw markup by monotonic forward search
    /// (exact text, then whitespace-normalized, then a first-words
    /// prefix). Fragments the search cannot place still participate in
    /// matching; they just cannot be wrapped in the source rendering.
    pub fn from_html(html: &str) -> Self {
        let doc = html_scraper::Html::parse_document(html);
        let mut flat = String::new();
        let mut fragments = Vec::new();
        let mut cur = 0usize;
        let mut cursor = 0usize; // byte cursor into the raw markup

        for node in doc.tree.root().descendants() {
            let Node::Text(t) = node.value() else {
                continue;
            };
            let raw_text: &str = t;
            if raw_text.trim().is_empty() || in_skipped_subtree(&node) {
                continue;
            }
            let cleaned = crate::normalize::normalize_whitespace(raw_text);

            let mut raw = None;
            let mut wrap_safe = false;
            let trimmed = raw_text.trim();
            let prefix_words = cleaned.split(' ').take(3).collect::<Vec<_>>().join(" ");
            for needle in [trimmed, cleaned.as_str(), prefix_words.as_str()] {
                if needle.is_empty() {
                    continue;
                }
                if let Some(rel) = html[cursor..].find(needle) {
                    let start = cursor + rel;
                    raw = Some(start..start + needle.len());
                    wrap_safe = needle == cleaned;
                    cursor = start + needle.len();
                    break;
                }
            }

            let chars = char_count(&cleaned);
            fragments.push(Fragment {
                flat: Span::new(cur, cur + chars),
                raw,
                wrap_safe,
                text: cleaned.clone(),
            });
            flat.push_str(&cleaned);
            flat.push(SEPARATOR);
            cur += chars + 1;
        }

        Self { flat, fragments }
    }

    pub fn flat(&self) -> &str {
        &self.flat
    }

    pub fn fragments(&self) -> &[Fragment] {
        &self.fragments
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Indices of fragments whose flat range intersects `span`.
    pub fn overlapping(&self, span: &Span) -> Vec<usize> {
        self.fragments
            .iter()
            .enumerate()
            .filter(|(_, f)| f.flat.overlaps(span))
            .map(|(i, _)| i)
            .collect()
    }

    /// Fragment containing `pos`, else the nearest one at or after it,
    /// else the last fragment. `None` only when there are no fragments.
    pub fn fragment_near(&self, pos: usize) -> Option<usize> {
        if let Some(i) = self.fragments.iter().position(|f| f.flat.contains(pos)) {
            return Some(i);
        }
        if let Some(i) = self.fragments.iter().position(|f| f.flat.start > pos) {
            return Some(i);
        }
        (!self.fragments.is_empty()).then(|| self.fragments.len() - 1)
    }
}
