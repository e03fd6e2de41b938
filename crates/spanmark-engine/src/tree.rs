//! Rendered-tree adapter: matching against a document whose visible text
//! is split across many markup fragments.
//!
//! The adapter owns the flat-text index for one rendered document, the
//! anchor-based disambiguation among repeated occurrences, and the only
//! shared mutable state in the engine: the applied highlight marks. Marks
//! are an explicit apply/clear pair: clear fully restores the unmarked
//! rendering before any new apply, so stale wrapper markup can never
//! accumulate across repeated locate calls.

use crate::cascade::{self, char_count, char_range_to_bytes, char_slice, CascadeConfig, TierSet};
use crate::fragments::FragmentIndex;
use crate::normalize::{distinctive_words, significant_words, tokenize, tokenize_with_offsets};
use serde::Serialize;
use spanmark_core::{Chunk, MatchCandidate, MatchMethod, Span};
use std::collections::BTreeSet;

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

/// Knobs for anchor disambiguation. Like the cascade constants these are
/// defaults, not contracts.
#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Distinctive chunk words used to seed candidate positions.
    pub top_words: usize,
    /// Candidate positions within this many chars merge into one.
    pub merge_gap: usize,
    /// Radius of the chunk-word density window around a candidate.
    pub density_radius: usize,
    /// How far before/after a candidate the anchor context reaches.
    pub context_radius: usize,
    /// Acceptance bar: a candidate needs this much density…
    pub min_density: f64,
    /// …or this much context score.
    pub min_context: f64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            top_words: 5,
            merge_gap: 1_000,
            density_radius: 1_000,
            context_radius: 1_500,
            min_density: 2.0,
            min_context: 2.0,
        }
    }
}

impl AnchorConfig {
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            top_words: env_usize("SPANMARK_ANCHOR_TOP_WORDS", d.top_words).clamp(1, 20),
            merge_gap: env_usize("SPANMARK_ANCHOR_MERGE_GAP", d.merge_gap).clamp(0, 20_000),
            density_radius: env_usize("SPANMARK_ANCHOR_DENSITY_RADIUS", d.density_radius)
                .clamp(100, 20_000),
            context_radius: env_usize("SPANMARK_ANCHOR_CONTEXT_RADIUS", d.context_radius)
                .clamp(100, 20_000),
            min_density: d.min_density,
            min_context: d.min_context,
        }
    }
}

/// A highlight mark on one fragment: char range within the fragment text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FragmentMark {
    pub fragment: usize,
    pub range: Span,
}

/// One rendered document, its fragment index, and the live highlight.
#[derive(Debug, Clone)]
pub struct RenderedTree {
    html: String,
    index: FragmentIndex,
    marks: Vec<FragmentMark>,
    scroll_target: Option<usize>,
}

fn has_text(s: Option<&str>) -> bool {
    s.map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Occurrences of any anchor word in a window, scored as presence (1.0 per
/// distinct word) plus a small proximity bonus so nearer context wins ties
/// between repeated occurrences of the same text.
fn directional_context(words: &BTreeSet<String>, window: &str, from_end: bool, radius: usize) -> f64 {
    if words.is_empty() || window.is_empty() {
        return 0.0;
    }
    let tokens = tokenize_with_offsets(window);
    let window_chars = char_count(window);
    let mut score = 0.0;
    for w in words {
        // Nearest occurrence to the reference point: the window end for
        // preceding context, the window start for following context.
        let best = tokens
            .iter()
            .filter(|(t, _)| t == w)
            .map(|(_, off)| if from_end { window_chars - off } else { *off })
            .min();
        if let Some(d) = best {
            let proximity = 1.0 - (d.min(radius) as f64 / radius.max(1) as f64);
            score += 1.0 + 0.25 * proximity;
        }
    }
    score
}

struct ContextScorer<'a> {
    flat: &'a str,
    flat_chars: usize,
    chunk_words: std::collections::BTreeMap<String, usize>,
    prev_words: BTreeSet<String>,
    next_words: BTreeSet<String>,
}

impl<'a> ContextScorer<'a> {
    fn new(chunk: &Chunk, flat: &'a str, cfg: &CascadeConfig) -> Self {
        Self {
            flat,
            flat_chars: char_count(flat),
            chunk_words: significant_words(&chunk.text, cfg.min_word_len),
            prev_words: chunk
                .prev_anchor
                .as_deref()
                .map(distinctive_words)
                .unwrap_or_default(),
            next_words: chunk
                .next_anchor
                .as_deref()
                .map(distinctive_words)
                .unwrap_or_default(),
        }
    }

    /// Chunk-word occurrence count in a ±radius window around the span.
    fn density(&self, span: Span, radius: usize) -> f64 {
        let lo = span.start.saturating_sub(radius);
        let hi = (span.end + radius).min(self.flat_chars);
        let window = char_slice(self.flat, lo, hi);
        tokenize(window)
            .iter()
            .filter(|t| self.chunk_words.contains_key(*t))
            .count() as f64
    }

    /// prev-anchor words found before the span plus next-anchor words
    /// found after it.
    fn context(&self, span: Span, radius: usize) -> f64 {
        let before = char_slice(self.flat, span.start.saturating_sub(radius), span.start);
        let after = char_slice(self.flat, span.end, (span.end + radius).min(self.flat_chars));
        directional_context(&self.prev_words, before, true, radius)
            + directional_context(&self.next_words, after, false, radius)
    }
}

impl RenderedTree {
    pub fn from_html(html: &str) -> Self {
        Self {
            html: html.to_string(),
            index: FragmentIndex::from_html(html),
            marks: Vec::new(),
            scroll_target: None,
        }
    }

    pub fn flat_text(&self) -> &str {
        self.index.flat()
    }

    pub fn fragment_index(&self) -> &FragmentIndex {
        &self.index
    }

    pub fn marks(&self) -> &[FragmentMark] {
        &self.marks
    }

    pub fn scroll_target(&self) -> Option<usize> {
        self.scroll_target
    }

    pub fn is_clear(&self) -> bool {
        self.marks.is_empty() && self.scroll_target.is_none()
    }

    /// Find the chunk in this tree's flat text.
    ///
    /// Repeated text is the rendered tree's defining hazard, so the exact
    /// tiers enumerate every occurrence and let the anchors choose among
    /// them, and the word/region tiers run inside an accepted anchor
    /// window before falling back to the whole flat text.
    pub fn locate(
        &self,
        chunk: &Chunk,
        cfg: &CascadeConfig,
        anchors: &AnchorConfig,
    ) -> Option<MatchCandidate> {
        let flat = self.index.flat();
        if chunk.text.trim().is_empty() || flat.trim().is_empty() {
            return None;
        }
        let flat_chars = char_count(flat);

        // Tier 1: rendered-tree offsets, when valid in this flat text.
        if let Some(hint) = chunk.rendered_span() {
            if hint.end <= flat_chars {
                return Some(MatchCandidate::contiguous(
                    hint,
                    MatchMethod::ExactPosition,
                    f64::INFINITY,
                ));
            }
        }

        let scorer = ContextScorer::new(chunk, flat, cfg);
        let has_anchors = has_text(chunk.prev_anchor.as_deref()) || has_text(chunk.next_anchor.as_deref());

        // Tiers 2–3: every occurrence, anchors pick the winner.
        for (needle, method) in [
            (chunk.text.as_str(), MatchMethod::ExactText),
            (
                char_slice(&chunk.text, 0, cfg.prefix_chars),
                MatchMethod::Prefix,
            ),
        ] {
            if method == MatchMethod::Prefix && char_count(&chunk.text) <= cfg.prefix_chars {
                break;
            }
            let occurrences = cascade::exact_occurrences(needle, flat);
            if occurrences.is_empty() {
                continue;
            }
            let span = if occurrences.len() > 1 && has_anchors {
                self.pick_occurrence(&occurrences, &scorer, anchors)
            } else {
                occurrences[0]
            };
            tracing::debug!(
                method = %method,
                start = span.start,
                occurrences = occurrences.len(),
                "tree exact match"
            );
            return Some(MatchCandidate::contiguous(span, method, span.len() as f64));
        }

        // Tiers 4–5 run inside the accepted anchor window first, so a
        // repeated-word chunk lands near its anchored context rather than
        // at the first textual cluster.
        if let Some(pos) = self.anchor_candidate(chunk, &scorer, anchors) {
            let lo = pos.saturating_sub(anchors.density_radius);
            let hi = (pos + anchors.density_radius).min(flat_chars);
            let window = char_slice(flat, lo, hi);
            if let Some(c) =
                cascade::locate(&chunk.text, None, window, TierSet::saturation_only(), cfg)
            {
                tracing::debug!(window_start = lo, method = %c.method, "anchor window match");
                return Some(offset_candidate(c, lo));
            }
        }
        let tail = TierSet {
            position: false,
            exact_text: false,
            prefix: false,
            word_overlay: true,
            fuzzy_region: true,
            default_head: true,
        };
        cascade::locate(&chunk.text, None, flat, tail, cfg)
    }

    /// Rank repeated exact occurrences: context first, then chunk-word
    /// density, then earliest.
    fn pick_occurrence(
        &self,
        occurrences: &[Span],
        scorer: &ContextScorer<'_>,
        anchors: &AnchorConfig,
    ) -> Span {
        let mut best = occurrences[0];
        let mut best_key = (f64::MIN, f64::MIN);
        for &occ in occurrences {
            let key = (
                scorer.context(occ, anchors.context_radius),
                scorer.density(occ, anchors.density_radius),
            );
            if key.0 > best_key.0 || (key.0 == best_key.0 && key.1 > best_key.1) {
                best = occ;
                best_key = key;
            }
        }
        best
    }

    /// Candidate anchor positions from the chunk's top distinctive words:
    /// merge nearby occurrences, score by density and anchor context, and
    /// accept the top candidate only past the minimum bar.
    fn anchor_candidate(
        &self,
        chunk: &Chunk,
        scorer: &ContextScorer<'_>,
        anchors: &AnchorConfig,
    ) -> Option<usize> {
        let flat = self.index.flat();
        let mut top: Vec<String> = distinctive_words(&chunk.text).into_iter().collect();
        top.sort_by(|a, b| {
            b.chars()
                .count()
                .cmp(&a.chars().count())
                .then_with(|| a.cmp(b))
        });
        top.truncate(anchors.top_words);
        if top.is_empty() {
            return None;
        }

        let word_set: BTreeSet<&str> = top.iter().map(|w| w.as_str()).collect();
        let mut positions: Vec<usize> = tokenize_with_offsets(flat)
            .into_iter()
            .filter(|(t, _)| word_set.contains(t.as_str()))
            .map(|(_, off)| off)
            .collect();
        positions.sort_unstable();
        if positions.is_empty() {
            return None;
        }

        let mut candidates: Vec<usize> = Vec::new();
        for pos in positions {
            match candidates.last() {
                Some(&last) if pos.saturating_sub(last) <= anchors.merge_gap => {}
                _ => candidates.push(pos),
            }
        }

        let mut ranked: Vec<(f64, f64, usize)> = candidates
            .into_iter()
            .map(|pos| {
                let at = Span::new(pos, pos);
                (
                    scorer.context(at, anchors.context_radius),
                    scorer.density(at, anchors.density_radius),
                    pos,
                )
            })
            .collect();
        ranked.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
                .then_with(|| a.2.cmp(&b.2))
        });

        let (context, density, pos) = ranked.into_iter().next()?;
        (density >= anchors.min_density || context >= anchors.min_context).then_some(pos)
    }

    /// Mark the fragments overlapping the winning segments (never the
    /// anchor context) and set the scroll target. Clears first: only one
    /// locate result may be live.
    pub fn apply(&mut self, candidate: &MatchCandidate) {
        self.clear();
        let mut marks: Vec<FragmentMark> = Vec::new();
        for seg in &candidate.segments {
            for i in self.index.overlapping(seg) {
                let f = &self.index.fragments()[i];
                let start = seg.start.max(f.flat.start) - f.flat.start;
                let end = seg.end.min(f.flat.end) - f.flat.start;
                if end > start {
                    marks.push(FragmentMark {
                        fragment: i,
                        range: Span::new(start, end),
                    });
                }
            }
        }

        if marks.is_empty() {
            // Fuzzy single-fragment fallback: nothing overlapped (the span
            // landed on separators or mapping failed), so mark the fragment
            // nearest the match start and let the user land somewhere.
            if let Some(i) = self.index.fragment_near(candidate.span.start) {
                let len = char_count(&self.index.fragments()[i].text);
                if len > 0 {
                    marks.push(FragmentMark {
                        fragment: i,
                        range: Span::new(0, len),
                    });
                }
            }
        }

        marks.sort_by(|a, b| {
            a.fragment
                .cmp(&b.fragment)
                .then_with(|| a.range.start.cmp(&b.range.start))
        });
        marks.dedup();
        self.scroll_target = marks.first().map(|m| m.fragment);
        self.marks = marks;
        tracing::debug!(marks = self.marks.len(), scroll = ?self.scroll_target, "marks applied");
    }

    /// Remove all marks, restoring the unmarked rendering.
    pub fn clear(&mut self) {
        self.marks.clear();
        self.scroll_target = None;
    }

    /// The raw markup with `<mark>` wrappers around the marked fragment
    /// ranges. Sub-range wrapping happens only where the fragment's raw
    /// bytes map 1:1 onto its visible text; otherwise the whole fragment
    /// is wrapped (the structural degradation path). With no marks this
    /// returns the original markup byte-for-byte.
    pub fn highlighted_html(&self) -> String {
        let mut insertions: Vec<(usize, usize)> = Vec::new();
        let mut i = 0usize;
        while i < self.marks.len() {
            let frag_idx = self.marks[i].fragment;
            let mut local: Vec<Span> = Vec::new();
            while i < self.marks.len() && self.marks[i].fragment == frag_idx {
                local.push(self.marks[i].range);
                i += 1;
            }
            let f = &self.index.fragments()[frag_idx];
            let Some(raw) = f.raw.clone() else {
                continue;
            };
            if f.wrap_safe {
                for r in local {
                    if let Some((b0, b1)) = char_range_to_bytes(&f.text, r.start, r.end) {
                        if b1 > b0 {
                            insertions.push((raw.start + b0, raw.start + b1));
                        }
                    }
                }
            } else {
                insertions.push((raw.start, raw.end));
            }
        }

        insertions.sort_unstable();
        let mut out = String::with_capacity(self.html.len() + insertions.len() * 14);
        let mut prev = 0usize;
        for (s, e) in insertions {
            if s < prev || e <= s || e > self.html.len() {
                continue;
            }
            out.push_str(&self.html[prev..s]);
            out.push_str("<mark>");
            out.push_str(&self.html[s..e]);
            out.push_str("</mark>");
            prev = e;
        }
        out.push_str(&self.html[prev..]);
        out
    }
}

fn offset_candidate(mut c: MatchCandidate, base: usize) -> MatchCandidate {
    c.span = Span::new(c.span.start + base, c.span.end + base);
    for seg in &mut c.segments {
        *seg = Span::new(seg.start + base, seg.end + base);
    }
    c
}
