//! The ordered match cascade.
//!
//! One representation-agnostic module operating on flat strings; the tree
//! and text-layer adapters are thin translation layers around it. Tiers are
//! tried in order and the first tier that produces a result wins; later
//! tiers are fallbacks for when an earlier, more precise tier fails.
//!
//! All public offsets are character offsets into the flat text. Byte
//! offsets from the regex engine are converted at the tier boundary.

use crate::normalize::{self, significant_words, split_sentences};
use spanmark_core::{MatchCandidate, MatchMethod, Span};

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn env_f64(key: &str, default: f64) -> f64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<f64>().ok())
        .unwrap_or(default)
}

/// Scoring and sizing knobs for the cascade.
///
/// The values are empirically chosen defaults, not contractual constants;
/// `from_env` lets deployments tune them without a rebuild.
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    /// Minimum significant-word length (2–4).
    pub min_word_len: usize,
    /// Chunk length above which the prefix tier applies, and the prefix size.
    pub prefix_chars: usize,
    /// Longest informative words marked by the word-overlay tier.
    pub overlay_max_words: usize,
    /// Words at or above this length get substring partial credit.
    pub long_word_len: usize,
    /// Cap on the per-word length weight (`len / 4`, capped).
    pub word_weight_cap: f64,
    /// Fraction of the chunk's word count a region must cover.
    pub coverage_ratio: f64,
    /// Top sentences kept before region merging.
    pub sentence_top_k: usize,
    /// Sentences within this many chars merge into one region.
    pub region_merge_gap: usize,
    /// Fallback window size over raw text.
    pub window_chars: usize,
    /// Fallback window stride.
    pub window_stride: usize,
    /// Length of the last-resort head highlight.
    pub default_head_chars: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            min_word_len: 3,
            prefix_chars: 100,
            overlay_max_words: 25,
            long_word_len: 5,
            word_weight_cap: 3.0,
            coverage_ratio: 0.05,
            sentence_top_k: 5,
            region_merge_gap: 150,
            window_chars: 400,
            window_stride: 100,
            default_head_chars: 500,
        }
    }
}

impl CascadeConfig {
    /// Defaults with clamped `SPANMARK_*` environment overrides.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            min_word_len: env_usize("SPANMARK_MIN_WORD_LEN", d.min_word_len).clamp(2, 4),
            prefix_chars: env_usize("SPANMARK_PREFIX_CHARS", d.prefix_chars).clamp(20, 1_000),
            overlay_max_words: env_usize("SPANMARK_OVERLAY_MAX_WORDS", d.overlay_max_words)
                .clamp(1, 200),
            long_word_len: env_usize("SPANMARK_LONG_WORD_LEN", d.long_word_len).clamp(4, 12),
            word_weight_cap: env_f64("SPANMARK_WORD_WEIGHT_CAP", d.word_weight_cap)
                .clamp(1.0, 10.0),
            coverage_ratio: env_f64("SPANMARK_COVERAGE_RATIO", d.coverage_ratio).clamp(0.0, 1.0),
            sentence_top_k: env_usize("SPANMARK_SENTENCE_TOP_K", d.sentence_top_k).clamp(1, 50),
            region_merge_gap: env_usize("SPANMARK_REGION_MERGE_GAP", d.region_merge_gap)
                .clamp(0, 5_000),
            window_chars: env_usize("SPANMARK_WINDOW_CHARS", d.window_chars).clamp(50, 5_000),
            window_stride: env_usize("SPANMARK_WINDOW_STRIDE", d.window_stride).clamp(10, 2_000),
            default_head_chars: env_usize("SPANMARK_DEFAULT_HEAD_CHARS", d.default_head_chars)
                .clamp(50, 5_000),
        }
    }
}

/// Which tiers a caller allows. The text-layer adapter restricts matching
/// to the exact/prefix tiers; everything else runs the full ladder.
#[derive(Debug, Clone, Copy)]
pub struct TierSet {
    pub position: bool,
    pub exact_text: bool,
    pub prefix: bool,
    pub word_overlay: bool,
    pub fuzzy_region: bool,
    pub default_head: bool,
}

impl TierSet {
    pub fn all() -> Self {
        Self {
            position: true,
            exact_text: true,
            prefix: true,
            word_overlay: true,
            fuzzy_region: true,
            default_head: true,
        }
    }

    /// Tiers 2–3 only (per-page text layers: positions are not meaningful
    /// across pagination, and a last-resort head highlight on an arbitrary
    /// page would mislead).
    pub fn exact_only() -> Self {
        Self {
            position: false,
            exact_text: true,
            prefix: true,
            word_overlay: false,
            fuzzy_region: false,
            default_head: false,
        }
    }

    pub fn position_only() -> Self {
        Self {
            position: true,
            exact_text: false,
            prefix: false,
            word_overlay: false,
            fuzzy_region: false,
            default_head: false,
        }
    }

    /// Tiers 4–5 only; the tree adapter runs these separately after anchor
    /// disambiguation has picked a window.
    pub fn saturation_only() -> Self {
        Self {
            position: false,
            exact_text: false,
            prefix: false,
            word_overlay: true,
            fuzzy_region: true,
            default_head: false,
        }
    }
}

pub(crate) fn char_count(s: &str) -> usize {
    s.chars().count()
}

/// Byte range of the char range `[start, end)`; `None` when out of bounds.
pub(crate) fn char_range_to_bytes(s: &str, start: usize, end: usize) -> Option<(usize, usize)> {
    if end < start {
        return None;
    }
    let mut byte_start = None;
    let mut byte_end = None;
    for (n, (b, _)) in s.char_indices().enumerate() {
        if n == start {
            byte_start = Some(b);
        }
        if n == end {
            byte_end = Some(b);
            break;
        }
    }
    let total = char_count(s);
    let byte_start = byte_start.or_else(|| (start == total).then_some(s.len()))?;
    let byte_end = byte_end.or_else(|| (end == total).then_some(s.len()))?;
    Some((byte_start, byte_end))
}

/// Slice by char offsets; empty on out-of-bounds.
pub(crate) fn char_slice(s: &str, start: usize, end: usize) -> &str {
    match char_range_to_bytes(s, start, end) {
        Some((b0, b1)) if b1 >= b0 => &s[b0..b1],
        _ => "",
    }
}

/// Convert byte spans (sorted by start) to char spans in one pass.
fn byte_spans_to_char_spans(s: &str, byte_spans: &[(usize, usize)]) -> Vec<Span> {
    let mut out = Vec::with_capacity(byte_spans.len());
    let mut iter = s.char_indices().enumerate().peekable();
    let total_chars = char_count(s);
    for &(bs, be) in byte_spans {
        let mut start_char = None;
        let mut end_char = None;
        while let Some(&(n, (b, _))) = iter.peek() {
            if start_char.is_none() && b >= bs {
                start_char = Some(n);
            }
            if b >= be {
                end_char = Some(n);
                break;
            }
            iter.next();
        }
        let start_char = start_char.unwrap_or(total_chars);
        let end_char = end_char.unwrap_or(total_chars);
        if end_char > start_char {
            out.push(Span::new(start_char, end_char));
        }
    }
    out
}

/// Literal pattern for the chunk text: escaped, internal whitespace runs
/// match any whitespace, case-insensitive. `None` when the text has no
/// searchable content or the pattern cannot be built (hostile input is a
/// tier failure, not an error).
fn literal_pattern(text: &str) -> Option<regex::Regex> {
    let parts: Vec<String> = text.split_whitespace().map(|w| regex::escape(w)).collect();
    if parts.is_empty() {
        return None;
    }
    let pat = parts.join(r"\s+");
    regex::RegexBuilder::new(&pat)
        .case_insensitive(true)
        .size_limit(1 << 22)
        .build()
        .ok()
}

fn exact_text_match(needle: &str, flat: &str, method: MatchMethod) -> Option<MatchCandidate> {
    let re = literal_pattern(needle)?;
    let m = re.find(flat)?;
    let spans = byte_spans_to_char_spans(flat, &[(m.start(), m.end())]);
    let span = *spans.first()?;
    Some(MatchCandidate::contiguous(
        span,
        method,
        span.len() as f64,
    ))
}

/// Every non-overlapping whitespace-flexible occurrence of `needle`, as
/// char spans. Used by the tree adapter to disambiguate repeated text.
pub(crate) fn exact_occurrences(needle: &str, flat: &str) -> Vec<Span> {
    let Some(re) = literal_pattern(needle) else {
        return Vec::new();
    };
    let byte_spans: Vec<(usize, usize)> = re.find_iter(flat).map(|m| (m.start(), m.end())).collect();
    byte_spans_to_char_spans(flat, &byte_spans)
}

/// Merge sorted spans that overlap or touch within `gap` chars.
fn merge_spans(mut spans: Vec<Span>, gap: usize) -> Vec<Span> {
    spans.sort_by(|a, b| a.start.cmp(&b.start).then(a.end.cmp(&b.end)));
    let mut out: Vec<Span> = Vec::with_capacity(spans.len());
    for s in spans {
        match out.last_mut() {
            Some(last) if s.start <= last.end.saturating_add(gap) => {
                last.end = last.end.max(s.end);
            }
            _ => out.push(s),
        }
    }
    out
}

/// Tier 4: mark every whole-word occurrence of the chunk's longest
/// informative words. Over-highlights by design.
fn word_overlay(chunk_text: &str, flat: &str, cfg: &CascadeConfig) -> Option<MatchCandidate> {
    let words = significant_words(chunk_text, cfg.min_word_len);
    let mut picked: Vec<&str> = words.keys().map(|w| w.as_str()).collect();
    // Longer words first: prefer specific terms over generic ones. The
    // lexicographic tail keeps the pick deterministic.
    picked.sort_by(|a, b| {
        b.chars()
            .count()
            .cmp(&a.chars().count())
            .then_with(|| a.cmp(b))
    });
    picked.truncate(cfg.overlay_max_words);
    if picked.is_empty() {
        return None;
    }

    let alternation = picked
        .iter()
        .map(|w| regex::escape(w))
        .collect::<Vec<_>>()
        .join("|");
    let re = regex::RegexBuilder::new(&format!(r"\b(?:{alternation})\b"))
        .case_insensitive(true)
        .size_limit(1 << 22)
        .build()
        .ok()?;

    let byte_spans: Vec<(usize, usize)> = re.find_iter(flat).map(|m| (m.start(), m.end())).collect();
    if byte_spans.is_empty() {
        return None;
    }
    let mark_count = byte_spans.len();
    let marks = byte_spans_to_char_spans(flat, &byte_spans);
    let segments = merge_spans(marks, 0);
    let span = Span::new(segments.first()?.start, segments.last()?.end);
    Some(MatchCandidate {
        span,
        segments,
        method: MatchMethod::WordOverlay,
        score: mark_count as f64,
    })
}

fn word_weight(word: &str, cfg: &CascadeConfig) -> f64 {
    (word.chars().count() as f64 / 4.0).min(cfg.word_weight_cap)
}

/// Score a candidate text against the chunk's significant words: full
/// weight for containment, half weight for substring containment between
/// long words on either side.
fn score_words(
    chunk_words: &std::collections::BTreeMap<String, usize>,
    candidate_text: &str,
    cfg: &CascadeConfig,
) -> f64 {
    let cand = significant_words(candidate_text, cfg.min_word_len);
    if cand.is_empty() {
        return 0.0;
    }
    let mut score = 0.0;
    for word in chunk_words.keys() {
        let weight = word_weight(word, cfg);
        if cand.contains_key(word) {
            score += weight;
            continue;
        }
        if word.chars().count() >= cfg.long_word_len {
            let partial = cand.keys().any(|c| {
                c.chars().count() >= cfg.long_word_len
                    && (c.contains(word.as_str()) || word.contains(c.as_str()))
            });
            if partial {
                score += weight * 0.5;
            }
        }
    }
    score
}

#[derive(Debug, Clone)]
struct Region {
    span: Span,
    score: f64,
}

fn expand_to_sentence_bounds(chars: &[char], span: Span) -> Span {
    let mut start = span.start.min(chars.len());
    while start > 0 && !normalize::is_sentence_terminator(chars[start - 1]) {
        start -= 1;
    }
    while start < span.start && chars.get(start).is_some_and(|c| c.is_whitespace()) {
        start += 1;
    }
    let mut end = span.end.min(chars.len());
    while end < chars.len() && !normalize::is_sentence_terminator(chars[end]) {
        end += 1;
    }
    if end < chars.len() {
        end += 1; // include the terminator
    }
    Span::new(start, end.max(start + 1))
}

/// Tier 5: sentence-level region scoring, with a fixed-window fallback
/// when no sentence clears the coverage threshold.
fn fuzzy_region(chunk_text: &str, flat: &str, cfg: &CascadeConfig) -> Option<MatchCandidate> {
    let chunk_words = significant_words(chunk_text, cfg.min_word_len);
    if chunk_words.is_empty() {
        return None;
    }
    let chunk_word_count: usize = chunk_words.values().sum();
    let threshold = 1.0_f64.max(chunk_word_count as f64 * cfg.coverage_ratio);

    let sentences = split_sentences(flat);
    let mut scored: Vec<(f64, Span)> = Vec::new();
    for s in &sentences {
        let score = score_words(&chunk_words, &s.text, cfg);
        if score > threshold {
            scored.push((score, Span::new(s.start, s.end)));
        }
    }

    if !scored.is_empty() {
        scored.sort_by(|a, b| {
            b.0.partial_cmp(&a.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.start.cmp(&b.1.start))
        });
        scored.truncate(cfg.sentence_top_k);
        scored.sort_by_key(|(_, span)| span.start);

        let mut regions: Vec<Region> = Vec::new();
        for (score, span) in scored {
            match regions.last_mut() {
                Some(last) if span.start <= last.span.end.saturating_add(cfg.region_merge_gap) => {
                    last.span.end = last.span.end.max(span.end);
                    last.score += score;
                }
                _ => regions.push(Region { span, score }),
            }
        }

        let best = regions
            .iter()
            .max_by(|a, b| {
                a.score
                    .partial_cmp(&b.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| b.span.start.cmp(&a.span.start))
            })?
            .clone();
        let segments: Vec<Span> = regions.iter().map(|r| r.span).collect();
        return Some(MatchCandidate {
            span: best.span,
            segments,
            method: MatchMethod::FuzzyRegion,
            score: best.score,
        });
    }

    // No sentence cleared the threshold: score fixed windows over the raw
    // text and expand the single best one to sentence boundaries.
    let chars: Vec<char> = flat.chars().collect();
    let total = chars.len();
    let mut best: Option<(f64, Span)> = None;
    let mut start = 0usize;
    while start < total {
        let end = (start + cfg.window_chars).min(total);
        let window_text: String = chars[start..end].iter().collect();
        let score = score_words(&chunk_words, &window_text, cfg);
        let better = match &best {
            Some((best_score, _)) => score > *best_score,
            None => score > 0.0,
        };
        if better {
            best = Some((score, Span::new(start, end)));
        }
        if end == total {
            break;
        }
        start += cfg.window_stride;
    }
    let (score, window) = best?;
    if score <= threshold {
        return None;
    }
    let span = expand_to_sentence_bounds(&chars, window);
    Some(MatchCandidate::contiguous(
        span,
        MatchMethod::FuzzyRegion,
        score,
    ))
}

/// Tier 6: highlight the head of the document so the user always gets
/// feedback near the right document rather than nothing at all.
fn default_head(flat_chars: usize, cfg: &CascadeConfig) -> Option<MatchCandidate> {
    if flat_chars == 0 {
        return None;
    }
    Some(MatchCandidate::contiguous(
        Span::new(0, cfg.default_head_chars.min(flat_chars)),
        MatchMethod::DefaultHead,
        0.0,
    ))
}

/// Run the cascade over one flat text.
///
/// `position_hint` is the chunk's recorded span in the *caller's*
/// coordinate space (already translated to offsets into `flat`); it is
/// accepted only when it lies fully in bounds. Empty chunk text or empty
/// flat text short-circuits to no match without running any tier.
pub fn locate(
    chunk_text: &str,
    position_hint: Option<Span>,
    flat: &str,
    tiers: TierSet,
    cfg: &CascadeConfig,
) -> Option<MatchCandidate> {
    if chunk_text.trim().is_empty() || flat.trim().is_empty() {
        return None;
    }
    let flat_chars = char_count(flat);

    if tiers.position {
        if let Some(hint) = position_hint {
            if !hint.is_empty() && hint.end <= flat_chars {
                let c = MatchCandidate::contiguous(hint, MatchMethod::ExactPosition, f64::INFINITY);
                tracing::debug!(start = hint.start, end = hint.end, "position hint accepted");
                return Some(c);
            }
        }
    }

    if tiers.exact_text {
        if let Some(c) = exact_text_match(chunk_text, flat, MatchMethod::ExactText) {
            tracing::debug!(start = c.span.start, end = c.span.end, "exact-text match");
            return Some(c);
        }
    }

    if tiers.prefix && char_count(chunk_text) > cfg.prefix_chars {
        let prefix = char_slice(chunk_text, 0, cfg.prefix_chars);
        if let Some(c) = exact_text_match(prefix, flat, MatchMethod::Prefix) {
            tracing::debug!(start = c.span.start, end = c.span.end, "prefix match");
            return Some(c);
        }
    }

    if tiers.word_overlay {
        if let Some(c) = word_overlay(chunk_text, flat, cfg) {
            tracing::debug!(marks = c.segments.len(), "word-overlay match");
            return Some(c);
        }
    }

    if tiers.fuzzy_region {
        if let Some(c) = fuzzy_region(chunk_text, flat, cfg) {
            tracing::debug!(
                start = c.span.start,
                end = c.span.end,
                score = c.score,
                "fuzzy-region match"
            );
            return Some(c);
        }
    }

    if tiers.default_head {
        return default_head(flat_chars, cfg);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> CascadeConfig {
        CascadeConfig::default()
    }

    #[test]
    fn empty_inputs_short_circuit_before_any_tier() {
        // A valid-looking hint must not be honored for an empty chunk.
        let hint = Some(Span::new(0, 4));
        assert!(locate("", hint, "some text", TierSet::all(), &cfg()).is_none());
        assert!(locate("   ", hint, "some text", TierSet::all(), &cfg()).is_none());
        assert!(locate("chunk", hint, "", TierSet::all(), &cfg()).is_none());
        assert!(locate("chunk", hint, "  \n ", TierSet::all(), &cfg()).is_none());
    }

    #[test]
    fn position_hint_in_bounds_wins_over_everything() {
        let flat = "The quick brown fox jumps over the lazy dog.";
        // The chunk text also occurs verbatim; the hint must still win.
        let c = locate(
            "quick brown fox",
            Some(Span::new(10, 20)),
            flat,
            TierSet::all(),
            &cfg(),
        )
        .unwrap();
        assert_eq!(c.method, MatchMethod::ExactPosition);
        assert_eq!(c.span, Span::new(10, 20));
        assert!(c.score.is_infinite());
    }

    #[test]
    fn position_hint_out_of_bounds_falls_through_to_exact_text() {
        let flat = "The quick brown fox jumps over the lazy dog.";
        let c = locate(
            "quick brown fox",
            Some(Span::new(10, 9_999)),
            flat,
            TierSet::all(),
            &cfg(),
        )
        .unwrap();
        assert_eq!(c.method, MatchMethod::ExactText);
        assert_eq!(char_slice(flat, c.span.start, c.span.end), "quick brown fox");
    }

    #[test]
    fn exact_text_is_whitespace_flexible_and_case_insensitive() {
        let flat = "intro text\nThe  Quick\tBrown\n Fox ends here";
        let c = locate("the quick brown fox", None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::ExactText);
        let got = char_slice(flat, c.span.start, c.span.end);
        assert_eq!(
            crate::normalize::normalize_whitespace(got).to_lowercase(),
            "the quick brown fox"
        );
    }

    #[test]
    fn exact_text_survives_regex_metacharacters_in_chunk() {
        let flat = "price is $4.99 (incl. tax) [sale] today";
        let c = locate("$4.99 (incl. tax) [sale]", None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::ExactText);
        assert_eq!(
            char_slice(flat, c.span.start, c.span.end),
            "$4.99 (incl. tax) [sale]"
        );
    }

    #[test]
    fn first_occurrence_wins_within_exact_tier() {
        let flat = "one target here. later the same target here.";
        let c = locate("target here", None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.span.start, 4);
    }

    #[test]
    fn truncated_chunk_matches_by_prefix() {
        // 150-char chunk whose first 80 chars occur verbatim; the rest was
        // rewritten upstream. With prefix_chars tuned to the truncation
        // point the prefix tier recovers it.
        let head = "Quarterly revenue increased by twelve percent compared to the prior fiscal yea";
        assert_eq!(head.chars().count(), 78);
        let chunk = format!("{head}r but operating margins declined across all three reporting segments overall");
        assert!(chunk.chars().count() >= 150);
        let flat = format!("Preamble. {head}r. Unrelated tail about something else entirely.");
        let tuned = CascadeConfig {
            prefix_chars: 80,
            ..CascadeConfig::default()
        };
        let c = locate(&chunk, None, &flat, TierSet::all(), &tuned).unwrap();
        assert_eq!(c.method, MatchMethod::Prefix);
        assert_eq!(
            crate::normalize::normalize_whitespace(char_slice(&flat, c.span.start, c.span.end)),
            crate::normalize::normalize_whitespace(char_slice(&chunk, 0, 80))
        );
    }

    #[test]
    fn prefix_tier_skipped_for_short_chunks() {
        // Shorter than prefix_chars: tier 3 must not run, so a no-match
        // falls through to word overlay instead.
        let flat = "alpha bravo charlie delta echo";
        let c = locate("charlie foxtrot", None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::WordOverlay);
    }

    #[test]
    fn word_overlay_marks_every_occurrence() {
        let flat = "telemetry first. unrelated. telemetry second. more filler text";
        let c = locate(
            "telemetry pipeline readout",
            None,
            flat,
            TierSet::all(),
            &cfg(),
        )
        .unwrap();
        assert_eq!(c.method, MatchMethod::WordOverlay);
        assert_eq!(c.segments.len(), 2, "both occurrences marked: {c:?}");
        assert_eq!(c.score, 2.0);
        for seg in &c.segments {
            assert_eq!(char_slice(flat, seg.start, seg.end), "telemetry");
        }
        assert_eq!(c.span, Span::new(c.segments[0].start, c.segments[1].end));
    }

    #[test]
    fn word_overlay_requires_whole_words() {
        // "telemetry" inside "telemetrying" must not mark.
        let flat = "pseudotelemetry and telemetrying are different words";
        let c = locate("telemetry", None, flat, TierSet::all(), &cfg());
        // Overlay finds nothing; region scoring gets partial credit via
        // substring containment between long words.
        let c = c.unwrap();
        assert_eq!(c.method, MatchMethod::FuzzyRegion);
    }

    #[test]
    fn fuzzy_region_scores_morphological_variants() {
        let flat = "Filler sentence with nothing relevant at all. \
                    We configure the deployments pipeline in staging. \
                    Another filler sentence closing the document here.";
        let c = locate(
            "configuring deployment pipelines",
            None,
            flat,
            TierSet::all(),
            &cfg(),
        )
        .unwrap();
        assert_eq!(c.method, MatchMethod::FuzzyRegion);
        let got = char_slice(flat, c.span.start, c.span.end);
        assert!(got.contains("deployments pipeline"), "span was {got:?}");
    }

    #[test]
    fn fuzzy_region_merges_nearby_sentences() {
        // Morphological variants only, so the word-overlay tier finds no
        // whole-word occurrence and the region tier gets its turn.
        let flat = "The replication protocol uses vector clocks. \
                    Vector clocks order replication events. \
                    Unrelated filler sentence about gardening today. \
                    Closing filler sentence about weather patterns instead.";
        let c = locate(
            "replications protocols ordering vectoring clocking",
            None,
            flat,
            TierSet::all(),
            &cfg(),
        )
        .unwrap();
        assert_eq!(c.method, MatchMethod::FuzzyRegion);
        // The two adjacent scoring sentences merge into one region that
        // starts at the document head.
        assert_eq!(c.span.start, 0);
        let got = char_slice(flat, c.span.start, c.span.end);
        assert!(got.contains("order replication events"), "span was {got:?}");
    }

    #[test]
    fn below_threshold_falls_to_default_head() {
        // Chunk with 45 informative word tokens, sharing only two short
        // ones ("data", "test") with the document. The 25 longest picked
        // overlay words all miss; the shared pair scores 2.0 against a
        // threshold of 45 * 0.05 = 2.25.
        let mut words: Vec<String> = (0..43).map(|i| format!("zzlongword{i:02}xx")).collect();
        words.push("data".to_string());
        words.push("test".to_string());
        let chunk = words.join(" ");
        let flat = "This document mentions data and test only once. \
                    Everything else in here is entirely unrelated prose.";
        let c = locate(&chunk, None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::DefaultHead);
        assert_eq!(c.span, Span::new(0, char_count(flat).min(500)));
        assert_eq!(c.score, 0.0);
    }

    #[test]
    fn default_head_clamps_to_short_documents() {
        let flat = "tiny document body";
        let chunk = "completely disjoint vocabulary chunk";
        let c = locate(chunk, None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::DefaultHead);
        assert_eq!(c.span, Span::new(0, char_count(flat)));
    }

    #[test]
    fn exact_only_tier_set_never_falls_past_prefix() {
        let flat = "alpha bravo charlie delta echo foxtrot";
        // Words overlap but no exact run: full cascade would overlay,
        // exact-only must report no match.
        assert!(locate(
            "charlie golf hotel",
            None,
            flat,
            TierSet::exact_only(),
            &cfg()
        )
        .is_none());
        // And an exact occurrence still matches.
        let c = locate("bravo charlie", None, flat, TierSet::exact_only(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::ExactText);
    }

    #[test]
    fn monotonic_fallback_tier_ordering() {
        // Construct an input satisfying tiers 2, 4 and 5 simultaneously:
        // the exact tier must win.
        let flat = "The quick brown fox. The lazy dog sleeps near the quick brown fox.";
        let c = locate("quick brown fox", None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::ExactText);
        // Remove the exact occurrence: overlay (tier 4) must win over
        // region (tier 5).
        let flat2 = "The quick dog. A brown cat. A fox somewhere.";
        let c2 = locate("quick brown fox", None, flat2, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c2.method, MatchMethod::WordOverlay);
    }

    #[test]
    fn locate_is_idempotent() {
        let flat = "Some document. The quick brown fox appears here. More text.";
        let a = locate("quick brown fox", None, flat, TierSet::all(), &cfg()).unwrap();
        let b = locate("quick brown fox", None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn end_to_end_duplicate_sentence_without_anchors_picks_first() {
        // Without anchors the exact tier returns the first occurrence;
        // anchor-aware selection is the tree adapter's job.
        let flat = "The quick brown fox. The lazy dog sleeps. The quick brown fox jumps again.";
        let c = locate("quick brown fox", None, flat, TierSet::all(), &cfg()).unwrap();
        assert_eq!(c.method, MatchMethod::ExactText);
        assert_eq!(c.span.start, 4);
    }

    #[test]
    fn char_slice_handles_multibyte_text() {
        let s = "héllo wörld";
        assert_eq!(char_slice(s, 0, 5), "héllo");
        assert_eq!(char_slice(s, 6, 11), "wörld");
        assert_eq!(char_slice(s, 11, 20), "");
    }

    proptest! {
        #[test]
        fn locate_never_panics_and_spans_stay_in_bounds(
            chunk in ".{0,200}",
            flat in ".{0,500}",
        ) {
            if let Some(c) = locate(&chunk, None, &flat, TierSet::all(), &cfg()) {
                let n = char_count(&flat);
                prop_assert!(c.span.start < c.span.end, "degenerate span");
                prop_assert!(c.span.end <= n, "span out of bounds");
                for seg in &c.segments {
                    prop_assert!(seg.start < seg.end);
                    prop_assert!(seg.end <= n);
                }
            }
        }

        #[test]
        fn verbatim_chunks_are_found_by_an_exact_tier(
            prefix in "[a-z ]{0,40}",
            chunk in "[a-z]{3,10}( [a-z]{3,10}){1,5}",
            suffix in "[a-z ]{0,40}",
        ) {
            let flat = format!("{prefix} {chunk} {suffix}");
            let c = locate(&chunk, None, &flat, TierSet::all(), &cfg());
            let c = c.expect("verbatim chunk must match");
            prop_assert!(
                matches!(c.method, MatchMethod::ExactText | MatchMethod::Prefix),
                "unexpected method {:?}", c.method
            );
            let got = char_slice(&flat, c.span.start, c.span.end).to_lowercase();
            prop_assert_eq!(crate::normalize::normalize_whitespace(&got), chunk.clone());
        }
    }
}
