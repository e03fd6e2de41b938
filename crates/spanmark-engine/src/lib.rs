//! Evidence localization engine.
//!
//! Given a retrieved chunk of text (optionally with character offsets, a
//! page number, and neighbor-chunk anchors) and one representation of its
//! source document, find the best-matching span and expose it for
//! highlighting and scroll-to behavior.
//!
//! Layout:
//! - [`normalize`]: pure tokenization/segmentation helpers.
//! - [`cascade`]: the ordered matching tiers over a flat string.
//! - [`fragments`]: flat-text synthesis over discrete text fragments.
//! - [`tree`] / [`textlayer`]: representation-specific adapters.
//! - [`session`]: the state machine owning the single live highlight.
//! - [`content`]: async view construction over a `ContentSource`.

pub mod cascade;
pub mod content;
pub mod fragments;
pub mod normalize;
pub mod session;
pub mod textlayer;
pub mod tree;

pub use cascade::{CascadeConfig, TierSet};
pub use session::{DocumentView, HighlightSession, SessionState};
pub use textlayer::TextLayerPage;
pub use tree::{AnchorConfig, FragmentMark, RenderedTree};
