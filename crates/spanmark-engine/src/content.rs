//! Document-view construction over the content-source boundary.
//!
//! Fetching is the engine's only asynchronous edge: a view's underlying
//! content (parsed text, rendered markup, text layer) is awaited here,
//! after which every locate pass is synchronous.

use crate::cascade::char_count;
use crate::session::DocumentView;
use crate::textlayer::TextLayerPage;
use crate::tree::RenderedTree;
use spanmark_core::{ContentSource, Error, Result};

/// Plain-text view of one page (0-based), with the page's offset in the
/// whole-document coordinate space so chunk offsets stay meaningful.
pub async fn plain_view(
    source: &dyn ContentSource,
    doc_id: &str,
    page: usize,
) -> Result<DocumentView> {
    let pages = source.parsed_pages(doc_id).await?;
    let text = pages
        .get(page)
        .ok_or(Error::PageOutOfRange(page))?
        .clone();
    // Previous pages' chars plus one page-break marker per boundary.
    let base: usize = pages[..page].iter().map(|p| char_count(p) + 1).sum();
    Ok(DocumentView::PlainText { text, base })
}

/// Rendered-tree view of the whole document.
pub async fn rendered_view(source: &dyn ContentSource, doc_id: &str) -> Result<DocumentView> {
    let html = source.rendered_html(doc_id).await?;
    Ok(DocumentView::Rendered(RenderedTree::from_html(&html)))
}

/// Text-layer view of one page (0-based).
pub async fn text_layer_view(
    source: &dyn ContentSource,
    doc_id: &str,
    page: usize,
) -> Result<DocumentView> {
    let pages = source.text_layer_pages(doc_id).await?;
    let fragments = pages.get(page).ok_or(Error::PageOutOfRange(page))?;
    Ok(DocumentView::TextLayer(TextLayerPage::from_fragments(
        fragments,
    )))
}
