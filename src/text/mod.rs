//! Text layer processing
//!
//! Turns unordered, positioned text fragments into page text in natural
//! reading order.

mod extract;
mod layout;

pub use extract::{extract_document_text, DocumentText, TextItem, TextLayerSource};
pub use layout::{
    reconstruct_page_text, LineGroup, LineGrouping, ReadingOrder, TextFragment, Y_TOLERANCE,
};
