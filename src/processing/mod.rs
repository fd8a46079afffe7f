//! Text processing: cleaning, chapter splitting and metadata assembly

pub mod document;
pub mod cleaner;
pub mod chapter_splitter;
pub mod metadata;
pub mod pipeline;
