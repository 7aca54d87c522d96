//! PPTX (Office Open XML) slide source for task extraction.
//!
//! Parses .pptx files which are ZIP archives containing XML documents.

pub mod parser;

pub use parser::PptxParser;
