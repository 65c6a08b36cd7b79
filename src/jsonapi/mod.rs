//! JSON:API ingestion: document types and the resource graph parser.

pub mod document;
mod parser;

pub use parser::{parse_document, parse_slice, parse_value, ParsedDocument, Resource};
