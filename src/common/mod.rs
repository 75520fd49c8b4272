// Common utilities shared across the decoder and the ingestion pipeline

pub mod audit;
pub mod binary;
pub mod magic;

// Re-exports for convenience
pub use binary::ByteCursor;
pub use magic::{detect_file_type, detect_or_unknown, FileType};
