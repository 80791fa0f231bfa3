pub mod chunking;
pub mod config;
pub mod document;
pub mod embeddings;
pub mod error;
pub mod gemini;
pub mod generation;
pub mod index;
pub mod memory;
pub mod prompt;
pub mod session;
