use anyhow::{Context, Result};
use log::{debug, info, warn};
use mime_guess::from_path;
use pdf_extract::extract_text_from_mem;
use std::fs;
use std::path::Path;

/// Represents an uploaded document before text extraction
#[derive(Debug, Clone)]
pub struct Document {
    /// The document's file name
    pub name: String,
    /// The document's MIME type
    pub mime_type: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl Document {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Document {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }

    /// Create a new document from a file path
    pub fn from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let path = file_path.as_ref();
        let name = path
            .file_name()
            .context("Invalid file name")?
            .to_str()
            .context("Invalid file name encoding")?
            .to_string();

        // Detect MIME type
        let mime_type = from_path(path).first_or_octet_stream().to_string();
        debug!("Detected MIME type for {}: {}", name, mime_type);

        let bytes =
            fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;

        Ok(Document {
            name,
            mime_type,
            bytes,
        })
    }
}

/// Turns a document's bytes into text.
///
/// Returns an empty string when no text can be extracted.
pub trait TextExtractor {
    fn extract_text(&self, document: &Document) -> String;
}

/// Extracts text from PDF and plain-text documents based on MIME type
#[derive(Debug, Clone, Copy, Default)]
pub struct MimeTextExtractor;

impl TextExtractor for MimeTextExtractor {
    fn extract_text(&self, document: &Document) -> String {
        match document.mime_type.as_str() {
            mime if mime.starts_with("application/pdf") => {
                info!("Processing PDF document: {}", document.name);
                match extract_text_from_mem(&document.bytes) {
                    Ok(content) => {
                        // PDF extraction can sometimes include excessive whitespace
                        let cleaned_content = normalize_whitespace(&content);
                        if cleaned_content.is_empty() {
                            warn!("Extracted PDF content of {} is empty", document.name);
                        }
                        cleaned_content
                    }
                    Err(e) => {
                        warn!("Failed to extract text from PDF {}: {}", document.name, e);
                        String::new()
                    }
                }
            }

            mime if mime.starts_with("text/") => {
                info!("Processing text document: {}", document.name);
                String::from_utf8_lossy(&document.bytes).into_owned()
            }

            other => {
                warn!(
                    "Unsupported document format for {}: {}. Only text and PDF files are supported.",
                    document.name, other
                );
                String::new()
            }
        }
    }
}

/// Extract and concatenate the text of every document, in order
pub fn extract_all<X: TextExtractor>(extractor: &X, documents: &[Document]) -> String {
    documents
        .iter()
        .map(|document| extractor.extract_text(document))
        .collect()
}

/// Normalize whitespace in text (remove multiple consecutive spaces, newlines, etc.)
fn normalize_whitespace(text: &str) -> String {
    let result = text.replace('\r', "");

    // Replace multiple consecutive newlines with double newlines (paragraph separator)
    let mut prev_char = ' ';
    let mut newline_count = 0;
    let mut normalized = String::with_capacity(result.len());

    for c in result.chars() {
        if c == '\n' {
            newline_count += 1;
        } else {
            if newline_count > 0 {
                if newline_count >= 2 {
                    normalized.push_str("\n\n");
                } else {
                    normalized.push('\n');
                }
                newline_count = 0;
            }

            // Don't add consecutive spaces
            if !(c == ' ' && prev_char == ' ') {
                normalized.push(c);
            }

            prev_char = c;
        }
    }

    normalized.trim().to_string()
}
