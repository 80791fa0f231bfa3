use thiserror::Error;

/// Failures of [`Session::ingest`](crate::session::Session::ingest).
///
/// None of them modify the session: the previous index, memory and state
/// stay in place.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("No documents were provided; upload at least one document")]
    NoDocuments,

    #[error("Could not extract any text from the provided documents")]
    EmptyExtraction,

    #[error("Failed to embed document chunks: {0:#}")]
    Embedding(#[source] anyhow::Error),
}

/// Failures of [`Session::ask`](crate::session::Session::ask).
///
/// None of them append to the conversation memory.
#[derive(Error, Debug)]
pub enum AskError {
    #[error("No documents have been processed yet; ingest documents first")]
    NotReady,

    #[error("Failed to retrieve context for the question: {0:#}")]
    Embedding(#[source] anyhow::Error),

    #[error("Failed to generate an answer: {0:#}")]
    Generation(#[source] anyhow::Error),
}
