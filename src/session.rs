use crate::chunking::{estimate_token_count, TextSplitter};
use crate::config::RagConfig;
use crate::document::{extract_all, Document, MimeTextExtractor, TextExtractor};
use crate::embeddings::Embedder;
use crate::error::{AskError, IngestError};
use crate::generation::Generator;
use crate::index::{Retriever, VectorIndex};
use crate::memory::{ConversationMemory, Turn};
use crate::prompt::PromptAssembler;
use anyhow::Result;
use log::{debug, info, warn};

/// Lifecycle state of a [`Session`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No index has been built yet
    Empty,
    /// An index is available and questions can be asked
    Ready,
    /// A question is being answered
    Answering,
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestSummary {
    pub documents: usize,
    pub chunks: usize,
}

/// A single question answering session over one document set.
///
/// Owns the pipeline (extractor, splitter, embedder, retriever, prompt
/// assembler, generator) together with the index and conversation memory.
/// Both `ingest` and `ask` take `&mut self`, so at most one operation is in
/// flight at a time.
pub struct Session<E, G, X = MimeTextExtractor> {
    extractor: X,
    splitter: TextSplitter,
    embedder: E,
    generator: G,
    assembler: PromptAssembler,
    top_k: usize,
    retriever: Option<Retriever>,
    memory: ConversationMemory,
    state: SessionState,
}

impl<E: Embedder, G: Generator> Session<E, G> {
    /// Create an empty session that extracts text by MIME type
    pub fn new(config: &RagConfig, embedder: E, generator: G) -> Result<Self> {
        Session::with_extractor(config, embedder, generator, MimeTextExtractor)
    }
}

impl<E: Embedder, G: Generator, X: TextExtractor> Session<E, G, X> {
    /// Create an empty session with a custom text extractor
    pub fn with_extractor(config: &RagConfig, embedder: E, generator: G, extractor: X) -> Result<Self> {
        config.validate()?;
        let splitter = TextSplitter::new(
            config.separator.clone(),
            config.chunk_size,
            config.chunk_overlap,
        )?;

        Ok(Session {
            extractor,
            splitter,
            embedder,
            generator,
            assembler: PromptAssembler::new(config.fallback_answer.clone()),
            top_k: config.top_k,
            retriever: None,
            memory: ConversationMemory::with_window(config.memory_window),
            state: SessionState::Empty,
        })
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Conversation turns of the current document set, oldest first
    pub fn history(&self) -> &[Turn] {
        self.memory.history()
    }

    /// Number of indexed chunks, 0 before the first ingestion
    pub fn chunk_count(&self) -> usize {
        self.retriever.as_ref().map_or(0, |r| r.index().len())
    }

    pub fn fallback_answer(&self) -> &str {
        self.assembler.fallback_answer()
    }

    /// Replace the document set: extract, chunk, embed and index the
    /// documents, then start a fresh conversation.
    ///
    /// On any failure the previous index and memory are left untouched.
    pub async fn ingest(&mut self, documents: &[Document]) -> Result<IngestSummary, IngestError> {
        if documents.is_empty() {
            return Err(IngestError::NoDocuments);
        }

        let text = extract_all(&self.extractor, documents);
        if text.trim().is_empty() {
            warn!("No text extracted from {} document(s)", documents.len());
            return Err(IngestError::EmptyExtraction);
        }

        let chunks = self.splitter.split(&text);
        info!(
            "Split {} document(s) into {} chunks (~{} tokens)",
            documents.len(),
            chunks.len(),
            estimate_token_count(&text)
        );

        let index = VectorIndex::build(chunks, &self.embedder)
            .await
            .map_err(IngestError::Embedding)?;
        let summary = IngestSummary {
            documents: documents.len(),
            chunks: index.len(),
        };

        self.retriever = Some(Retriever::new(index, self.top_k));
        self.memory.clear();
        self.state = SessionState::Ready;

        info!("Indexed {} chunks", summary.chunks);
        Ok(summary)
    }

    /// Answer a question from the indexed documents and the conversation so far
    pub async fn ask(&mut self, question: &str) -> Result<String, AskError> {
        let Some(retriever) = self.retriever.as_ref() else {
            return Err(AskError::NotReady);
        };

        self.state = SessionState::Answering;
        let result = answer(
            retriever,
            &self.embedder,
            &self.assembler,
            &self.generator,
            self.memory.history(),
            question,
        )
        .await;
        self.state = SessionState::Ready;

        let answer = result?;
        self.memory.append(question, answer.as_str());
        info!("Answered question ({} turns in memory)", self.memory.len());

        Ok(answer)
    }
}

async fn answer<E: Embedder, G: Generator>(
    retriever: &Retriever,
    embedder: &E,
    assembler: &PromptAssembler,
    generator: &G,
    history: &[Turn],
    question: &str,
) -> Result<String, AskError> {
    let context = retriever
        .retrieve(embedder, question)
        .await
        .map_err(AskError::Embedding)?;

    let prompt = assembler.assemble(&context, history, question);
    debug!(
        "Prompt with {} context chunks and {} turns ({} chars)",
        context.len(),
        history.len(),
        prompt.as_str().len()
    );

    generator
        .generate(prompt.as_str())
        .await
        .map_err(AskError::Generation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Embedding;
    use anyhow::anyhow;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    /// Letter-frequency embedding over a-z
    #[derive(Default)]
    struct LetterEmbedder {
        calls: Rc<Cell<usize>>,
        fail: Rc<Cell<bool>>,
    }

    impl Embedder for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Embedding> {
            self.calls.set(self.calls.get() + 1);
            if self.fail.get() {
                return Err(anyhow!("embedding service unavailable"));
            }
            let mut values = vec![0.0; 26];
            for c in text.to_lowercase().chars().filter(|c| c.is_ascii_lowercase()) {
                values[(c as u8 - b'a') as usize] += 1.0;
            }
            Ok(Embedding::new(values))
        }
    }

    /// Answers from the context section only, otherwise with the fallback
    #[derive(Default)]
    struct ScriptedGenerator {
        prompts: Rc<RefCell<Vec<String>>>,
        fail: Rc<Cell<bool>>,
    }

    impl Generator for ScriptedGenerator {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            if self.fail.get() {
                return Err(anyhow!("generation service unavailable"));
            }

            let context = prompt
                .split("<document_context>")
                .nth(1)
                .and_then(|rest| rest.split("</document_context>").next())
                .unwrap_or("");
            if context.contains("Paris") {
                Ok("The capital of France is Paris.".to_string())
            } else {
                let fallback = prompt.split('"').nth(1).unwrap_or("");
                Ok(fallback.to_string())
            }
        }
    }

    /// Reads documents as UTF-8 regardless of MIME type
    struct Utf8Extractor;

    impl TextExtractor for Utf8Extractor {
        fn extract_text(&self, document: &Document) -> String {
            String::from_utf8_lossy(&document.bytes).into_owned()
        }
    }

    struct Harness {
        session: Session<LetterEmbedder, ScriptedGenerator, Utf8Extractor>,
        embed_calls: Rc<Cell<usize>>,
        embed_fail: Rc<Cell<bool>>,
        prompts: Rc<RefCell<Vec<String>>>,
        generate_fail: Rc<Cell<bool>>,
    }

    fn harness(config: RagConfig) -> Harness {
        let embedder = LetterEmbedder::default();
        let generator = ScriptedGenerator::default();
        let embed_calls = embedder.calls.clone();
        let embed_fail = embedder.fail.clone();
        let prompts = generator.prompts.clone();
        let generate_fail = generator.fail.clone();

        let session = Session::with_extractor(&config, embedder, generator, Utf8Extractor).unwrap();
        Harness {
            session,
            embed_calls,
            embed_fail,
            prompts,
            generate_fail,
        }
    }

    fn doc(name: &str, text: &str) -> Document {
        Document::new(name, "text/plain", text.as_bytes().to_vec())
    }

    fn geography() -> Vec<Document> {
        vec![doc("fr.txt", "France is a country in Europe.\nThe capital of France is Paris.\n")]
    }

    fn animals() -> Vec<Document> {
        vec![doc("zoo.txt", "Zebras have black and white stripes.\nOwls hunt at night.\n")]
    }

    #[tokio::test]
    async fn test_ask_before_ingest_is_not_ready() {
        let mut h = harness(RagConfig::default());
        assert_eq!(h.session.state(), SessionState::Empty);

        let result = h.session.ask("Anything?").await;
        assert!(matches!(result, Err(AskError::NotReady)));
        assert_eq!(h.embed_calls.get(), 0);
        assert!(h.prompts.borrow().is_empty());
        assert_eq!(h.session.state(), SessionState::Empty);
    }

    #[tokio::test]
    async fn test_ingest_without_documents_fails() {
        let mut h = harness(RagConfig::default());
        let result = h.session.ingest(&[]).await;
        assert!(matches!(result, Err(IngestError::NoDocuments)));
        assert_eq!(h.session.state(), SessionState::Empty);
    }

    #[tokio::test]
    async fn test_empty_ingest_keeps_ready_state_and_memory() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();
        h.session.ask("What is the capital of France?").await.unwrap();
        let chunks = h.session.chunk_count();

        let result = h.session.ingest(&[]).await;
        assert!(matches!(result, Err(IngestError::NoDocuments)));
        assert_eq!(h.session.state(), SessionState::Ready);
        assert_eq!(h.session.history().len(), 1);
        assert_eq!(h.session.chunk_count(), chunks);
    }

    #[tokio::test]
    async fn test_blank_extraction_fails_without_building_index() {
        let mut h = harness(RagConfig::default());
        let result = h.session.ingest(&[doc("blank.txt", "  \n\t "), doc("empty.txt", "")]).await;

        assert!(matches!(result, Err(IngestError::EmptyExtraction)));
        assert_eq!(h.session.state(), SessionState::Empty);
        assert_eq!(h.session.chunk_count(), 0);
        assert_eq!(h.embed_calls.get(), 0);
    }

    #[tokio::test]
    async fn test_blank_reingest_keeps_ready_session() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();
        h.session.ask("What is the capital of France?").await.unwrap();
        let chunks = h.session.chunk_count();
        let embed_calls = h.embed_calls.get();

        let result = h.session.ingest(&[doc("blank.txt", " \n\n ")]).await;
        assert!(matches!(result, Err(IngestError::EmptyExtraction)));
        assert_eq!(h.session.state(), SessionState::Ready);
        assert_eq!(h.session.history().len(), 1);
        assert_eq!(h.session.chunk_count(), chunks);
        assert_eq!(h.embed_calls.get(), embed_calls);
    }

    #[test]
    fn test_zero_memory_window_is_rejected() {
        let config = RagConfig {
            memory_window: Some(0),
            ..RagConfig::default()
        };
        let result = Session::with_extractor(
            &config,
            LetterEmbedder::default(),
            ScriptedGenerator::default(),
            Utf8Extractor,
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_previous_index() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();
        h.session.ask("What is the capital of France?").await.unwrap();

        h.embed_fail.set(true);
        let result = h.session.ingest(&animals()).await;
        assert!(matches!(result, Err(IngestError::Embedding(_))));
        assert_eq!(h.session.state(), SessionState::Ready);
        assert_eq!(h.session.history().len(), 1);

        h.embed_fail.set(false);
        let answer = h.session.ask("And the capital of France again?").await.unwrap();
        assert_eq!(answer, "The capital of France is Paris.");
    }

    #[tokio::test]
    async fn test_two_documents_are_concatenated_before_chunking() {
        let mut h = harness(RagConfig::default());
        let documents = vec![doc("a.txt", &"A".repeat(1200)), doc("b.txt", &"A".repeat(800))];

        let summary = h.session.ingest(&documents).await.unwrap();
        assert_eq!(summary, IngestSummary { documents: 2, chunks: 2 });
        assert_eq!(h.session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_answers_accumulate_in_history() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();

        let questions = ["What is the capital of France?", "Where is France?", "Is Paris big?"];
        for question in questions {
            h.session.ask(question).await.unwrap();
        }

        let history = h.session.history();
        assert_eq!(history.len(), 3);
        let asked: Vec<&str> = history.iter().map(|t| t.question.as_str()).collect();
        assert_eq!(asked, questions);
        assert_eq!(history[0].answer, "The capital of France is Paris.");
        assert_eq!(h.session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_prompt_includes_previous_turns() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();
        h.session.ask("What is the capital of France?").await.unwrap();
        h.session.ask("Repeat that please.").await.unwrap();

        let prompts = h.prompts.borrow();
        assert!(!prompts[0].contains("Question: What is the capital of France?"));
        assert!(prompts[1].contains(
            "Question: What is the capital of France?\nAnswer: The capital of France is Paris."
        ));
    }

    #[tokio::test]
    async fn test_unknown_fact_yields_fallback() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&animals()).await.unwrap();

        let answer = h.session.ask("What is the capital of France?").await.unwrap();
        assert_eq!(answer, crate::prompt::FALLBACK_ANSWER);
        assert_eq!(answer, h.session.fallback_answer());
        assert_eq!(h.session.history().len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_history_unchanged() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();
        h.session.ask("What is the capital of France?").await.unwrap();

        h.generate_fail.set(true);
        let result = h.session.ask("Where is France?").await;
        assert!(matches!(result, Err(AskError::Generation(_))));
        assert_eq!(h.session.history().len(), 1);
        assert_eq!(h.session.state(), SessionState::Ready);

        h.generate_fail.set(false);
        h.session.ask("Where is France?").await.unwrap();
        assert_eq!(h.session.history().len(), 2);
    }

    #[tokio::test]
    async fn test_query_embedding_failure_is_reported() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();

        h.embed_fail.set(true);
        let result = h.session.ask("What is the capital of France?").await;
        assert!(matches!(result, Err(AskError::Embedding(_))));
        assert!(h.prompts.borrow().is_empty());
        assert!(h.session.history().is_empty());
        assert_eq!(h.session.state(), SessionState::Ready);
    }

    #[tokio::test]
    async fn test_reingest_resets_history_and_index() {
        let mut h = harness(RagConfig::default());
        h.session.ingest(&geography()).await.unwrap();
        h.session.ask("What is the capital of France?").await.unwrap();
        assert_eq!(h.session.history().len(), 1);

        h.session.ingest(&animals()).await.unwrap();
        assert!(h.session.history().is_empty());
        assert_eq!(h.session.state(), SessionState::Ready);

        let answer = h.session.ask("What is the capital of France?").await.unwrap();
        assert_eq!(answer, crate::prompt::FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_retrieval_is_limited_to_top_k() {
        let config = RagConfig {
            chunk_size: 40,
            chunk_overlap: 5,
            top_k: 2,
            ..RagConfig::default()
        };
        let mut h = harness(config);
        let text: String = (0..20).map(|i| format!("Sentence number {} here.\n", i)).collect();
        let summary = h.session.ingest(&[doc("long.txt", &text)]).await.unwrap();
        assert!(summary.chunks > 2);

        h.session.ask("number").await.unwrap();
        let prompts = h.prompts.borrow();
        let context = prompts[0]
            .split("<document_context>\n")
            .nth(1)
            .and_then(|rest| rest.split("\n</document_context>").next())
            .unwrap();
        assert_eq!(context.split("\n\n").count(), 2);
    }

    #[tokio::test]
    async fn test_memory_window_bounds_history() {
        let config = RagConfig {
            memory_window: Some(2),
            ..RagConfig::default()
        };
        let mut h = harness(config);
        h.session.ingest(&geography()).await.unwrap();
        for question in ["one", "two", "three"] {
            h.session.ask(question).await.unwrap();
        }

        let asked: Vec<&str> = h.session.history().iter().map(|t| t.question.as_str()).collect();
        assert_eq!(asked, vec!["two", "three"]);
    }
}
