use crate::index::ScoredChunk;
use crate::memory::Turn;

/// Reply the model must give verbatim when the documents lack the answer
pub const FALLBACK_ANSWER: &str =
    "Unfortunately, I could not find the answer to this question in the provided documents.";

const EMPTY_HISTORY: &str = "(no previous conversation)";

/// A fully assembled generation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Builds grounded prompts from retrieved context, history and a question.
///
/// The model is told to answer only from the history and context sections
/// and to reply with the fallback sentence otherwise. Nothing checks that
/// the generated answer actually obeys this.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    fallback_answer: String,
}

impl Default for PromptAssembler {
    fn default() -> Self {
        PromptAssembler::new(FALLBACK_ANSWER)
    }
}

impl PromptAssembler {
    pub fn new(fallback_answer: impl Into<String>) -> Self {
        PromptAssembler {
            fallback_answer: fallback_answer.into(),
        }
    }

    pub fn fallback_answer(&self) -> &str {
        &self.fallback_answer
    }

    /// Combine context chunks (in retrieval order), history and question
    pub fn assemble(&self, context: &[ScoredChunk], history: &[Turn], question: &str) -> Prompt {
        let history_section = if history.is_empty() {
            EMPTY_HISTORY.to_string()
        } else {
            history
                .iter()
                .map(|turn| format!("Question: {}\nAnswer: {}", turn.question, turn.answer))
                .collect::<Vec<String>>()
                .join("\n\n")
        };

        let context_section = context
            .iter()
            .map(|scored| scored.chunk.text.as_str())
            .collect::<Vec<&str>>()
            .join("\n\n");

        Prompt(format!(
            "Below are excerpts from documents and the conversation history.\n\
             Answer the user's question ONLY on the basis of the document excerpts and the conversation history below.\n\
             \n\
             If the answer is NOT contained in the documents, reply only with:\n\
             \"{fallback}\"\n\
             \n\
             Do NOT use any knowledge from outside the documents.\n\
             Do NOT guess. Do NOT make up an answer if the documents do not support it.\n\
             \n\
             <conversation_history>\n{history}\n</conversation_history>\n\
             \n\
             <document_context>\n{context}\n</document_context>\n\
             \n\
             <question>\n{question}\n</question>\n\
             \n\
             Answer:",
            fallback = self.fallback_answer,
            history = history_section,
            context = context_section,
            question = question,
        ))
    }
}
