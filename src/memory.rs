/// One question and the answer it received
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub question: String,
    pub answer: String,
}

/// Ordered log of the turns of the active session.
///
/// Unbounded unless a window is set, in which case only the most recent
/// `window` turns are kept.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
    window: Option<usize>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memory that keeps at most `window` turns; `None` means unbounded
    pub fn with_window(window: Option<usize>) -> Self {
        ConversationMemory {
            turns: Vec::new(),
            window,
        }
    }

    /// Add one turn to the end of the log
    pub fn append(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.turns.push(Turn {
            question: question.into(),
            answer: answer.into(),
        });

        if let Some(window) = self.window {
            if self.turns.len() > window {
                let excess = self.turns.len() - window;
                self.turns.drain(..excess);
            }
        }
    }

    /// Turns oldest first
    pub fn history(&self) -> &[Turn] {
        &self.turns
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
