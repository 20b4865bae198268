//! Prompt assembly for grounded answer generation

use serde::Serialize;

use crate::retrieval::ScoredChunk;
use crate::session::ConversationTurn;

/// Fixed instruction heading every prompt
pub const SYSTEM_INSTRUCTION: &str = "Answer the user's question based on the provided context documents.
Follow these guidelines:
1. Use only information from the provided context
2. Cite sources using [Source N] notation
3. Be concise and accurate
4. If the context doesn't contain enough information, say so clearly";

const CLOSING_INSTRUCTION: &str =
    "Instructions: Answer based on the context above. Always cite your sources.";

/// An assembled prompt: instruction, attributed context, recent history and
/// the question. Providers either render it to one string or map it onto
/// chat messages.
#[derive(Debug, Clone, Serialize)]
pub struct Prompt {
    /// Fixed system instruction
    pub system: String,
    /// Numbered context blocks
    pub context: String,
    /// Most recent turns, oldest first
    pub history: Vec<ConversationTurn>,
    /// The question being asked
    pub question: String,
}

impl Prompt {
    /// System message carrying the instruction and the context
    pub fn system_message(&self) -> String {
        format!(
            "{}\n\nContext Documents:\n{}\n\n{}",
            self.system, self.context, CLOSING_INSTRUCTION
        )
    }

    /// Render as a single completion prompt
    pub fn render(&self) -> String {
        let mut out = self.system_message();

        if !self.history.is_empty() {
            out.push_str("\n\nConversation so far:\n");
            for turn in &self.history {
                out.push_str(&format!("User: {}\nAssistant: {}\n", turn.question, turn.answer));
            }
        }

        out.push_str(&format!("\n\nQuestion: {}\nAnswer:", self.question));
        out
    }
}

/// Prompt builder for retrieval-augmented questions
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    history_turns: usize,
}

impl PromptBuilder {
    /// Create a builder including at most `history_turns` past turns
    pub fn new(history_turns: usize) -> Self {
        Self { history_turns }
    }

    /// Build context from search results as `[Source N] filename (chunk k)` blocks
    pub fn build_context(results: &[ScoredChunk]) -> String {
        results
            .iter()
            .enumerate()
            .map(|(i, result)| {
                format!(
                    "[Source {}] {} (chunk {})\n{}",
                    i + 1,
                    result.chunk.source.filename,
                    result.chunk.ordinal,
                    result.chunk.text
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n---\n\n")
    }

    /// Assemble the full prompt
    pub fn build(&self, question: &str, results: &[ScoredChunk], history: &[ConversationTurn]) -> Prompt {
        let skip = history.len().saturating_sub(self.history_turns);

        Prompt {
            system: SYSTEM_INSTRUCTION.to_string(),
            context: Self::build_context(results),
            history: history[skip..].to_vec(),
            question: question.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Chunk, ChunkSource, SourceType};
    use uuid::Uuid;

    fn scored(filename: &str, ordinal: u32, text: &str) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: Uuid::new_v4(),
                document_id: Uuid::new_v4(),
                ordinal,
                text: text.to_string(),
                source: ChunkSource {
                    filename: filename.to_string(),
                    source_type: SourceType::Text,
                    byte_start: 0,
                    byte_end: text.len(),
                },
            },
            score: 0.9,
        }
    }

    fn turn(q: &str, a: &str) -> ConversationTurn {
        ConversationTurn {
            question: q.to_string(),
            answer: a.to_string(),
            asked_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_context_blocks_are_numbered() {
        let context = PromptBuilder::build_context(&[
            scored("geo.txt", 0, "Paris is the capital of France."),
            scored("eu.md", 3, "France is in Europe."),
        ]);
        assert!(context.starts_with("[Source 1] geo.txt (chunk 0)\nParis is the capital of France."));
        assert!(context.contains("---\n\n[Source 2] eu.md (chunk 3)\nFrance is in Europe."));
    }

    #[test]
    fn test_history_is_bounded() {
        let history: Vec<_> = (0..5).map(|i| turn(&format!("q{i}"), &format!("a{i}"))).collect();
        let prompt = PromptBuilder::new(3).build("next?", &[], &history);
        assert_eq!(prompt.history.len(), 3);
        assert_eq!(prompt.history[0].question, "q2");

        let rendered = prompt.render();
        assert!(!rendered.contains("User: q1\n"));
        assert!(rendered.contains("User: q4\nAssistant: a4"));
        assert!(rendered.ends_with("Question: next?\nAnswer:"));
    }

    #[test]
    fn test_render_without_history() {
        let prompt = PromptBuilder::new(3).build("What?", &[scored("a.txt", 0, "body")], &[]);
        let rendered = prompt.render();
        assert!(rendered.starts_with(SYSTEM_INSTRUCTION));
        assert!(!rendered.contains("Conversation so far"));
        assert!(rendered.contains("[Source 1] a.txt (chunk 0)"));
    }
}
