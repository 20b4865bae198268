//! Question request types

use serde::{Deserialize, Serialize};

/// Question request (`POST /question`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    /// The question to answer
    pub question: String,
    /// Conversation session to continue (a new one is created when absent)
    #[serde(default)]
    pub session_id: Option<String>,
}

impl QuestionRequest {
    /// Create a new question
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            session_id: None,
        }
    }

    /// Continue an existing session
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Query request (`POST /query`), same semantics as [`QuestionRequest`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The query text
    pub query: String,
    /// Conversation session to continue
    #[serde(default)]
    pub session_id: Option<String>,
}

impl From<QueryRequest> for QuestionRequest {
    fn from(req: QueryRequest) -> Self {
        Self {
            question: req.query,
            session_id: req.session_id,
        }
    }
}
