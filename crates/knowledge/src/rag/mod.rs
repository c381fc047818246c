//! Retrieval-augmented answering over the Manual.
//!
//! Retrieval, generation with failover, answer post-processing and
//! conversation memory, tied together by [`ManualAssistant`].

pub mod generate;
pub mod memory;
pub mod pipeline;
pub mod postprocess;
pub mod retrieve;
pub mod types;

pub use generate::{Backend, GenerationOutcome, Generator};
pub use memory::{ConversationTurn, InMemorySessionStore, Session, SessionStore};
pub use pipeline::ManualAssistant;
pub use postprocess::{AnswerFormatter, FormattedAnswer};
pub use retrieve::{boosted_score, Retriever};
pub use types::{AssistantReply, Citation, RetrievalCandidate, RetrievalError};
