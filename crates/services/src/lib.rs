#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod http_source;
pub mod sessions;

pub use practice_core::Clock;
pub use sessions as session;

pub use config::SessionConfig;
pub use error::{SessionError, SubmitError};
pub use http_source::{HttpQuestionSource, HttpQuestionSourceConfig};

pub use sessions::{
    AdvanceOutcome, AnswerOutcome, FontSize, HistoryListItem, HistoryService, Lifecycle,
    PracticeLoopService, SessionAdvanceResult, SessionEngine, SessionInit, SessionSnapshot,
    SharedSession, TickOutcome,
};
