mod history;
mod ids;
mod level;
mod question;
mod score;
mod session;
mod topic;

pub use ids::{HistoryId, QuestionId, TestId};

pub use history::{HistoryEntry, Outcome};
pub use level::{Level, LevelError, LOWER_TIER_DURATION_SECS, UPPER_TIER_DURATION_SECS};
pub use question::{Answer, Question, QuestionBody, QuestionError, TestKind};
pub use score::{ScoreSummary, rounded_percentage};
pub use session::{CompletedSession, CompletedSessionError};
pub use topic::Topic;
