mod engine;
mod navigation;
mod presentation;
mod progress;
mod scoring;
mod shared;
mod snapshot;
mod timer;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::{SessionError, SubmitError};
pub use engine::{AdvanceOutcome, AnswerOutcome, Lifecycle, SessionEngine, SessionInit, SubmitPlan};
pub use navigation::Navigation;
pub use presentation::{FontSize, Presentation, PresentationState, UnknownFontSize};
pub use progress::{Progress, QuestionStatus};
pub use scoring::{Scoring, SubmissionState, Tally};
pub use shared::SharedSession;
pub use snapshot::SessionSnapshot;
pub use timer::{TickOutcome, Timer, TimerState};
pub use view::{HistoryListItem, HistoryService};
pub use workflow::{PracticeLoopService, SessionAdvanceResult};
