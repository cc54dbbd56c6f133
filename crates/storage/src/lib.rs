#![forbid(unsafe_code)]

pub mod bundle;
pub mod repository;
pub mod sqlite;

pub use bundle::{BundleError, TestBundle};
pub use repository::{HistoryRepository, InMemoryRepository, QuestionSource, Storage, StorageError};
