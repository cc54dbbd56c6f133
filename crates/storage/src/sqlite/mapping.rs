use practice_core::model::{HistoryId, Level, TestId, TestKind};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

pub(crate) fn test_id_to_i64(id: TestId) -> Result<i64, StorageError> {
    i64::try_from(id.value()).map_err(|_| StorageError::Serialization("test_id overflow".into()))
}

pub(crate) fn test_id_from_i64(v: i64) -> Result<TestId, StorageError> {
    u64::try_from(v)
        .map(TestId::new)
        .map_err(|_| StorageError::Serialization(format!("invalid test_id: {v}")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn parse_kind(raw: &str) -> Result<TestKind, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn parse_level(raw: &str) -> Result<Level, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn parse_history_id(raw: &str) -> Result<HistoryId, StorageError> {
    raw.parse().map_err(ser)
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String, StorageError> {
    serde_json::to_string(value).map_err(ser)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StorageError> {
    serde_json::from_str(raw).map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_test_ids_are_rejected() {
        assert!(test_id_from_i64(-1).is_err());
        assert_eq!(test_id_from_i64(7).unwrap(), TestId::new(7));
    }

    #[test]
    fn kind_and_level_parse_from_stored_text() {
        assert_eq!(parse_kind("writing").unwrap(), TestKind::Writing);
        assert_eq!(parse_level("HSK4").unwrap(), Level::Hsk4);
        assert!(parse_level("HSK0").is_err());
    }
}
