use chrono::Utc;
use practice_core::model::{Question, TestId, TestKind, Topic};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{conn, from_json, parse_kind, ser, test_id_to_i64, to_json};
use crate::bundle::TestBundle;
use crate::repository::{QuestionSource, StorageError};

impl SqliteRepository {
    /// Insert or replace the bundle stored for its test id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if serialization or the write fails.
    pub async fn upsert_bundle(&self, bundle: &TestBundle) -> Result<(), StorageError> {
        sqlx::query(
            r"
                INSERT INTO test_bundles (test_id, kind, topic_json, questions_json, updated_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(test_id) DO UPDATE SET
                    kind = excluded.kind,
                    topic_json = excluded.topic_json,
                    questions_json = excluded.questions_json,
                    updated_at = excluded.updated_at
            ",
        )
        .bind(test_id_to_i64(bundle.topic.test_id)?)
        .bind(bundle.kind.as_str())
        .bind(to_json(&bundle.topic)?)
        .bind(to_json(&bundle.questions)?)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(conn)?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl QuestionSource for SqliteRepository {
    async fn fetch_questions(
        &self,
        kind: TestKind,
        test_id: TestId,
    ) -> Result<Vec<Question>, StorageError> {
        let row = sqlx::query("SELECT kind, questions_json FROM test_bundles WHERE test_id = ?1")
            .bind(test_id_to_i64(test_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        let stored_kind = parse_kind(&row.try_get::<String, _>("kind").map_err(ser)?)?;
        if stored_kind != kind {
            return Err(StorageError::NotFound);
        }
        from_json(&row.try_get::<String, _>("questions_json").map_err(ser)?)
    }

    async fn fetch_topic(&self, test_id: TestId) -> Result<Option<Topic>, StorageError> {
        let row = sqlx::query("SELECT topic_json FROM test_bundles WHERE test_id = ?1")
            .bind(test_id_to_i64(test_id)?)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;

        row.map(|row| from_json(&row.try_get::<String, _>("topic_json").map_err(ser)?))
            .transpose()
    }
}
