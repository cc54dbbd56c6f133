use std::collections::BTreeMap;

use practice_core::model::{Answer, CompletedSession, HistoryId, Question, ScoreSummary, Topic};
use sqlx::Row;

use super::SqliteRepository;
use super::mapping::{
    conn, from_json, parse_history_id, parse_kind, parse_level, ser, test_id_from_i64,
    test_id_to_i64, to_json, u32_from_i64,
};
use crate::repository::{HistoryRepository, StorageError};

const SELECT_COLUMNS: &str = r"
    SELECT
        history_id, test_id, test_kind, level, completed_at,
        topic_json, questions_json, answers_json,
        correct, wrong, skipped, total, percentage
    FROM completed_sessions
";

fn map_history_row(row: &sqlx::sqlite::SqliteRow) -> Result<CompletedSession, StorageError> {
    let history_id = parse_history_id(&row.try_get::<String, _>("history_id").map_err(ser)?)?;
    let test_id = test_id_from_i64(row.try_get::<i64, _>("test_id").map_err(ser)?)?;
    let test_kind = parse_kind(&row.try_get::<String, _>("test_kind").map_err(ser)?)?;
    let level = parse_level(&row.try_get::<String, _>("level").map_err(ser)?)?;
    let completed_at = row.try_get("completed_at").map_err(ser)?;

    let topic: Topic = from_json(&row.try_get::<String, _>("topic_json").map_err(ser)?)?;
    let questions: Vec<Question> =
        from_json(&row.try_get::<String, _>("questions_json").map_err(ser)?)?;
    let answers: BTreeMap<usize, Answer> =
        from_json(&row.try_get::<String, _>("answers_json").map_err(ser)?)?;

    let score = ScoreSummary {
        correct: u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
        wrong: u32_from_i64("wrong", row.try_get::<i64, _>("wrong").map_err(ser)?)?,
        skipped: u32_from_i64("skipped", row.try_get::<i64, _>("skipped").map_err(ser)?)?,
        total: u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
        percentage: u32_from_i64(
            "percentage",
            row.try_get::<i64, _>("percentage").map_err(ser)?,
        )?,
    };

    CompletedSession::from_persisted(
        history_id,
        test_id,
        test_kind,
        completed_at,
        topic,
        questions,
        answers,
        score,
        level,
    )
    .map_err(ser)
}

#[async_trait::async_trait]
impl HistoryRepository for SqliteRepository {
    async fn save_completed_session(&self, record: &CompletedSession) -> Result<(), StorageError> {
        let score = record.score();
        let res = sqlx::query(
            r"
                INSERT INTO completed_sessions (
                    history_id, test_id, test_kind, level, completed_at,
                    topic_json, questions_json, answers_json,
                    correct, wrong, skipped, total, percentage
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                ON CONFLICT(history_id) DO NOTHING
            ",
        )
        .bind(record.history_id().to_string())
        .bind(test_id_to_i64(record.test_id())?)
        .bind(record.test_kind().as_str())
        .bind(record.level().to_string())
        .bind(record.completed_at())
        .bind(to_json(record.topic())?)
        .bind(to_json(&record.questions())?)
        .bind(to_json(record.selected_answers())?)
        .bind(i64::from(score.correct))
        .bind(i64::from(score.wrong))
        .bind(i64::from(score.skipped))
        .bind(i64::from(score.total))
        .bind(i64::from(score.percentage))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        if res.rows_affected() == 0 {
            return Err(StorageError::Conflict);
        }
        tracing::debug!(history_id = %record.history_id(), "completed session saved");
        Ok(())
    }

    async fn list_completed_sessions(
        &self,
        limit: u32,
    ) -> Result<Vec<CompletedSession>, StorageError> {
        let sql = format!("{SELECT_COLUMNS} ORDER BY completed_at DESC, rowid DESC LIMIT ?1");
        let rows = sqlx::query(&sql)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(conn)?;

        rows.iter().map(map_history_row).collect()
    }

    async fn get_completed_session(
        &self,
        id: HistoryId,
    ) -> Result<CompletedSession, StorageError> {
        let sql = format!("{SELECT_COLUMNS} WHERE history_id = ?1");
        let row = sqlx::query(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?
            .ok_or(StorageError::NotFound)?;

        map_history_row(&row)
    }

    async fn delete_completed_session(&self, id: HistoryId) -> Result<bool, StorageError> {
        let res = sqlx::query("DELETE FROM completed_sessions WHERE history_id = ?1")
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .map_err(conn)?;
        Ok(res.rows_affected() > 0)
    }
}
