use std::env;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use practice_core::model::{Question, TestId, TestKind, Topic};
use storage::repository::{QuestionSource, StorageError};

#[derive(Clone, Debug)]
pub struct HttpQuestionSourceConfig {
    pub base_url: String,
    pub token: Option<String>,
}

impl HttpQuestionSourceConfig {
    /// `None` unless `PRACTICE_API_BASE_URL` is set. `PRACTICE_API_TOKEN` is optional.
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("PRACTICE_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let token = env::var("PRACTICE_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self { base_url, token })
    }

    fn topic_url(&self, test_id: TestId) -> String {
        format!("{}/tests/{test_id}", self.base_url.trim_end_matches('/'))
    }

    fn questions_url(&self, kind: TestKind, test_id: TestId) -> String {
        format!(
            "{}/tests/{test_id}/{kind}/questions",
            self.base_url.trim_end_matches('/')
        )
    }
}

/// Question source backed by the content API.
#[derive(Clone)]
pub struct HttpQuestionSource {
    client: Client,
    config: HttpQuestionSourceConfig,
}

impl HttpQuestionSource {
    #[must_use]
    pub fn new(config: HttpQuestionSourceConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        HttpQuestionSourceConfig::from_env().map(Self::new)
    }

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// `Ok(None)` on 404.
    async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>, StorageError> {
        let response = self
            .get(url)
            .send()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        tracing::debug!(url, status = %response.status(), "content api response");
        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<Option<T>, StorageError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Ok(None);
    }
    if !status.is_success() {
        return Err(StorageError::Connection(format!("unexpected status {status}")));
    }
    response
        .json()
        .await
        .map(Some)
        .map_err(|e| StorageError::Serialization(e.to_string()))
}

#[async_trait]
impl QuestionSource for HttpQuestionSource {
    async fn fetch_questions(
        &self,
        kind: TestKind,
        test_id: TestId,
    ) -> Result<Vec<Question>, StorageError> {
        let url = self.config.questions_url(kind, test_id);
        let questions: Vec<Question> = self
            .fetch_json(&url)
            .await?
            .ok_or(StorageError::NotFound)?;
        if questions.iter().any(|q| q.kind() != kind) {
            tracing::warn!(%test_id, %kind, "content api returned questions of another kind");
            return Err(StorageError::NotFound);
        }
        Ok(questions)
    }

    async fn fetch_topic(&self, test_id: TestId) -> Result<Option<Topic>, StorageError> {
        self.fetch_json(&self.config.topic_url(test_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base: &str) -> HttpQuestionSourceConfig {
        HttpQuestionSourceConfig {
            base_url: base.into(),
            token: None,
        }
    }

    #[test]
    fn urls_ignore_trailing_slash() {
        let with_slash = config("https://content.example/api/");
        let without = config("https://content.example/api");

        assert_eq!(
            with_slash.topic_url(TestId::new(12)),
            "https://content.example/api/tests/12"
        );
        assert_eq!(
            with_slash.questions_url(TestKind::Listening, TestId::new(12)),
            without.questions_url(TestKind::Listening, TestId::new(12))
        );
        assert_eq!(
            without.questions_url(TestKind::Writing, TestId::new(3)),
            "https://content.example/api/tests/3/writing/questions"
        );
    }

    #[tokio::test]
    async fn not_found_decodes_to_none() {
        let response: Response = http::Response::builder()
            .status(404)
            .body("")
            .expect("response")
            .into();
        let decoded: Option<Topic> = decode(response).await.expect("decode");
        assert!(decoded.is_none());
    }

    #[tokio::test]
    async fn server_error_is_a_connection_error() {
        let response: Response = http::Response::builder()
            .status(503)
            .body("")
            .expect("response")
            .into();
        let err = decode::<Topic>(response).await.expect_err("status");
        assert!(matches!(err, StorageError::Connection(_)));
    }

    #[tokio::test]
    async fn topic_body_is_parsed() {
        let body = r#"{"test_id":4,"title":"Numbers","level":"HSK2"}"#;
        let response: Response = http::Response::builder()
            .status(200)
            .body(body)
            .expect("response")
            .into();
        let topic: Topic = decode(response).await.expect("decode").expect("topic");
        assert_eq!(topic.test_id, TestId::new(4));
        assert_eq!(topic.title, "Numbers");
    }
}
