use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use url::Url;

use crate::model::ids::QuestionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum QuestionError {
    #[error("question {id} has an empty prompt")]
    EmptyPrompt { id: QuestionId },

    #[error("question {id} has no options")]
    NoOptions { id: QuestionId },

    #[error("question {id} has a non-numeric correct answer: {raw:?}")]
    UnparsableCorrectAnswer { id: QuestionId, raw: String },

    #[error("question {id} points at option {ordinal} but only has {len} options")]
    CorrectAnswerOutOfRange {
        id: QuestionId,
        ordinal: i64,
        len: usize,
    },

    #[error("question {id} has an invalid audio url: {raw}")]
    InvalidAudioUrl { id: QuestionId, raw: String },

    #[error("unrecognized test kind: {0}")]
    UnknownKind(String),
}

//
// ─── TEST KIND ─────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestKind {
    Listening,
    Reading,
    Writing,
}

impl TestKind {
    /// Listening and reading are graded locally against an option list.
    #[must_use]
    pub fn is_multiple_choice(self) -> bool {
        !matches!(self, TestKind::Writing)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Listening => "listening",
            TestKind::Reading => "reading",
            TestKind::Writing => "writing",
        }
    }
}

impl fmt::Display for TestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestKind {
    type Err = QuestionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "listening" => Ok(Self::Listening),
            "reading" => Ok(Self::Reading),
            "writing" => Ok(Self::Writing),
            other => Err(QuestionError::UnknownKind(other.to_string())),
        }
    }
}

//
// ─── ANSWER ────────────────────────────────────────────────────────────────────
//

/// A learner's answer: an option index for multiple-choice kinds, free text for writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Answer {
    Option(usize),
    Text(String),
}

impl Answer {
    #[must_use]
    pub fn option_index(&self) -> Option<usize> {
        match self {
            Answer::Option(index) => Some(*index),
            Answer::Text(_) => None,
        }
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Answer::Option(_) => None,
            Answer::Text(text) => Some(text),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Kind-specific payload of a question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionBody {
    Listening {
        #[serde(default)]
        audio_url: Option<String>,
        #[serde(default)]
        transcript: Option<String>,
    },
    Reading {
        #[serde(default)]
        passage: Option<String>,
    },
    Writing {
        #[serde(default)]
        sample_answer: Option<String>,
    },
}

/// One item of a practice test.
///
/// `correct_answer` is a 1-based option ordinal encoded as text, as delivered by
/// the question bank. Writing questions carry it too but are graded elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: QuestionId,
    pub prompt_text: String,
    pub correct_answer: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    #[must_use]
    pub fn listening(
        id: QuestionId,
        prompt_text: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self::with_body(
            id,
            prompt_text,
            options,
            correct_answer,
            QuestionBody::Listening {
                audio_url: None,
                transcript: None,
            },
        )
    }

    #[must_use]
    pub fn reading(
        id: QuestionId,
        prompt_text: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self::with_body(
            id,
            prompt_text,
            options,
            correct_answer,
            QuestionBody::Reading { passage: None },
        )
    }

    #[must_use]
    pub fn writing(id: QuestionId, prompt_text: impl Into<String>) -> Self {
        Self::with_body(
            id,
            prompt_text,
            Vec::new(),
            String::new(),
            QuestionBody::Writing {
                sample_answer: None,
            },
        )
    }

    fn with_body(
        id: QuestionId,
        prompt_text: impl Into<String>,
        options: Vec<String>,
        correct_answer: impl Into<String>,
        body: QuestionBody,
    ) -> Self {
        Self {
            id,
            prompt_text: prompt_text.into(),
            correct_answer: correct_answer.into(),
            options,
            explanation: None,
            translation: None,
            body,
        }
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    #[must_use]
    pub fn with_translation(mut self, translation: impl Into<String>) -> Self {
        self.translation = Some(translation.into());
        self
    }

    #[must_use]
    pub fn kind(&self) -> TestKind {
        match self.body {
            QuestionBody::Listening { .. } => TestKind::Listening,
            QuestionBody::Reading { .. } => TestKind::Reading,
            QuestionBody::Writing { .. } => TestKind::Writing,
        }
    }

    #[must_use]
    pub fn is_multiple_choice(&self) -> bool {
        self.kind().is_multiple_choice()
    }

    #[must_use]
    pub fn transcript(&self) -> Option<&str> {
        match &self.body {
            QuestionBody::Listening { transcript, .. } => transcript.as_deref(),
            _ => None,
        }
    }

    /// Zero-based index of the correct option.
    ///
    /// # Errors
    ///
    /// Returns `QuestionError::UnparsableCorrectAnswer` if the stored ordinal is not an
    /// integer, or `CorrectAnswerOutOfRange` if it does not name an existing option.
    pub fn correct_option_index(&self) -> Result<usize, QuestionError> {
        let raw = self.correct_answer.trim();
        let ordinal: i64 = raw
            .parse()
            .map_err(|_| QuestionError::UnparsableCorrectAnswer {
                id: self.id,
                raw: self.correct_answer.clone(),
            })?;
        let out_of_range = QuestionError::CorrectAnswerOutOfRange {
            id: self.id,
            ordinal,
            len: self.options.len(),
        };
        let index = usize::try_from(ordinal.saturating_sub(1)).map_err(|_| out_of_range.clone())?;
        if index >= self.options.len() {
            return Err(out_of_range);
        }
        Ok(index)
    }

    /// Grades an option index. Unparsable answer keys never match.
    #[must_use]
    pub fn is_correct_option(&self, option_index: usize) -> bool {
        self.correct_option_index()
            .is_ok_and(|correct| correct == option_index)
    }

    #[must_use]
    pub fn has_option(&self, option_index: usize) -> bool {
        option_index < self.options.len()
    }

    /// Checks the invariants the session engine relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated `QuestionError`.
    pub fn validate(&self) -> Result<(), QuestionError> {
        if self.prompt_text.trim().is_empty() {
            return Err(QuestionError::EmptyPrompt { id: self.id });
        }
        if let QuestionBody::Listening {
            audio_url: Some(raw),
            ..
        } = &self.body
        {
            Url::parse(raw).map_err(|_| QuestionError::InvalidAudioUrl {
                id: self.id,
                raw: raw.clone(),
            })?;
        }
        if !self.is_multiple_choice() {
            return Ok(());
        }
        if self.options.is_empty() {
            return Err(QuestionError::NoOptions { id: self.id });
        }
        self.correct_option_index().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("option {i}")).collect()
    }

    #[test]
    fn correct_answer_is_one_based() {
        let q = Question::reading(QuestionId::new(1), "Q", options(4), "3");
        assert_eq!(q.correct_option_index().unwrap(), 2);
        assert!(q.is_correct_option(2));
        assert!(!q.is_correct_option(3));
    }

    #[test]
    fn correct_answer_outside_options_fails_validation() {
        let q = Question::listening(QuestionId::new(2), "Q", options(3), "4");
        assert!(matches!(
            q.validate(),
            Err(QuestionError::CorrectAnswerOutOfRange { ordinal: 4, len: 3, .. })
        ));

        let zero = Question::listening(QuestionId::new(3), "Q", options(3), "0");
        assert!(zero.validate().is_err());
        assert!(!zero.is_correct_option(0));
    }

    #[test]
    fn unparsable_answer_key_never_matches() {
        let q = Question::reading(QuestionId::new(4), "Q", options(2), "B");
        assert!(!q.is_correct_option(1));
        assert!(matches!(
            q.validate(),
            Err(QuestionError::UnparsableCorrectAnswer { .. })
        ));
    }

    #[test]
    fn writing_questions_skip_option_checks() {
        let q = Question::writing(QuestionId::new(5), "Describe your weekend.");
        assert_eq!(q.kind(), TestKind::Writing);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn listening_audio_url_must_parse() {
        let mut q = Question::listening(QuestionId::new(6), "Q", options(2), "1");
        q.body = QuestionBody::Listening {
            audio_url: Some("not a url".into()),
            transcript: None,
        };
        assert!(matches!(
            q.validate(),
            Err(QuestionError::InvalidAudioUrl { .. })
        ));
    }

    #[test]
    fn deserializes_flattened_kind_tag() {
        let json = r#"{
            "id": 7,
            "prompt_text": "你好 means?",
            "correct_answer": "1",
            "options": ["hello", "goodbye"],
            "kind": "listening",
            "transcript": "nǐ hǎo"
        }"#;
        let q: Question = serde_json::from_str(json).unwrap();
        assert_eq!(q.kind(), TestKind::Listening);
        assert_eq!(q.transcript(), Some("nǐ hǎo"));
        assert!(q.validate().is_ok());
    }
}
