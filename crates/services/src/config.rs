use std::env;

use crate::sessions::FontSize;

const DEFAULT_HISTORY_LIST_LIMIT: u32 = 20;

/// Learner preferences applied to every session the services start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Reveal correctness immediately after each selection.
    pub show_answer_after_each: bool,
    pub font_size: FontSize,
    pub history_list_limit: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            show_answer_after_each: false,
            font_size: FontSize::Medium,
            history_list_limit: DEFAULT_HISTORY_LIST_LIMIT,
        }
    }
}

impl SessionConfig {
    /// Reads `PRACTICE_SHOW_ANSWER_AFTER_EACH`, `PRACTICE_FONT_SIZE` and
    /// `PRACTICE_HISTORY_LIMIT`. Unset or unparsable values keep their defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(raw) = env::var("PRACTICE_SHOW_ANSWER_AFTER_EACH") {
            match parse_flag(&raw) {
                Some(flag) => config.show_answer_after_each = flag,
                None => tracing::warn!(value = %raw, "ignoring PRACTICE_SHOW_ANSWER_AFTER_EACH"),
            }
        }
        if let Ok(raw) = env::var("PRACTICE_FONT_SIZE") {
            match raw.parse() {
                Ok(size) => config.font_size = size,
                Err(err) => tracing::warn!(%err, "ignoring PRACTICE_FONT_SIZE"),
            }
        }
        if let Ok(raw) = env::var("PRACTICE_HISTORY_LIMIT") {
            match raw.trim().parse::<u32>() {
                Ok(limit) if limit > 0 => config.history_list_limit = limit,
                _ => tracing::warn!(value = %raw, "ignoring PRACTICE_HISTORY_LIMIT"),
            }
        }
        config
    }

    #[must_use]
    pub fn with_show_answer_after_each(mut self, show: bool) -> Self {
        self.show_answer_after_each = show;
        self
    }

    #[must_use]
    pub fn with_font_size(mut self, font_size: FontSize) -> Self {
        self.font_size = font_size;
        self
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_hide_feedback_and_use_medium_font() {
        let config = SessionConfig::default();
        assert!(!config.show_answer_after_each);
        assert_eq!(config.font_size, FontSize::Medium);
        assert_eq!(config.history_list_limit, 20);
    }

    #[test]
    fn flag_parser_accepts_common_spellings() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
