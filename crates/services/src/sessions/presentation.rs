use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FontSize {
    Small,
    #[default]
    Medium,
    Large,
}

impl FontSize {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FontSize::Small => "small",
            FontSize::Medium => "medium",
            FontSize::Large => "large",
        }
    }
}

impl fmt::Display for FontSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown font size: {0}")]
pub struct UnknownFontSize(pub String);

impl FromStr for FontSize {
    type Err = UnknownFontSize;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "small" | "s" => Ok(FontSize::Small),
            "medium" | "m" => Ok(FontSize::Medium),
            "large" | "l" => Ok(FontSize::Large),
            _ => Err(UnknownFontSize(s.to_string())),
        }
    }
}

/// Per-question display flags. Everything except `font_size` is transient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PresentationState {
    pub show_translation: bool,
    pub show_explanation: bool,
    pub show_transcript: bool,
    pub is_answer_selected: bool,
    pub is_answer_correct: bool,
    pub is_show_answer_feedback: bool,
    pub font_size: FontSize,
}

#[derive(Debug, Clone, Default)]
pub struct Presentation {
    state: PresentationState,
}

impl Presentation {
    #[must_use]
    pub fn new(font_size: FontSize) -> Self {
        Self {
            state: PresentationState {
                font_size,
                ..PresentationState::default()
            },
        }
    }

    pub fn toggle_translation(&mut self) {
        self.state.show_translation = !self.state.show_translation;
    }

    pub fn toggle_explanation(&mut self) {
        self.state.show_explanation = !self.state.show_explanation;
    }

    pub fn toggle_transcript(&mut self) {
        self.state.show_transcript = !self.state.show_transcript;
    }

    pub fn set_show_answer_feedback(&mut self, show: bool) {
        self.state.is_show_answer_feedback = show;
    }

    pub fn set_answer_result(&mut self, selected: bool, correct: bool) {
        self.state.is_answer_selected = selected;
        self.state.is_answer_correct = correct;
    }

    /// Clears the three answer flags together.
    pub fn reset_answer_state(&mut self) {
        self.state.is_answer_selected = false;
        self.state.is_answer_correct = false;
        self.state.is_show_answer_feedback = false;
    }

    pub fn collapse_panels(&mut self) {
        self.state.show_translation = false;
        self.state.show_explanation = false;
        self.state.show_transcript = false;
    }

    pub fn set_font_size(&mut self, font_size: FontSize) {
        self.state.font_size = font_size;
    }

    #[must_use]
    pub fn state(&self) -> PresentationState {
        self.state
    }

    #[must_use]
    pub fn is_answer_selected(&self) -> bool {
        self.state.is_answer_selected
    }

    #[must_use]
    pub fn is_answer_correct(&self) -> bool {
        self.state.is_answer_correct
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggles_flip_only_their_own_flag() {
        let mut p = Presentation::default();
        p.toggle_translation();
        assert!(p.state().show_translation);
        assert!(!p.state().show_explanation);
        assert!(!p.state().show_transcript);

        p.toggle_transcript();
        p.toggle_translation();
        assert!(!p.state().show_translation);
        assert!(p.state().show_transcript);
    }

    #[test]
    fn reset_clears_answer_flags_but_keeps_panels_and_font() {
        let mut p = Presentation::new(FontSize::Large);
        p.toggle_explanation();
        p.set_answer_result(true, true);
        p.set_show_answer_feedback(true);

        p.reset_answer_state();
        let state = p.state();
        assert!(!state.is_answer_selected);
        assert!(!state.is_answer_correct);
        assert!(!state.is_show_answer_feedback);
        assert!(state.show_explanation);
        assert_eq!(state.font_size, FontSize::Large);

        p.collapse_panels();
        assert!(!p.state().show_explanation);
        assert_eq!(p.state().font_size, FontSize::Large);
    }

    #[test]
    fn font_size_parses_loosely() {
        assert_eq!("Small".parse::<FontSize>(), Ok(FontSize::Small));
        assert_eq!(" l ".parse::<FontSize>(), Ok(FontSize::Large));
        let err = "huge".parse::<FontSize>().expect_err("unknown size");
        assert_eq!(err.to_string(), "unknown font size: huge");
        assert_eq!(FontSize::default().to_string(), "medium");
    }
}
