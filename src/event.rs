use std::fmt;
use serde::{Serialize, Deserialize};

/// Prefix of callback tokens the engine handles itself
pub const NAV_PREFIX: &str = "nav";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaKind {
    Photo,
    Video,
    Document,
}

impl MediaKind {
    pub const fn id(self) -> &'static str {
        match self {
            MediaKind::Photo    => "photo",
            MediaKind::Video    => "video",
            MediaKind::Document => "document",
        }
    }
}

/// Normalized inbound trigger
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum StepEvent {
    /// Free text typed by the user
    Text(String),

    /// Callback token of a pressed button
    Selection(String),

    Location { latitude: f64, longitude: f64 },

    /// `reference` is whatever the transport uses to find the file later
    Media { kind: MediaKind, reference: String },

    /// Leave the flow, always allowed
    Cancel,

    /// Return to the previous step
    Back,
}

impl StepEvent {
    /// Typed text, with `/cancel` and `/back` recognized
    pub fn from_text<S: AsRef<str>>(text: S) -> StepEvent {
        let text = text.as_ref();
        match text.trim() {
            "/cancel" => StepEvent::Cancel,
            "/back"   => StepEvent::Back,
            _         => StepEvent::Text(text.to_string()),
        }
    }

    /// Callback token, with `nav cancel` and `nav back` recognized
    pub fn from_token<S: AsRef<str>>(token: S) -> StepEvent {
        let token = token.as_ref();
        match token.split_once(' ') {
            Some((NAV_PREFIX, "cancel")) => StepEvent::Cancel,
            Some((NAV_PREFIX, "back"))   => StepEvent::Back,
            _ => StepEvent::Selection(token.to_string()),
        }
    }

    pub fn cancel_token() -> String {
        format!("{NAV_PREFIX} cancel")
    }

    pub fn back_token() -> String {
        format!("{NAV_PREFIX} back")
    }
}

impl fmt::Display for StepEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepEvent::Text(text) => {
                let len = text.chars().count();
                write!(f, "text ({len} chars)")
            },
            StepEvent::Selection(token) => write!(f, "selection \"{token}\""),
            StepEvent::Location { .. } => write!(f, "location"),
            StepEvent::Media { kind, .. } => write!(f, "{}", kind.id()),
            StepEvent::Cancel => write!(f, "cancel"),
            StepEvent::Back => write!(f, "back"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_navigation_is_recognized() {
        assert_eq!(StepEvent::Cancel, StepEvent::from_text(" /cancel "));
        assert_eq!(StepEvent::Back, StepEvent::from_text("/back"));
        assert_eq!(StepEvent::Cancel, StepEvent::from_token(StepEvent::cancel_token()));
        assert_eq!(StepEvent::Back, StepEvent::from_token("nav back"));
    }

    #[test]
    fn test_everything_else_is_passed_through() {
        assert_eq!(StepEvent::Text("Chilanzor 15".into()),
                   StepEvent::from_text("Chilanzor 15"));
        assert_eq!(StepEvent::Selection("nav backwards".into()),
                   StepEvent::from_token("nav backwards"));
        assert_eq!(StepEvent::Selection("region toshkent".into()),
                   StepEvent::from_token("region toshkent"));
    }

    #[test]
    fn test_display_hides_text() {
        let e = StepEvent::Text("my secret address".into());
        assert_eq!("text (17 chars)", e.to_string());
    }
}
