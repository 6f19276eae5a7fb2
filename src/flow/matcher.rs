use std::fmt;

use crate::event::{MediaKind, StepEvent, NAV_PREFIX};

/// Decides whether a transition accepts an event and parses it.
///
/// Callback tokens look like `"<prefix> <value>"`, the same shape the
/// buttons built by [`Matcher::token`] carry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Matcher {
    /// Any non-blank text
    Text,

    /// Button with one of `options`, any value if `options` is empty
    Choice { prefix: String, options: Vec<String> },

    /// Button carrying a position in a list
    Index { prefix: String },

    Location,

    Media,
}

/// Event after a matcher accepted it
#[derive(Clone, Debug, PartialEq)]
pub enum Input {
    Text(String),
    Choice(String),
    Index(usize),
    Location { latitude: f64, longitude: f64 },
    Media { kind: MediaKind, reference: String },
}

impl Matcher {
    pub fn text() -> Matcher {
        Matcher::Text
    }

    pub fn choice<S: AsRef<str>>(prefix: &str, options: &[S]) -> Matcher {
        Matcher::Choice {
            prefix: prefix.to_string(),
            options: options.iter().map(|o| o.as_ref().to_string()).collect(),
        }
    }

    pub fn any_choice(prefix: &str) -> Matcher {
        Matcher::Choice { prefix: prefix.to_string(), options: Vec::new() }
    }

    pub fn index(prefix: &str) -> Matcher {
        Matcher::Index { prefix: prefix.to_string() }
    }

    pub fn location() -> Matcher {
        Matcher::Location
    }

    pub fn media() -> Matcher {
        Matcher::Media
    }

    /// Button data this matcher accepts
    pub fn token<V: fmt::Display>(prefix: &str, value: V) -> String {
        format!("{prefix} {value}")
    }

    /// Returns None if the event isn't for this matcher
    pub fn parse(&self, event: &StepEvent) -> Option<Input> {
        match (self, event) {
            (Matcher::Text, StepEvent::Text(text)) => {
                let text = text.trim();
                if text.is_empty() { return None }
                Some(Input::Text(text.to_string()))
            },
            (Matcher::Choice { prefix, options }, StepEvent::Selection(token)) => {
                let value = split_token(prefix, token)?;
                if !options.is_empty() && !options.iter().any(|o| o == value) {
                    return None
                }
                Some(Input::Choice(value.to_string()))
            },
            (Matcher::Index { prefix }, StepEvent::Selection(token)) => {
                let value = split_token(prefix, token)?;
                Some(Input::Index(value.parse().ok()?))
            },
            (Matcher::Location, StepEvent::Location { latitude, longitude }) => {
                Some(Input::Location {
                    latitude: *latitude, longitude: *longitude })
            },
            (Matcher::Media, StepEvent::Media { kind, reference }) => {
                Some(Input::Media { kind: *kind, reference: reference.clone() })
            },
            _ => None,
        }
    }

    /// Checks the matcher can ever accept anything
    pub(crate) fn validate(&self) -> Result<(), String> {
        let check_prefix = |prefix: &str| {
            if prefix.is_empty() || prefix.contains(char::is_whitespace) {
                return Err(format!("bad token prefix \"{prefix}\""));
            }
            if prefix == NAV_PREFIX {
                return Err(format!("token prefix \"{NAV_PREFIX}\" is reserved"));
            }
            Ok(())
        };

        match self {
            Matcher::Choice { prefix, options } => {
                check_prefix(prefix)?;
                for (ii, o) in options.iter().enumerate() {
                    if o.is_empty() || o.contains(char::is_whitespace) {
                        return Err(format!("bad option \"{o}\" for \"{prefix}\""));
                    }
                    if options[..ii].contains(o) {
                        return Err(format!("option \"{o}\" for \"{prefix}\" is repeated"));
                    }
                }
                Ok(())
            },
            Matcher::Index { prefix } => check_prefix(prefix),
            _ => Ok(()),
        }
    }

    /// True if some event would be accepted by both
    pub(crate) fn overlaps(&self, other: &Matcher) -> bool {
        match (self, other) {
            (Matcher::Text, Matcher::Text) => true,
            (Matcher::Location, Matcher::Location) => true,
            (Matcher::Media, Matcher::Media) => true,
            (Matcher::Choice { prefix: p1, options: o1 },
             Matcher::Choice { prefix: p2, options: o2 }) => {
                p1 == p2 &&
                    (o1.is_empty() || o2.is_empty() || o1.iter().any(|o| o2.contains(o)))
            },
            (Matcher::Index { prefix: p1 }, Matcher::Index { prefix: p2 }) => p1 == p2,
            (Matcher::Index { prefix: p1 }, Matcher::Choice { prefix: p2, .. }) |
            (Matcher::Choice { prefix: p2, .. }, Matcher::Index { prefix: p1 }) => p1 == p2,
            _ => false,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Text => write!(f, "text"),
            Matcher::Choice { prefix, options } if options.is_empty() =>
                write!(f, "\"{prefix} *\""),
            Matcher::Choice { prefix, options } =>
                write!(f, "\"{prefix} {}\"", options.join("|")),
            Matcher::Index { prefix } => write!(f, "\"{prefix} <n>\""),
            Matcher::Location => write!(f, "location"),
            Matcher::Media => write!(f, "media"),
        }
    }
}

/// Value of `"<prefix> <value>"`, None on any other shape
fn split_token<'a>(prefix: &str, token: &'a str) -> Option<&'a str> {
    let mut args = token.split(' ');
    let magic = args.next()?;
    if magic != prefix { return None }
    let value = args.next()?;
    // Too many arguments
    if args.next().is_some() { return None }
    if value.is_empty() { return None }
    Some(value)
}
