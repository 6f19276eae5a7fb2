use thiserror::Error;

use crate::role_gate::SubjectId;

/// Error of collaborators: handlers, stores, telegram calls
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Something is wrong with a flow definition.
///
/// These are found by `StateRegistry::register_flow` and must stop the
/// process from starting.
#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("flow \"{0}\" is already registered")]
    DuplicateFlow(String),

    #[error("flow \"{flow}\" declares state \"{state}\" twice")]
    DuplicateState { flow: String, state: String },

    #[error("flow \"{flow}\" refers to undeclared state \"{state}\"")]
    UnknownState { flow: String, state: String },

    #[error("state \"{state}\" of flow \"{flow}\" can't be reached from \"{initial}\"")]
    UnreachableState { flow: String, state: String, initial: String },

    /// Non-terminal state without a single outgoing transition
    #[error("state \"{state}\" of flow \"{flow}\" has no outgoing transitions")]
    DeadEndState { flow: String, state: String },

    #[error("state \"{state}\" of flow \"{flow}\" has two transitions accepting {matcher}")]
    AmbiguousTransition { flow: String, state: String, matcher: String },

    #[error("flow \"{flow}\": {reason}")]
    InvalidMatcher { flow: String, reason: String },
}

/// Why a single step could not be applied.
///
/// `Engine::dispatch` converts all of these into an `Outcome`, none of them
/// reach the transport.
#[derive(Error, Debug)]
pub enum StepError {
    #[error("flow \"{0}\" is not registered")]
    UnknownFlow(String),

    #[error("nothing in state \"{state}\" of flow \"{flow}\" accepts {event}")]
    NoMatchingTransition { flow: String, state: String, event: String },

    #[error("handler of state \"{state}\" failed: {source}")]
    HandlerFailure {
        state: String,
        #[source]
        source: Error,
    },

    #[error("context store: {0}")]
    Store(#[source] Error),
}

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum RoleLookupError {
    #[error("subject {0} is unknown")]
    NotFound(SubjectId),

    #[error("role lookup failed: {0}")]
    Backend(String),
}
