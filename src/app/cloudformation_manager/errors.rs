//! Typed CloudFormation failures.
//!
//! CloudFormation reports most of its interesting conditions as a single
//! `ValidationError` whose only distinguishing feature is the message text.
//! [`translate`] turns that prose into a [`StackError`] variant the
//! orchestrator can act on. Translation happens once, where an [`ApiError`]
//! first crosses into orchestrator code, via the `From` impl below, so a plain
//! `?` is enough at every call site.

use crate::app::source::SourceError;
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

/// Result type alias for stack operations.
pub type Result<T> = std::result::Result<T, StackError>;

/// Raw failure reported by the CloudFormation API, before translation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub const VALIDATION_ERROR: &'static str = "ValidationError";
    pub const CHANGE_SET_NOT_FOUND: &'static str = "ChangeSetNotFound";

    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// A generic `ValidationError` carrying `message`.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(Self::VALIDATION_ERROR, message)
    }

    /// The failure CloudFormation reports when `stack` is unknown.
    pub fn stack_does_not_exist(stack: &str) -> Self {
        Self::validation(format!("Stack with id {} does not exist", stack))
    }

    pub fn is_validation(&self) -> bool {
        self.code == Self::VALIDATION_ERROR
    }

    pub fn is_change_set_not_found(&self) -> bool {
        self.code == Self::CHANGE_SET_NOT_FOUND || self.code == "ChangeSetNotFoundException"
    }
}

/// Failures surfaced by stack and change-set operations.
#[derive(Debug, Error)]
pub enum StackError {
    /// The named stack does not exist.
    #[error("no such stack")]
    NoSuchStack,

    /// The named change-set does not exist.
    #[error("no such change-set")]
    NoSuchChangeSet,

    /// The requested update would not change anything.
    #[error("no updates are required")]
    NoUpdateRequired,

    /// The operation is not valid for the stack's current state.
    #[error("{0}")]
    InvalidState(String),

    /// Any other request CloudFormation rejected as malformed.
    #[error("{0}")]
    Validation(String),

    /// An accepted operation converged on a failed or unexpected status.
    #[error("{0}")]
    StackUpdate(String),

    /// Caller-supplied data could not be turned into a request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Provider failure that is not a validation failure, passed through untouched.
    #[error(transparent)]
    Api(ApiError),

    /// A template returned by CloudFormation could not be parsed.
    #[error(transparent)]
    Source(#[from] SourceError),
}

impl StackError {
    /// True for the conditions that mean "the thing you asked about is not there".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StackError::NoSuchStack | StackError::NoSuchChangeSet)
    }
}

impl From<ApiError> for StackError {
    fn from(err: ApiError) -> Self {
        translate(err)
    }
}

const NO_UPDATES_MESSAGE: &str = "No updates are to be performed.";

static STACK_DOES_NOT_EXIST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Stack .* does not exist$").expect("valid regex"));

static INVALID_STATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bcan ?not be\b").expect("valid regex"));

/// Classify a raw API failure.
///
/// | message | result |
/// |---|---|
/// | `No updates are to be performed.` | [`StackError::NoUpdateRequired`] |
/// | `Stack ... does not exist` | [`StackError::NoSuchStack`] |
/// | `... cannot be ...` / `... can not be ...` | [`StackError::InvalidState`] |
/// | anything else | [`StackError::Validation`] |
///
/// A `ChangeSetNotFound` failure becomes [`StackError::NoSuchChangeSet`].
/// Failures with any other code are wrapped in [`StackError::Api`] unchanged.
pub fn translate(err: ApiError) -> StackError {
    if err.is_change_set_not_found() {
        return StackError::NoSuchChangeSet;
    }
    if !err.is_validation() {
        return StackError::Api(err);
    }

    let message = err.message;
    if message == NO_UPDATES_MESSAGE {
        StackError::NoUpdateRequired
    } else if STACK_DOES_NOT_EXIST.is_match(&message) {
        StackError::NoSuchStack
    } else if INVALID_STATE.is_match(&message) {
        StackError::InvalidState(message)
    } else {
        StackError::Validation(message)
    }
}
