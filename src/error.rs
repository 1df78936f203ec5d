//! Error types shared by schema building and argument resolution.

use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Boxed error returned by user-supplied converters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Shared, cloneable cause attached to a [`ParseError`].
pub type Cause = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// Programmer errors detected while freezing a schema.
///
/// These never surface at parse time: a schema that built successfully can
/// only produce [`ParseErrors`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("duplicate argument name: {0}")]
    DuplicateName(String),

    #[error("schema '{0}' has no arguments")]
    EmptySchema(String),

    #[error("argument '{0}' has no help text")]
    MissingHelp(String),

    #[error("argument '{0}' has neither a short nor a long name")]
    MissingName(String),

    #[error("argument '{0}' is not string-typed and has no converter")]
    MissingConverter(String),

    #[error("only one multi-value argument is allowed, found '{0}' and '{1}'")]
    MultipleMultiValues(String, String),

    #[error("dependency of '{slot}' on '{field}' has no predicate")]
    MissingPredicate { slot: String, field: String },

    #[error("dependency of '{slot}' on '{field}' has more than one predicate")]
    PredicateAlreadyAssigned { slot: String, field: String },

    #[error("dependency of '{slot}' references unknown field '{field}'")]
    UnknownDependencyField { slot: String, field: String },

    #[error("argument '{0}' has a dependency on its own field")]
    SelfDependency(String),

    #[error("argument '{0}' has an empty dependency set")]
    EmptyDependencySet(String),

    #[error("duplicate verb name: {0}")]
    DuplicateVerb(String),

    #[error("no verbs registered")]
    NoVerbs,
}

/// Where a parse failure was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The first token did not name a registered verb.
    InvalidVerb,
    /// The reserved help token was present.
    HelpRequested,
    /// A token matched no slot, or matched an ignored prefix.
    UnexpectedArgument,
    /// A named option was the last token and had no value.
    MissingOptionValue,
    MissingRequiredValue,
    MissingRequiredOption,
    MissingRequiredSwitch,
    MissingRequiredMultiValue,
    ValueFailedConversion,
    OptionFailedConversion,
    MultiValueFailedConversion,
    ValueFailedValidation,
    OptionFailedValidation,
    MultiValueFailedValidation,
    /// A dependency rule required the argument, but it was absent.
    DependencyRequired,
    /// A dependency rule forbade the argument, but it was present.
    DependencyMustNotAppear,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A single failure produced while resolving tokens.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ParseError {
    code: ErrorCode,
    message: String,
    #[source]
    cause: Option<Cause>,
}

impl ParseError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            cause: None,
        }
    }

    pub fn with_cause(code: ErrorCode, message: impl Into<String>, cause: Cause) -> Self {
        Self {
            code,
            message: message.into(),
            cause: Some(cause),
        }
    }

    pub(crate) fn help_requested() -> Self {
        Self::new(ErrorCode::HelpRequested, "")
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn cause(&self) -> Option<&Cause> {
        self.cause.as_ref()
    }
}

/// The failure side of a parse: a non-empty, ordered list of errors.
#[derive(Debug, Clone, Error)]
#[error("{}", render_errors(.errors))]
pub struct ParseErrors {
    verb: Option<String>,
    errors: Vec<ParseError>,
}

fn render_errors(errors: &[ParseError]) -> String {
    errors
        .iter()
        .map(|e| e.message())
        .filter(|m| !m.is_empty())
        .collect::<Vec<_>>()
        .join("; ")
}

impl ParseErrors {
    /// Returns `None` for an empty list so the non-empty invariant holds.
    pub(crate) fn from_vec(errors: Vec<ParseError>) -> Option<Self> {
        if errors.is_empty() {
            None
        } else {
            Some(Self { verb: None, errors })
        }
    }

    pub(crate) fn single(error: ParseError) -> Self {
        Self {
            verb: None,
            errors: vec![error],
        }
    }

    pub(crate) fn in_verb(mut self, verb: &str) -> Self {
        self.verb = Some(verb.to_string());
        self
    }

    /// Name of the verb whose schema produced these errors, if any.
    pub fn verb(&self) -> Option<&str> {
        self.verb.as_deref()
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    /// A failed parse carries at least one error, so this is false.
    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn contains(&self, code: ErrorCode) -> bool {
        self.errors.iter().any(|e| e.code == code)
    }

    pub fn is_help_requested(&self) -> bool {
        self.contains(ErrorCode::HelpRequested)
    }

    pub fn into_vec(self) -> Vec<ParseError> {
        self.errors
    }
}

impl IntoIterator for ParseErrors {
    type Item = ParseError;
    type IntoIter = std::vec::IntoIter<ParseError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}
