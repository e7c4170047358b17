//! The closed error taxonomy of the subsystem.
//!
//! Each error is reported once per offending expression, never duplicated
//! per sub-element, and carries the source span. Ambiguity and
//! no-conversion cases name the competing candidates. There are no
//! retries: recovery is the programmer correcting the source.

use crate::escape::EscapeScope;
use opal_core::span::Span;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CollectError {
    #[error("{span}: type `{target}` cannot be constructed from a collection literal")]
    NotConstructibleTarget { span: Span, target: String },

    #[error("{span}: a collection literal has no type of its own; this context provides no target type")]
    NoTargetType { span: Span },

    #[error("{span}: element of type `{found}` has no implicit conversion to element type `{expected}`")]
    ElementConversionFailed {
        span: Span,
        found: String,
        expected: String,
    },

    #[error("{span}: no applicable `add` overload on `{target}` accepts an element of type `{found}`")]
    AddOverloadFailed {
        span: Span,
        target: String,
        found: String,
    },

    #[error("{span}: ambiguous `add` overload on `{target}`; candidates: {}", candidates.join(", "))]
    AmbiguousAddOverload {
        span: Span,
        target: String,
        candidates: Vec<String>,
    },

    #[error("{span}: builder method `{method}` on `{target}` is missing, inaccessible, or has the wrong shape")]
    BuilderMethodNotFound {
        span: Span,
        target: String,
        method: String,
    },

    #[error("{span}: neither `{left}` nor `{right}` is a better collection destination")]
    AmbiguousBetterness {
        span: Span,
        left: String,
        right: String,
    },

    #[error("{span}: a stack-only buffer for `{target}` cannot live as long as its {required} consumer requires")]
    EscapeError {
        span: Span,
        target: String,
        required: EscapeScope,
    },

    #[error("{span}: spread source of type `{found}` is not enumerable")]
    EnumerationError { span: Span, found: String },
}

impl CollectError {
    pub fn span(&self) -> Span {
        match self {
            CollectError::NotConstructibleTarget { span, .. }
            | CollectError::NoTargetType { span }
            | CollectError::ElementConversionFailed { span, .. }
            | CollectError::AddOverloadFailed { span, .. }
            | CollectError::AmbiguousAddOverload { span, .. }
            | CollectError::BuilderMethodNotFound { span, .. }
            | CollectError::AmbiguousBetterness { span, .. }
            | CollectError::EscapeError { span, .. }
            | CollectError::EnumerationError { span, .. } => *span,
        }
    }

    /// Errors that abort the binding attempt outright, with no fallback
    /// to another destination shape or strategy.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CollectError::EscapeError { .. } | CollectError::BuilderMethodNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CollectError>;
