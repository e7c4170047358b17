//! Escape checker: validates stack-only strategies against the
//! destination's required lifetime.
//!
//! Only `Span`, `ReadOnlySpan`, and `Builder` shapes are checked, since
//! realizing those may need a compiler-managed stack buffer. A strategy
//! whose buffer cannot satisfy the required scope is illegal; when no
//! legal strategy remains the error is fatal, with no silent fallback to
//! a different destination shape.

use crate::error::CollectError;
use crate::shape::DestinationShape;
use opal_core::span::Span;
use opal_core::types::Ty;
use opal_core::Compilation;

/// How long a stack-only value may live, narrowest first. The ordering is
/// total: a buffer providing a scope satisfies every narrower requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum EscapeScope {
    /// The current statement only.
    Statement,
    /// The current block.
    Block,
    /// The duration of an enclosing call the value is passed to.
    Callee,
    /// Observable by the caller after this method returns.
    CallerVisible,
}

impl std::fmt::Display for EscapeScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EscapeScope::Statement => "current-statement",
            EscapeScope::Block => "current-block",
            EscapeScope::Callee => "enclosing-call",
            EscapeScope::CallerVisible => "caller-visible",
        };
        write!(f, "{}", s)
    }
}

/// How the surrounding code consumes the constructed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeContext {
    /// Evaluated and discarded within one statement.
    ExpressionStatement,
    /// Assigned to a local or parameter: at most its declaring scope.
    AssignedToLocal,
    /// Passed as an ordinary argument: callee scope is sufficient.
    PassedAsArgument,
    /// Returned by value. A `scoped` qualifier on the signature narrows
    /// the requirement back to callee scope.
    ReturnedByValue { scoped_signature: bool },
}

pub fn required_scope(consume: ConsumeContext) -> EscapeScope {
    match consume {
        ConsumeContext::ExpressionStatement => EscapeScope::Statement,
        ConsumeContext::AssignedToLocal => EscapeScope::Block,
        ConsumeContext::PassedAsArgument => EscapeScope::Callee,
        ConsumeContext::ReturnedByValue { scoped_signature } => {
            if scoped_signature {
                EscapeScope::Callee
            } else {
                EscapeScope::CallerVisible
            }
        }
    }
}

/// What the checker concludes for one construction site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscapeAnalysis {
    pub required: EscapeScope,
    /// Whether a fixed-capacity stack buffer may back the value here.
    pub stack_buffer_legal: bool,
}

/// Validate the destination against its consumption context.
///
/// `constant_data_eligible` says whether every element is a compile-time
/// constant of a flat element type: a read-only view over a shared
/// constant blob lives for the whole program and satisfies any scope.
pub fn analyze(
    comp: &Compilation,
    shape: &DestinationShape,
    target: &Ty,
    span: Span,
    consume: ConsumeContext,
    constant_data_eligible: bool,
) -> Result<EscapeAnalysis, CollectError> {
    let required = required_scope(consume);
    if !shape.needs_escape_check() {
        return Ok(EscapeAnalysis {
            required,
            stack_buffer_legal: true,
        });
    }

    let widest = match shape {
        // The built value is an ordinary object; the contiguous-view
        // temporary is consumed inside the builder invocation.
        DestinationShape::Builder(_) => EscapeScope::CallerVisible,
        DestinationShape::ReadOnlySpan { .. } if constant_data_eligible => {
            EscapeScope::CallerVisible
        }
        // A view over a compiler-managed buffer is method-scoped no
        // matter where the buffer lives; degrading to a heap backing
        // does not widen what the view may observe.
        DestinationShape::Span { .. } | DestinationShape::ReadOnlySpan { .. } => {
            EscapeScope::Callee
        }
        _ => unreachable!("needs_escape_check covered the other shapes"),
    };

    if required > widest {
        return Err(CollectError::EscapeError {
            span,
            target: comp.display_ty(target),
            required,
        });
    }
    Ok(EscapeAnalysis {
        required,
        stack_buffer_legal: required <= EscapeScope::Callee,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::classify;

    #[test]
    fn scope_order_is_total_and_narrowest_first() {
        assert!(EscapeScope::Statement < EscapeScope::Block);
        assert!(EscapeScope::Block < EscapeScope::Callee);
        assert!(EscapeScope::Callee < EscapeScope::CallerVisible);
    }

    #[test]
    fn returning_a_span_of_locals_is_rejected() {
        let comp = Compilation::default();
        let target = Ty::span(Ty::i32());
        let shape = classify(&comp, &target);
        let err = analyze(
            &comp,
            &shape,
            &target,
            Span::synthetic(),
            ConsumeContext::ReturnedByValue {
                scoped_signature: false,
            },
            false,
        )
        .unwrap_err();
        assert!(matches!(err, CollectError::EscapeError { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn returning_a_constant_read_only_span_is_fine() {
        let comp = Compilation::default();
        let target = Ty::read_only_span(Ty::i32());
        let shape = classify(&comp, &target);
        let analysis = analyze(
            &comp,
            &shape,
            &target,
            Span::synthetic(),
            ConsumeContext::ReturnedByValue {
                scoped_signature: false,
            },
            true,
        )
        .expect("constant data satisfies any scope");
        // The blob escapes, but a stack buffer still may not.
        assert!(!analysis.stack_buffer_legal);
    }

    #[test]
    fn argument_consumption_permits_stack_buffers() {
        let comp = Compilation::default();
        let target = Ty::span(Ty::i32());
        let shape = classify(&comp, &target);
        let analysis = analyze(
            &comp,
            &shape,
            &target,
            Span::synthetic(),
            ConsumeContext::PassedAsArgument,
            false,
        )
        .expect("callee scope is sufficient");
        assert!(analysis.stack_buffer_legal);
        assert_eq!(analysis.required, EscapeScope::Callee);
    }

    #[test]
    fn scoped_signature_narrows_a_return() {
        let comp = Compilation::default();
        let target = Ty::span(Ty::i32());
        let shape = classify(&comp, &target);
        assert!(analyze(
            &comp,
            &shape,
            &target,
            Span::synthetic(),
            ConsumeContext::ReturnedByValue {
                scoped_signature: true,
            },
            false,
        )
        .is_ok());
    }
}
