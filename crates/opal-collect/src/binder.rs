//! The binding facade the host expression binder calls.
//!
//! One `CollectionBinder` serves one binding session: it memoizes target
//! classification, accumulates diagnostics for the host's sink, and runs
//! the full pipeline from literal syntax to a construction plan.

use crate::convert::convert_elements;
use crate::element::{build_elements, ElementPlan};
use crate::error::CollectError;
use crate::escape::ConsumeContext;
use crate::plan::{build_plan, ConstructionPlan, PlanRequest};
use crate::relation::{self, Betterness};
use crate::shape::{classify, DestinationShape};
use opal_core::ast::CollectionLiteralSyntax;
use opal_core::diagnostics::Diagnostic;
use opal_core::types::Ty;
use opal_core::Compilation;
use std::collections::HashMap;
use tracing::debug;

pub struct CollectionBinder<'a> {
    comp: &'a Compilation,
    shapes: HashMap<Ty, DestinationShape>,
    diagnostics: Vec<Diagnostic>,
    inline_cap: usize,
}

impl<'a> CollectionBinder<'a> {
    pub fn new(comp: &'a Compilation) -> Self {
        CollectionBinder {
            comp,
            shapes: HashMap::new(),
            diagnostics: Vec::new(),
            inline_cap: opal_core::config::inline_buffer_cap(),
        }
    }

    /// Override the stack-inline element cap, mainly for tests.
    pub fn with_inline_capacity(mut self, cap: usize) -> Self {
        self.inline_cap = cap;
        self
    }

    /// Bind one literal against its target type. On failure every
    /// diagnostic is recorded and the first error is returned; fatal
    /// errors (`is_fatal`) admit no retry against another shape.
    pub fn bind(
        &mut self,
        literal: &CollectionLiteralSyntax,
        target: &Ty,
        consume: ConsumeContext,
        crosses_suspension: bool,
    ) -> Result<ConstructionPlan, CollectError> {
        let elements = build_elements(self.comp, literal);
        let shape = self.shape_of(target);
        if !shape.is_constructible() {
            return Err(self.report(CollectError::NotConstructibleTarget {
                span: literal.span,
                target: self.comp.display_ty(target),
            }));
        }

        let conversion = match convert_elements(self.comp, &elements, &shape) {
            Ok(conversion) => conversion,
            Err(errors) => {
                let first = errors[0].clone();
                for err in errors {
                    self.push(err);
                }
                return Err(first);
            }
        };

        let request = PlanRequest {
            comp: self.comp,
            elements: &elements,
            shape: &shape,
            conversion: &conversion,
            target,
            consume,
            crosses_suspension,
            inline_cap: self.inline_cap,
        };
        match build_plan(&request) {
            Ok(plan) => {
                debug!(dest = %self.comp.display_ty(target), "literal bound");
                Ok(plan)
            }
            Err(err) => Err(self.report(err)),
        }
    }

    /// Whether the literal converts to `target` at all; used by overload
    /// applicability. Never emits diagnostics.
    pub fn conversion_exists(&mut self, literal: &CollectionLiteralSyntax, target: &Ty) -> bool {
        let elements = build_elements(self.comp, literal);
        relation::literal_conversion_exists(self.comp, &elements, target)
    }

    /// Three-way betterness between two candidate destination types.
    pub fn better_candidate(
        &mut self,
        literal: &CollectionLiteralSyntax,
        left: &Ty,
        right: &Ty,
    ) -> Betterness {
        let elements = build_elements(self.comp, literal);
        relation::compare_candidates(self.comp, &elements, left, right)
    }

    /// The element type this literal contributes to type inference, when
    /// its elements agree on one.
    pub fn infer_element_type(&mut self, literal: &CollectionLiteralSyntax) -> Option<Ty> {
        let elements = build_elements(self.comp, literal);
        relation::infer_element_type(self.comp, &elements)
    }

    /// The error for a context that supplies no target type at all.
    pub fn missing_target_type(&mut self, literal: &CollectionLiteralSyntax) -> CollectError {
        let elements = build_elements(self.comp, literal);
        let err = relation::require_target_type(&elements);
        self.report(err)
    }

    /// The error the host reports when betterness returned `Neither` and
    /// no other rule breaks the tie.
    pub fn ambiguous_candidates(
        &mut self,
        literal: &CollectionLiteralSyntax,
        left: &Ty,
        right: &Ty,
    ) -> CollectError {
        self.report(CollectError::AmbiguousBetterness {
            span: literal.span,
            left: self.comp.display_ty(left),
            right: self.comp.display_ty(right),
        })
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn shape_of(&mut self, target: &Ty) -> DestinationShape {
        let comp = self.comp;
        self.shapes
            .entry(target.clone())
            .or_insert_with(|| classify(comp, target))
            .clone()
    }

    fn report(&mut self, err: CollectError) -> CollectError {
        self.push(err.clone());
        err
    }

    fn push(&mut self, err: CollectError) {
        let diag = Diagnostic::error(err.to_string())
            .with_span(err.span())
            .with_code(error_code(&err));
        self.diagnostics.push(diag);
    }
}

fn error_code(err: &CollectError) -> &'static str {
    match err {
        CollectError::NotConstructibleTarget { .. } => "not-constructible-target",
        CollectError::NoTargetType { .. } => "no-target-type",
        CollectError::ElementConversionFailed { .. } => "element-conversion-failed",
        CollectError::AddOverloadFailed { .. } => "add-overload-failed",
        CollectError::AmbiguousAddOverload { .. } => "ambiguous-add-overload",
        CollectError::BuilderMethodNotFound { .. } => "builder-method-not-found",
        CollectError::AmbiguousBetterness { .. } => "ambiguous-betterness",
        CollectError::EscapeError { .. } => "escape-error",
        CollectError::EnumerationError { .. } => "enumeration-error",
    }
}

/// Convenience entry point for hosts that bind one literal at a time.
pub fn bind_literal(
    comp: &Compilation,
    literal: &CollectionLiteralSyntax,
    target: &Ty,
    consume: ConsumeContext,
) -> Result<ConstructionPlan, CollectError> {
    CollectionBinder::new(comp).bind(literal, target, consume, false)
}

/// The normalized element plan for a literal, for hosts that inspect
/// elements before committing to a target.
pub fn elements_of(comp: &Compilation, literal: &CollectionLiteralSyntax) -> ElementPlan {
    build_elements(comp, literal)
}
