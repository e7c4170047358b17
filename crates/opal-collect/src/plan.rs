//! Construction planner: a short state machine choosing the codegen
//! strategy for a successfully converted literal.
//!
//! `ClassifyLength -> SelectBuffer -> SelectFinalForm`. Failure at any
//! earlier component aborts before a side-effecting plan exists; the
//! produced plan is read-only to code generation and preserves the
//! textual element order exactly.

use crate::convert::ConversionResult;
use crate::element::{Element, ElementPlan};
use crate::error::CollectError;
use crate::escape::{self, ConsumeContext};
use crate::shape::DestinationShape;
use crate::synth;
use opal_core::context::{BackingKind, ConstantBlob, EmptyInstance, SynthesizedWrapper};
use opal_core::types::Ty;
use opal_core::Compilation;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemporaryKind {
    None,
    /// Fixed-capacity inline buffer in the current frame.
    StackInline,
    HeapArray,
    HeapList,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    /// Reuse the compilation-wide zero-length instance; no allocation.
    SharedEmpty { instance: Arc<EmptyInstance> },
    /// View or copy one shared constant data blob; no per-index stores.
    ConstantBlob { blob: Arc<ConstantBlob> },
    /// Exact-count inline buffer, store each element by index.
    StackInline { capacity: usize },
    /// Exact-size heap array, store each element by index.
    HeapArrayExact { len: usize },
    /// Construct with exact capacity, invoke `add` once per element.
    CapacityAdd { capacity: usize },
    /// Construct empty, grow to the exact size, store by index.
    GrowSetIndex { len: usize },
    /// Construct empty and add left-to-right, optionally converting to a
    /// fixed final form once at the end. The fallback whenever no
    /// exact-size buffer is possible or useful.
    Accumulate { fix_to_final: bool },
    /// Materialize a read-only view, then invoke the builder method
    /// exactly once.
    Builder {
        method: String,
        materialize: Box<ConstructionPlan>,
    },
    /// Plan the inner shape, then wrap the result.
    NullableWrap { inner: Box<ConstructionPlan> },
}

/// One emission step, indexed by the literal's textual element position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitOp {
    EvalValue { element: usize },
    StoreIndex { element: usize },
    AddCall { element: usize },
    /// Iterate the spread source, storing each produced item by index.
    DrainSpreadStore { element: usize },
    /// Iterate the spread source, adding each produced item.
    DrainSpreadAdd { element: usize },
    /// Convert the accumulated collection to the fixed final form.
    ConvertToFinal,
    InvokeBuilder,
    WrapNullable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConstructionPlan {
    pub strategy: Strategy,
    pub length_known: bool,
    pub temporary: TemporaryKind,
    pub per_element_emit: Vec<EmitOp>,
    /// The synthesized adapter for interface destinations.
    pub wrapper: Option<Arc<SynthesizedWrapper>>,
}

pub struct PlanRequest<'a> {
    pub comp: &'a Compilation,
    pub elements: &'a ElementPlan,
    pub shape: &'a DestinationShape,
    pub conversion: &'a ConversionResult,
    pub target: &'a Ty,
    pub consume: ConsumeContext,
    /// Whether the enclosing method body is crossed by a suspension point
    /// while the temporary would be live. This one fact is all the
    /// planner needs from coroutine lowering.
    pub crosses_suspension: bool,
    pub inline_cap: usize,
}

pub fn build_plan(req: &PlanRequest<'_>) -> Result<ConstructionPlan, CollectError> {
    plan_shape(req, req.shape, req.target, req.consume)
}

fn plan_shape(
    req: &PlanRequest<'_>,
    shape: &DestinationShape,
    target: &Ty,
    consume: ConsumeContext,
) -> Result<ConstructionPlan, CollectError> {
    let comp = req.comp;
    let elements = req.elements;

    match shape {
        DestinationShape::NotConstructible => Err(CollectError::NotConstructibleTarget {
            span: elements.span,
            target: comp.display_ty(target),
        }),

        DestinationShape::Nullable { inner } => {
            let inner_target = match target {
                Ty::Nullable(inner_ty) => inner_ty.as_ref(),
                other => other,
            };
            let inner_plan = plan_shape(req, inner, inner_target, consume)?;
            Ok(ConstructionPlan {
                length_known: inner_plan.length_known,
                temporary: inner_plan.temporary,
                wrapper: inner_plan.wrapper.clone(),
                per_element_emit: vec![EmitOp::WrapNullable],
                strategy: Strategy::NullableWrap {
                    inner: Box::new(inner_plan),
                },
            })
        }

        DestinationShape::Builder(builder) => {
            let Some(method) = builder.method.clone() else {
                return Err(CollectError::BuilderMethodNotFound {
                    span: elements.span,
                    target: comp.display_ty(target),
                    method: declared_builder_method(comp, target),
                });
            };
            // The view is consumed by the builder invocation itself, so
            // its required scope is the callee's.
            let view = DestinationShape::ReadOnlySpan {
                elem: builder.elem.clone(),
            };
            let view_ty = Ty::read_only_span(builder.elem.clone());
            let materialize =
                plan_shape(req, &view, &view_ty, ConsumeContext::PassedAsArgument)?;
            debug!(dest = %comp.display_ty(target), %method, "builder strategy");
            Ok(ConstructionPlan {
                length_known: materialize.length_known,
                temporary: materialize.temporary,
                wrapper: None,
                per_element_emit: vec![EmitOp::InvokeBuilder],
                strategy: Strategy::Builder {
                    method,
                    materialize: Box::new(materialize),
                },
            })
        }

        _ => plan_concrete(req, shape, target, consume),
    }
}

/// The method name the opt-in attribute declared, for the not-found
/// diagnostic.
fn declared_builder_method(comp: &Compilation, target: &Ty) -> String {
    let attr = match target {
        Ty::Named(id) => comp
            .registry()
            .get(*id)
            .and_then(|def| def.builder.as_ref()),
        _ => None,
    };
    attr.map(|attr| attr.method.clone())
        .unwrap_or_else(|| "<unknown>".to_string())
}

/// `ClassifyLength -> SelectBuffer -> SelectFinalForm` for the
/// non-recursive shapes.
fn plan_concrete(
    req: &PlanRequest<'_>,
    shape: &DestinationShape,
    target: &Ty,
    consume: ConsumeContext,
) -> Result<ConstructionPlan, CollectError> {
    let comp = req.comp;
    let elements = req.elements;
    let known_total = elements.known_total();
    let constant_values = constant_element_values(elements);
    let blob_eligible = constant_values
        .as_ref()
        .is_some_and(|values| {
            !values.is_empty()
                && shape
                    .element_ty()
                    .and_then(|elem| synth::blob_element_width(comp, elem))
                    .is_some()
        });

    let wrapper = match shape {
        DestinationShape::InterfaceAdapter { backing, elem, .. } => {
            Some(synth::wrapper_for(comp, *backing, elem))
        }
        _ => None,
    };

    // Zero elements over a fixed-form destination: the shared empty
    // instance, no allocation at all.
    if known_total == Some(0) && reuses_shared_empty(shape) {
        let elem = shape.element_ty().expect("constructible shape").clone();
        debug!(dest = %comp.display_ty(target), "shared-empty strategy");
        return Ok(ConstructionPlan {
            strategy: Strategy::SharedEmpty {
                instance: comp.empty_instance(&elem),
            },
            length_known: true,
            temporary: TemporaryKind::None,
            per_element_emit: Vec::new(),
            wrapper,
        });
    }

    // All elements compile-time constants of a flat type over a
    // contiguous destination: one shared blob, no per-index stores. A
    // read-only view aliases the blob and an array copies from it
    // wholesale; a writable view block-copies it into a fresh buffer.
    if let Some(total) = known_total.filter(|_| blob_eligible && blob_viewable(shape)) {
        let values = constant_values.expect("blob eligibility implies constants");
        let elem = shape.element_ty().expect("constructible shape");
        let blob = synth::intern_constant_blob(comp, elem, &values)
            .expect("width checked by eligibility");
        // Escape still applies: constant data widens only the read-only
        // view.
        let analysis = escape::analyze(comp, shape, target, elements.span, consume, true)?;
        let temporary = match shape {
            DestinationShape::Span { .. } => {
                let stack_ok = analysis.stack_buffer_legal
                    && !req.crosses_suspension
                    && total <= req.inline_cap;
                if stack_ok {
                    TemporaryKind::StackInline
                } else {
                    TemporaryKind::HeapArray
                }
            }
            _ => TemporaryKind::None,
        };
        debug!(dest = %comp.display_ty(target), len = blob.len, "constant-blob strategy");
        return Ok(ConstructionPlan {
            strategy: Strategy::ConstantBlob { blob },
            length_known: true,
            temporary,
            per_element_emit: Vec::new(),
            wrapper,
        });
    }

    let analysis = escape::analyze(comp, shape, target, elements.span, consume, false)?;

    let Some(total) = known_total else {
        // Unknown length: accumulate every element left-to-right, then
        // convert once for fixed-form destinations.
        let fix_to_final = needs_final_fix(shape);
        let mut emit = add_style_emit(elements);
        if fix_to_final {
            emit.push(EmitOp::ConvertToFinal);
        }
        debug!(dest = %comp.display_ty(target), fix_to_final, "accumulate strategy");
        return Ok(ConstructionPlan {
            strategy: Strategy::Accumulate { fix_to_final },
            length_known: false,
            temporary: TemporaryKind::HeapList,
            per_element_emit: emit,
            wrapper,
        });
    };

    // Known length: pick the buffer, then the final form.
    let plan = match shape {
        DestinationShape::Span { .. } | DestinationShape::ReadOnlySpan { .. } => {
            let stack_ok =
                analysis.stack_buffer_legal && !req.crosses_suspension && total <= req.inline_cap;
            if stack_ok {
                ConstructionPlan {
                    strategy: Strategy::StackInline { capacity: total },
                    length_known: true,
                    temporary: TemporaryKind::StackInline,
                    per_element_emit: store_style_emit(elements),
                    wrapper: None,
                }
            } else {
                ConstructionPlan {
                    strategy: Strategy::HeapArrayExact { len: total },
                    length_known: true,
                    temporary: TemporaryKind::HeapArray,
                    per_element_emit: store_style_emit(elements),
                    wrapper: None,
                }
            }
        }

        DestinationShape::Array { .. } => ConstructionPlan {
            strategy: Strategy::HeapArrayExact { len: total },
            length_known: true,
            temporary: TemporaryKind::None,
            per_element_emit: store_style_emit(elements),
            wrapper: None,
        },

        DestinationShape::InterfaceAdapter { backing, .. } => match backing {
            BackingKind::Array => ConstructionPlan {
                strategy: Strategy::HeapArrayExact { len: total },
                length_known: true,
                temporary: TemporaryKind::HeapArray,
                per_element_emit: store_style_emit(elements),
                wrapper,
            },
            BackingKind::List => ConstructionPlan {
                strategy: Strategy::CapacityAdd { capacity: total },
                length_known: true,
                temporary: TemporaryKind::HeapList,
                per_element_emit: add_style_emit(elements),
                wrapper,
            },
        },

        DestinationShape::Initializer(init) => {
            // Grow-then-store when the type offers it, capacity plus adds
            // when it can presize, a plain add loop otherwise. All three
            // are observably identical.
            if init.grow_capability {
                ConstructionPlan {
                    strategy: Strategy::GrowSetIndex { len: total },
                    length_known: true,
                    temporary: TemporaryKind::None,
                    per_element_emit: store_style_emit(elements),
                    wrapper: None,
                }
            } else if init.has_capacity_ctor {
                ConstructionPlan {
                    strategy: Strategy::CapacityAdd { capacity: total },
                    length_known: true,
                    temporary: TemporaryKind::None,
                    per_element_emit: add_style_emit(elements),
                    wrapper: None,
                }
            } else {
                ConstructionPlan {
                    strategy: Strategy::Accumulate { fix_to_final: false },
                    length_known: true,
                    temporary: TemporaryKind::None,
                    per_element_emit: add_style_emit(elements),
                    wrapper: None,
                }
            }
        }

        DestinationShape::NotConstructible
        | DestinationShape::Nullable { .. }
        | DestinationShape::Builder(_) => unreachable!("handled by plan_shape"),
    };
    debug!(
        dest = %comp.display_ty(target),
        strategy = ?plan.strategy,
        "construction strategy selected"
    );
    Ok(plan)
}

fn reuses_shared_empty(shape: &DestinationShape) -> bool {
    match shape {
        DestinationShape::Array { .. }
        | DestinationShape::Span { .. }
        | DestinationShape::ReadOnlySpan { .. } => true,
        DestinationShape::InterfaceAdapter { interface, .. } => interface.is_read_only(),
        _ => false,
    }
}

/// Destinations a constant blob can serve without per-index stores.
fn blob_viewable(shape: &DestinationShape) -> bool {
    matches!(
        shape,
        DestinationShape::Array { .. }
            | DestinationShape::Span { .. }
            | DestinationShape::ReadOnlySpan { .. }
    )
}

fn needs_final_fix(shape: &DestinationShape) -> bool {
    match shape {
        DestinationShape::Array { .. }
        | DestinationShape::Span { .. }
        | DestinationShape::ReadOnlySpan { .. } => true,
        DestinationShape::InterfaceAdapter { interface, .. } => interface.is_read_only(),
        _ => false,
    }
}

/// Every value element's constant, in textual order; `None` when any
/// element is non-constant or a spread.
fn constant_element_values(elements: &ElementPlan) -> Option<Vec<&opal_core::ast::ConstValue>> {
    elements
        .elements
        .iter()
        .map(|element| match element {
            Element::Value(value) => value.expr.constant_value(),
            Element::Spread(_) => None,
        })
        .collect()
}

fn store_style_emit(elements: &ElementPlan) -> Vec<EmitOp> {
    let mut ops = Vec::new();
    for (index, element) in elements.elements.iter().enumerate() {
        match element {
            Element::Value(_) => {
                ops.push(EmitOp::EvalValue { element: index });
                ops.push(EmitOp::StoreIndex { element: index });
            }
            Element::Spread(_) => ops.push(EmitOp::DrainSpreadStore { element: index }),
        }
    }
    ops
}

fn add_style_emit(elements: &ElementPlan) -> Vec<EmitOp> {
    let mut ops = Vec::new();
    for (index, element) in elements.elements.iter().enumerate() {
        match element {
            Element::Value(_) => {
                ops.push(EmitOp::EvalValue { element: index });
                ops.push(EmitOp::AddCall { element: index });
            }
            Element::Spread(_) => ops.push(EmitOp::DrainSpreadAdd { element: index }),
        }
    }
    ops
}
