//! The conversion relation and betterness queries the outer overload
//! resolver asks of this subsystem.
//!
//! Betterness is inherently pairwise: a strict three-way compare the host
//! composes with its unrelated betterness rules, never a global ranking.
//! Output-type inference contributes one inference per element and never
//! merges element types via best-common-type.

use crate::convert::convert_elements;
use crate::element::{Element, ElementPlan};
use crate::error::CollectError;
use crate::shape::{classify, DestinationShape};
use opal_core::types::Ty;
use opal_core::Compilation;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Betterness {
    Better,
    Worse,
    Neither,
}

impl Betterness {
    pub fn flip(self) -> Betterness {
        match self {
            Betterness::Better => Betterness::Worse,
            Betterness::Worse => Betterness::Better,
            Betterness::Neither => Betterness::Neither,
        }
    }
}

/// `exists(expr, target)` = classification succeeds and every element
/// converts. Builder shapes with an unresolved method do not convert:
/// there is nothing overload resolution could call.
pub fn literal_conversion_exists(comp: &Compilation, plan: &ElementPlan, target: &Ty) -> bool {
    let shape = classify(comp, target);
    shape_accepts(comp, plan, &shape)
}

fn shape_accepts(comp: &Compilation, plan: &ElementPlan, shape: &DestinationShape) -> bool {
    match shape {
        DestinationShape::NotConstructible => false,
        DestinationShape::Builder(builder) if builder.method.is_none() => false,
        DestinationShape::Nullable { inner } => shape_accepts(comp, plan, inner),
        _ => convert_elements(comp, plan, shape).is_ok(),
    }
}

/// Contexts that need a natural type for the literal itself (ternary
/// common type, implicitly-typed arrays and locals, natural lambda
/// typing) must fail: a collection literal has no type of its own.
pub fn require_target_type(plan: &ElementPlan) -> CollectError {
    CollectError::NoTargetType { span: plan.span }
}

/// Three-way betterness between two destination candidate types for a
/// collection-literal argument. Returns how `left` compares to `right`.
pub fn compare_candidates(
    comp: &Compilation,
    plan: &ElementPlan,
    left: &Ty,
    right: &Ty,
) -> Betterness {
    // Rule 1: exactly one candidate is a ref-struct contiguous view.
    match (left.is_ref_struct_view(), right.is_ref_struct_view()) {
        (true, false) => return Betterness::Better,
        (false, true) => return Betterness::Worse,
        _ => {}
    }

    // Rule 2 applies only when both candidates actually accept the
    // literal.
    if !literal_conversion_exists(comp, plan, left)
        || !literal_conversion_exists(comp, plan, right)
    {
        return Betterness::Neither;
    }

    let left_iface = matches!(left, Ty::Interface(..));
    let right_iface = matches!(right, Ty::Interface(..));
    match (left_iface, right_iface) {
        (false, true) => return Betterness::Better,
        (true, false) => return Betterness::Worse,
        _ => {}
    }

    // More specific element type: a concrete element beats a generic
    // type parameter.
    let left_elem = classify(comp, left).element_ty().cloned();
    let right_elem = classify(comp, right).element_ty().cloned();
    if let (Some(a), Some(b)) = (left_elem, right_elem) {
        match (a.is_type_param(), b.is_type_param()) {
            (false, true) => return Betterness::Better,
            (true, false) => return Betterness::Worse,
            _ => {}
        }
    }

    Betterness::Neither
}

/// Output-type inference: the element types a literal contributes when
/// used as an argument against an unfixed type parameter. Every element
/// contributes one inference; the contributions must agree after ordinary
/// numeric/nullable unification or inference fails (`None`).
pub fn infer_element_type(comp: &Compilation, plan: &ElementPlan) -> Option<Ty> {
    let mut inferred: Option<Ty> = None;
    for element in &plan.elements {
        let contributed = match element {
            Element::Value(value) => value.expr.ty.clone(),
            Element::Spread(spread) => spread.iteration.as_ref()?.element.clone(),
        };
        inferred = Some(match inferred {
            None => contributed,
            Some(existing) => unify(comp, &existing, &contributed)?,
        });
    }
    inferred
}

fn unify(comp: &Compilation, a: &Ty, b: &Ty) -> Option<Ty> {
    if a == b {
        return Some(a.clone());
    }
    match (a, b) {
        (Ty::Primitive(pa), Ty::Primitive(pb)) => {
            if pa.widens_to(*pb) {
                Some(Ty::Primitive(*pb))
            } else if pb.widens_to(*pa) {
                Some(Ty::Primitive(*pa))
            } else {
                None
            }
        }
        (Ty::Nullable(inner), other) | (other, Ty::Nullable(inner)) => {
            let unified = unify(comp, inner, other)?;
            Some(Ty::nullable(unified))
        }
        _ => None,
    }
}
