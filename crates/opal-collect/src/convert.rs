//! Element converter: resolves per-element implicit conversions, including
//! `add` overload resolution for initializer shapes.
//!
//! A single element's failure fails the whole literal, except that
//! initializer `add` failures are diagnosed per element so the programmer
//! sees every offending item at once. Side effects and evaluation order
//! are never altered here.

use crate::element::{Element, ElementPlan, SpreadElement, ValueElement};
use crate::error::CollectError;
use crate::shape::{DestinationShape, InitializerShape};
use opal_core::ast::Expr;
use opal_core::conversions::{expr_implicitly_converts, implicitly_converts};
use opal_core::registry::IterationKind;
use opal_core::types::Ty;
use opal_core::Compilation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueConversion {
    Identity,
    Implicit,
    /// Dynamic operands short-circuit to a runtime conversion.
    RuntimeDynamic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementConversion {
    Value { conv: ValueConversion },
    AddCall { overload: Ty },
    Spread { conv: ValueConversion },
    SpreadAddCall { overload: Ty },
}

/// A collection-literal conversion is its own conversion kind; it is never
/// merged into the ordinary implicit-conversion classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionKind {
    CollectionLiteral,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub exists: bool,
    pub kind: ConversionKind,
    pub element_conversions: Vec<ElementConversion>,
}

pub fn convert_elements(
    comp: &Compilation,
    plan: &ElementPlan,
    shape: &DestinationShape,
) -> Result<ConversionResult, Vec<CollectError>> {
    // A nullable destination converts exactly as its inner shape does.
    if let DestinationShape::Nullable { inner } = shape {
        return convert_elements(comp, plan, inner);
    }

    let mut conversions = Vec::with_capacity(plan.elements.len());
    let mut add_errors = Vec::new();

    for element in &plan.elements {
        match element {
            Element::Value(value) => match shape {
                DestinationShape::Initializer(init) => {
                    match resolve_add(comp, init, &value.expr) {
                        Ok(overload) => conversions.push(ElementConversion::AddCall { overload }),
                        Err(err) => add_errors.push(err),
                    }
                }
                _ => {
                    let elem = expected_element(shape);
                    conversions.push(ElementConversion::Value {
                        conv: value_conversion(comp, value, elem).map_err(|e| vec![e])?,
                    });
                }
            },
            Element::Spread(spread) => {
                let produced = spread_element_ty(comp, spread).map_err(|e| vec![e])?;
                match shape {
                    DestinationShape::Initializer(init) => {
                        match resolve_add_for_ty(comp, init, &produced, spread.expr.span) {
                            Ok(overload) => {
                                conversions.push(ElementConversion::SpreadAddCall { overload })
                            }
                            Err(err) => add_errors.push(err),
                        }
                    }
                    _ => {
                        let elem = expected_element(shape);
                        conversions.push(ElementConversion::Spread {
                            conv: spread_conversion(comp, spread, &produced, elem)
                                .map_err(|e| vec![e])?,
                        });
                    }
                }
            }
        }
    }

    if !add_errors.is_empty() {
        return Err(add_errors);
    }
    Ok(ConversionResult {
        exists: true,
        kind: ConversionKind::CollectionLiteral,
        element_conversions: conversions,
    })
}

fn expected_element(shape: &DestinationShape) -> &Ty {
    shape
        .element_ty()
        .expect("converter is only invoked on constructible shapes")
}

fn value_conversion(
    comp: &Compilation,
    value: &ValueElement,
    elem: &Ty,
) -> Result<ValueConversion, CollectError> {
    let expr = &value.expr;
    if matches!(expr.ty, Ty::Dynamic) || matches!(elem, Ty::Dynamic) {
        return Ok(ValueConversion::RuntimeDynamic);
    }
    if expr.ty == *elem {
        return Ok(ValueConversion::Identity);
    }
    if expr_implicitly_converts(comp.registry(), expr, elem) {
        return Ok(ValueConversion::Implicit);
    }
    Err(CollectError::ElementConversionFailed {
        span: expr.span,
        found: comp.display_ty(&expr.ty),
        expected: comp.display_ty(elem),
    })
}

fn spread_element_ty(comp: &Compilation, spread: &SpreadElement) -> Result<Ty, CollectError> {
    match &spread.iteration {
        Some(member) => Ok(member.element.clone()),
        None => Err(CollectError::EnumerationError {
            span: spread.expr.span,
            found: comp.display_ty(&spread.expr.ty),
        }),
    }
}

fn spread_conversion(
    comp: &Compilation,
    spread: &SpreadElement,
    produced: &Ty,
    elem: &Ty,
) -> Result<ValueConversion, CollectError> {
    let dynamic = spread
        .iteration
        .as_ref()
        .is_some_and(|member| member.kind == IterationKind::Dynamic);
    if dynamic || matches!(elem, Ty::Dynamic) {
        return Ok(ValueConversion::RuntimeDynamic);
    }
    if produced == elem {
        return Ok(ValueConversion::Identity);
    }
    if implicitly_converts(comp.registry(), produced, elem) {
        return Ok(ValueConversion::Implicit);
    }
    Err(CollectError::ElementConversionFailed {
        span: spread.expr.span,
        found: comp.display_ty(produced),
        expected: comp.display_ty(elem),
    })
}

/// `add` overload resolution for one value element, exactly as an ordinary
/// single-argument call: gather applicable overloads, prefer an exact
/// parameter-type match, report ambiguity rather than guessing.
fn resolve_add(
    comp: &Compilation,
    init: &InitializerShape,
    expr: &Expr,
) -> Result<Ty, CollectError> {
    let applicable: Vec<&Ty> = init
        .adds
        .iter()
        .filter(|param| expr_implicitly_converts(comp.registry(), expr, param))
        .collect();
    pick_add(comp, init, applicable, &expr.ty, expr.span)
}

fn resolve_add_for_ty(
    comp: &Compilation,
    init: &InitializerShape,
    produced: &Ty,
    span: opal_core::Span,
) -> Result<Ty, CollectError> {
    let applicable: Vec<&Ty> = init
        .adds
        .iter()
        .filter(|param| implicitly_converts(comp.registry(), produced, param))
        .collect();
    pick_add(comp, init, applicable, produced, span)
}

fn pick_add(
    comp: &Compilation,
    init: &InitializerShape,
    applicable: Vec<&Ty>,
    argument: &Ty,
    span: opal_core::Span,
) -> Result<Ty, CollectError> {
    if applicable.is_empty() {
        return Err(CollectError::AddOverloadFailed {
            span,
            target: comp.display_ty(&init.target),
            found: comp.display_ty(argument),
        });
    }
    if let Some(exact) = applicable.iter().find(|param| ***param == *argument) {
        return Ok((*exact).clone());
    }
    if applicable.len() > 1 {
        return Err(CollectError::AmbiguousAddOverload {
            span,
            target: comp.display_ty(&init.target),
            candidates: applicable
                .iter()
                .map(|param| comp.display_ty(param))
                .collect(),
        });
    }
    Ok(applicable[0].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::build_elements;
    use crate::shape::classify;
    use opal_core::ast::{CollectionLiteralSyntax, ConstValue, SyntaxElement};
    use opal_core::registry::{Constructor, TypeDef, TypeDefKind};
    use opal_core::span::Span;
    use opal_core::types::PrimitiveTy;

    fn int(v: i64) -> Expr {
        Expr::constant(ConstValue::Int(v), Ty::i32(), Span::synthetic())
    }

    fn lit(elements: Vec<SyntaxElement>) -> CollectionLiteralSyntax {
        CollectionLiteralSyntax::new(elements, Span::synthetic())
    }

    #[test]
    fn identity_and_widening_conversions() {
        let comp = Compilation::default();
        let shape = classify(&comp, &Ty::array(Ty::Primitive(PrimitiveTy::I64)));
        let plan = build_elements(
            &comp,
            &lit(vec![
                SyntaxElement::Value(int(1)),
                SyntaxElement::Value(Expr::constant(
                    ConstValue::Int(2),
                    Ty::Primitive(PrimitiveTy::I64),
                    Span::synthetic(),
                )),
            ]),
        );
        let result = convert_elements(&comp, &plan, &shape).expect("converts");
        assert_eq!(
            result.element_conversions,
            vec![
                ElementConversion::Value {
                    conv: ValueConversion::Implicit
                },
                ElementConversion::Value {
                    conv: ValueConversion::Identity
                },
            ]
        );
    }

    #[test]
    fn failed_element_fails_the_literal() {
        let comp = Compilation::default();
        let shape = classify(&comp, &Ty::array(Ty::i32()));
        let plan = build_elements(
            &comp,
            &lit(vec![SyntaxElement::Value(Expr::opaque(
                "s",
                Ty::String,
                Span::synthetic(),
            ))]),
        );
        let errs = convert_elements(&comp, &plan, &shape).unwrap_err();
        assert_eq!(errs.len(), 1);
        assert!(matches!(
            errs[0],
            CollectError::ElementConversionFailed { .. }
        ));
    }

    #[test]
    fn non_enumerable_spread_is_an_enumeration_error() {
        let comp = Compilation::default();
        let shape = classify(&comp, &Ty::array(Ty::i32()));
        let plan = build_elements(
            &comp,
            &lit(vec![SyntaxElement::Spread(Expr::opaque(
                "n",
                Ty::i32(),
                Span::synthetic(),
            ))]),
        );
        let errs = convert_elements(&comp, &plan, &shape).unwrap_err();
        assert!(matches!(errs[0], CollectError::EnumerationError { .. }));
    }

    #[test]
    fn add_ambiguity_is_reported_per_element() {
        let mut comp = Compilation::default();
        // Two non-exact applicable overloads for an i32 argument.
        let id = comp.registry_mut().add(
            TypeDef::new("Multi", TypeDefKind::Class)
                .with_element(Ty::i32())
                .with_ctor(Constructor::parameterless())
                .with_add(Ty::Primitive(PrimitiveTy::I64))
                .with_add(Ty::Primitive(PrimitiveTy::F64)),
        );
        let target = Ty::Named(id);
        let shape = classify(&comp, &target);
        let plan = build_elements(
            &comp,
            &lit(vec![
                SyntaxElement::Value(int(1)),
                SyntaxElement::Value(int(2)),
            ]),
        );
        let errs = convert_elements(&comp, &plan, &shape).unwrap_err();
        assert_eq!(errs.len(), 2, "one ambiguity per element");
        assert!(errs
            .iter()
            .all(|e| matches!(e, CollectError::AmbiguousAddOverload { .. })));
    }

    #[test]
    fn exact_add_match_beats_wider_overload() {
        let mut comp = Compilation::default();
        let id = comp.registry_mut().add(
            TypeDef::new("Exact", TypeDefKind::Class)
                .with_element(Ty::i32())
                .with_ctor(Constructor::parameterless())
                .with_add(Ty::i32())
                .with_add(Ty::Primitive(PrimitiveTy::I64)),
        );
        let shape = classify(&comp, &Ty::Named(id));
        let plan = build_elements(&comp, &lit(vec![SyntaxElement::Value(int(5))]));
        let result = convert_elements(&comp, &plan, &shape).expect("resolves");
        assert_eq!(
            result.element_conversions,
            vec![ElementConversion::AddCall {
                overload: Ty::i32()
            }]
        );
    }

    #[test]
    fn dynamic_short_circuits() {
        let comp = Compilation::default();
        let shape = classify(&comp, &Ty::array(Ty::i32()));
        let plan = build_elements(
            &comp,
            &lit(vec![SyntaxElement::Value(Expr::opaque(
                "d",
                Ty::Dynamic,
                Span::synthetic(),
            ))]),
        );
        let result = convert_elements(&comp, &plan, &shape).expect("runtime conversion");
        assert_eq!(
            result.element_conversions,
            vec![ElementConversion::Value {
                conv: ValueConversion::RuntimeDynamic
            }]
        );
    }
}
