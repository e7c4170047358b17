//! Element plan builder: normalizes literal syntax into the ordered list
//! of value and spread items.
//!
//! This step is pure and always structurally succeeds. Iterability of a
//! spread source is resolved here and recorded, but a non-iterable source
//! only surfaces as `EnumerationError` once the converter runs; nothing
//! here reorders elements or drops side effects.

use opal_core::ast::{CollectionLiteralSyntax, Expr, SyntaxElement};
use opal_core::conversions::iteration_element;
use opal_core::registry::IterationMember;
use opal_core::span::Span;
use opal_core::Compilation;

#[derive(Debug, Clone, PartialEq)]
pub struct ValueElement {
    pub expr: Expr,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpreadElement {
    pub expr: Expr,
    /// How the source is iterated, when it is iterable at all.
    pub iteration: Option<IterationMember>,
    /// The source length when compile-time provable.
    pub known_length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Value(ValueElement),
    Spread(SpreadElement),
}

impl Element {
    pub fn span(&self) -> Span {
        match self {
            Element::Value(v) => v.expr.span,
            Element::Spread(s) => s.expr.span,
        }
    }
}

/// The normalized literal: textual order preserved, one entry per
/// syntactic element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementPlan {
    pub elements: Vec<Element>,
    pub span: Span,
}

impl ElementPlan {
    pub fn value_count(&self) -> usize {
        self.elements
            .iter()
            .filter(|e| matches!(e, Element::Value(_)))
            .count()
    }

    pub fn spreads(&self) -> impl Iterator<Item = &SpreadElement> {
        self.elements.iter().filter_map(|e| match e {
            Element::Spread(s) => Some(s),
            Element::Value(_) => None,
        })
    }

    /// Total element count when every spread length is provable.
    pub fn known_total(&self) -> Option<usize> {
        let mut total = 0usize;
        for element in &self.elements {
            match element {
                Element::Value(_) => total += 1,
                Element::Spread(spread) => total += spread.known_length?,
            }
        }
        Some(total)
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

pub fn build_elements(comp: &Compilation, literal: &CollectionLiteralSyntax) -> ElementPlan {
    let elements = literal
        .elements
        .iter()
        .map(|element| match element {
            SyntaxElement::Value(expr) => Element::Value(ValueElement { expr: expr.clone() }),
            SyntaxElement::Spread(expr) => {
                let iteration = iteration_element(comp.registry(), &expr.ty);
                Element::Spread(SpreadElement {
                    known_length: expr.known_length,
                    iteration,
                    expr: expr.clone(),
                })
            }
        })
        .collect();
    ElementPlan {
        elements,
        span: literal.span,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opal_core::ast::ConstValue;
    use opal_core::types::Ty;

    fn lit(elements: Vec<SyntaxElement>) -> CollectionLiteralSyntax {
        CollectionLiteralSyntax::new(elements, Span::synthetic())
    }

    #[test]
    fn order_is_textual_order() {
        let comp = Compilation::default();
        let source = Expr::opaque("xs", Ty::array(Ty::i32()), Span::synthetic());
        let literal = lit(vec![
            SyntaxElement::Value(Expr::constant(
                ConstValue::Int(1),
                Ty::i32(),
                Span::synthetic(),
            )),
            SyntaxElement::Spread(source),
            SyntaxElement::Value(Expr::constant(
                ConstValue::Int(2),
                Ty::i32(),
                Span::synthetic(),
            )),
        ]);
        let plan = build_elements(&comp, &literal);
        assert!(matches!(plan.elements[0], Element::Value(_)));
        assert!(matches!(plan.elements[1], Element::Spread(_)));
        assert!(matches!(plan.elements[2], Element::Value(_)));
        assert_eq!(plan.value_count(), 2);
    }

    #[test]
    fn non_iterable_spread_is_recorded_not_rejected() {
        let comp = Compilation::default();
        let bad = Expr::opaque("n", Ty::i32(), Span::synthetic());
        let plan = build_elements(&comp, &lit(vec![SyntaxElement::Spread(bad)]));
        match &plan.elements[0] {
            Element::Spread(spread) => assert!(spread.iteration.is_none()),
            _ => panic!("expected spread"),
        }
    }

    #[test]
    fn known_total_needs_every_spread_length() {
        let comp = Compilation::default();
        let known = Expr::opaque("xs", Ty::array(Ty::i32()), Span::synthetic()).with_known_length(4);
        let unknown = Expr::opaque("ys", Ty::interface(
            opal_core::types::SequenceInterface::Sequence,
            Ty::i32(),
        ), Span::synthetic());
        let plan = build_elements(
            &comp,
            &lit(vec![
                SyntaxElement::Spread(known.clone()),
                SyntaxElement::Value(Expr::constant(
                    ConstValue::Int(0),
                    Ty::i32(),
                    Span::synthetic(),
                )),
            ]),
        );
        assert_eq!(plan.known_total(), Some(5));

        let plan = build_elements(
            &comp,
            &lit(vec![SyntaxElement::Spread(known), SyntaxElement::Spread(unknown)]),
        );
        assert_eq!(plan.known_total(), None);
    }
}
