//! The ordinary implicit-conversion relation between two concrete types,
//! plus iteration-member lookup. This is the piece of the host type system
//! the collection-literal subsystem consumes; it is deliberately not
//! aware of collection literals themselves (that conversion is its own
//! kind, layered on top by the subsystem).

use crate::ast::{ConstValue, Expr};
use crate::registry::{IterationKind, IterationMember, TypeDefKind, TypeRegistry};
use crate::types::{PrimitiveTy, Ty};

pub fn implicitly_converts(reg: &TypeRegistry, from: &Ty, to: &Ty) -> bool {
    if from == to {
        return true;
    }
    // Dynamic short-circuits both ways: the conversion happens at runtime.
    if matches!(from, Ty::Dynamic) || matches!(to, Ty::Dynamic) {
        return !matches!(from, Ty::Pointer(_)) && !matches!(to, Ty::Pointer(_));
    }
    match (from, to) {
        (Ty::Primitive(a), Ty::Primitive(b)) => a.widens_to(*b),

        // Boxing / reference conversion to object, except for stack-only
        // views and pointers.
        (_, Ty::Object) => !from.is_ref_struct_view() && !matches!(from, Ty::Pointer(_)),

        // Nullable lifting.
        (Ty::Nullable(a), Ty::Nullable(b)) => implicitly_converts(reg, a, b),
        (_, Ty::Nullable(inner)) => implicitly_converts(reg, from, inner),

        // Contiguous views: T[] -> Span<T>/ReadOnlySpan<T>, Span -> ReadOnlySpan.
        (Ty::Array { elem, rank: 1 }, Ty::SpanView(e)) => elem.as_ref() == e.as_ref(),
        (Ty::Array { elem, rank: 1 }, Ty::ReadOnlySpanView(e)) => elem.as_ref() == e.as_ref(),
        (Ty::SpanView(a), Ty::ReadOnlySpanView(b)) => a == b,

        // Single-dimensional arrays implement the whole well-known family.
        (Ty::Array { elem, rank: 1 }, Ty::Interface(_, e)) => elem.as_ref() == e.as_ref(),

        // Read-only interface members widen within the family:
        // List-shape -> Collection-shape -> Sequence, ReadOnlyList ->
        // ReadOnlyCollection -> Sequence.
        (Ty::Interface(a, ea), Ty::Interface(b, eb)) => {
            ea == eb && interface_widens(*a, *b)
        }

        (Ty::Named(id), Ty::Interface(..)) => reg
            .get(*id)
            .map(|def| {
                def.implements
                    .iter()
                    .any(|iface| iface == to || implicitly_converts(reg, iface, to))
            })
            .unwrap_or(false),

        // A type parameter converts via its constraint set.
        (Ty::Param(param), _) => param
            .constraints
            .interfaces
            .iter()
            .any(|iface| implicitly_converts(reg, iface, to)),

        _ => false,
    }
}

fn interface_widens(from: crate::types::SequenceInterface, to: crate::types::SequenceInterface) -> bool {
    use crate::types::SequenceInterface::*;
    matches!(
        (from, to),
        (ReadOnlyCollection, Sequence)
            | (ReadOnlyList, Sequence)
            | (ReadOnlyList, ReadOnlyCollection)
            | (Collection, Sequence)
            | (List, Sequence)
            | (List, Collection)
    )
}

/// Expression-level implicit conversion: the type relation plus the
/// constant-fitting rules for literals (an integer constant converts to
/// any narrower primitive it fits in; `null` converts to nullable and
/// reference targets).
pub fn expr_implicitly_converts(reg: &TypeRegistry, expr: &Expr, to: &Ty) -> bool {
    if implicitly_converts(reg, &expr.ty, to) {
        return true;
    }
    match expr.constant_value() {
        Some(ConstValue::Int(v)) => match to {
            Ty::Primitive(p) => int_fits(*v, *p),
            Ty::Nullable(inner) => match inner.as_ref() {
                Ty::Primitive(p) => int_fits(*v, *p),
                _ => false,
            },
            _ => false,
        },
        Some(ConstValue::Null) => matches!(
            to,
            Ty::Nullable(_) | Ty::String | Ty::Object | Ty::Named(_) | Ty::Interface(..)
        ),
        _ => false,
    }
}

fn int_fits(v: i64, p: PrimitiveTy) -> bool {
    use PrimitiveTy::*;
    match p {
        I8 => i8::try_from(v).is_ok(),
        I16 => i16::try_from(v).is_ok(),
        I32 => i32::try_from(v).is_ok(),
        I64 => true,
        U8 => u8::try_from(v).is_ok(),
        U16 => u16::try_from(v).is_ok(),
        U32 => u32::try_from(v).is_ok(),
        U64 => v >= 0,
        F32 | F64 => true,
        Bool | Char => false,
    }
}

/// Resolve how a type is iterated as a spread source, and what it
/// produces. `None` means the type is not enumerable.
pub fn iteration_element(reg: &TypeRegistry, ty: &Ty) -> Option<IterationMember> {
    match ty {
        // Arrays of any rank iterate by index; multi-dimensional arrays
        // flatten in row-major order.
        Ty::Array { elem, .. } => Some(IterationMember {
            kind: IterationKind::Indexed,
            element: elem.as_ref().clone(),
        }),
        Ty::SpanView(elem) | Ty::ReadOnlySpanView(elem) => Some(IterationMember {
            kind: IterationKind::Indexed,
            element: elem.as_ref().clone(),
        }),
        Ty::String => Some(IterationMember {
            kind: IterationKind::Indexed,
            element: Ty::Primitive(PrimitiveTy::Char),
        }),
        Ty::Interface(_, elem) => Some(IterationMember {
            kind: IterationKind::Instance,
            element: elem.as_ref().clone(),
        }),
        Ty::Dynamic => Some(IterationMember {
            kind: IterationKind::Dynamic,
            element: Ty::Dynamic,
        }),
        Ty::Named(id) => {
            let def = reg.get(*id)?;
            if def.kind == TypeDefKind::Delegate || def.kind == TypeDefKind::Enum {
                return None;
            }
            if let Some(member) = &def.iteration {
                return Some(member.clone());
            }
            def.element_ty.as_ref().map(|elem| IterationMember {
                kind: IterationKind::Instance,
                element: elem.clone(),
            })
        }
        Ty::Param(param) => param
            .constraints
            .interfaces
            .iter()
            .find_map(|iface| iteration_element(reg, iface)),
        Ty::Nullable(_) | Ty::Primitive(_) | Ty::Object | Ty::Pointer(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn widening_is_irreflexive_and_directional() {
        assert!(implicitly_converts(
            &TypeRegistry::new(),
            &Ty::Primitive(PrimitiveTy::I8),
            &Ty::Primitive(PrimitiveTy::I32)
        ));
        assert!(!implicitly_converts(
            &TypeRegistry::new(),
            &Ty::Primitive(PrimitiveTy::I32),
            &Ty::Primitive(PrimitiveTy::I8)
        ));
    }

    #[test]
    fn constant_fitting_narrows() {
        let reg = TypeRegistry::new();
        let small = Expr::constant(ConstValue::Int(7), Ty::i32(), Span::synthetic());
        assert!(expr_implicitly_converts(
            &reg,
            &small,
            &Ty::Primitive(PrimitiveTy::U8)
        ));
        let big = Expr::constant(ConstValue::Int(300), Ty::i32(), Span::synthetic());
        assert!(!expr_implicitly_converts(
            &reg,
            &big,
            &Ty::Primitive(PrimitiveTy::U8)
        ));
    }

    #[test]
    fn span_does_not_box() {
        let reg = TypeRegistry::new();
        assert!(!implicitly_converts(&reg, &Ty::span(Ty::i32()), &Ty::Object));
        assert!(implicitly_converts(
            &reg,
            &Ty::span(Ty::i32()),
            &Ty::read_only_span(Ty::i32())
        ));
    }
}
