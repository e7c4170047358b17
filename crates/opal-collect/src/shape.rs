//! Target type classifier: maps a destination type to one of a fixed set
//! of shapes.
//!
//! The priority table below is the single policy point for which types
//! are constructible. Every combination it does not list is
//! `NotConstructible`: the classifier fails closed rather than guessing.

use opal_core::context::BackingKind;
use opal_core::conversions::{implicitly_converts, iteration_element};
use opal_core::registry::{TypeDef, TypeDefKind};
use opal_core::types::{SequenceInterface, Ty};
use opal_core::Compilation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitializerShape {
    pub target: Ty,
    pub elem: Ty,
    /// Parameter types of the accessible instance `add` overloads.
    pub adds: Vec<Ty>,
    pub has_capacity_ctor: bool,
    pub grow_capability: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuilderShape {
    pub target: Ty,
    pub elem: Ty,
    /// The resolved factory method. `None` means the attribute named a
    /// method that is missing, inaccessible, or wrongly shaped; binding
    /// such a target is a fatal `BuilderMethodNotFound`, never a fallback
    /// to another shape.
    pub method: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationShape {
    Array {
        elem: Ty,
    },
    Span {
        elem: Ty,
    },
    ReadOnlySpan {
        elem: Ty,
    },
    InterfaceAdapter {
        interface: SequenceInterface,
        elem: Ty,
        backing: BackingKind,
    },
    Initializer(InitializerShape),
    Builder(BuilderShape),
    Nullable {
        inner: Box<DestinationShape>,
    },
    NotConstructible,
}

impl DestinationShape {
    pub fn element_ty(&self) -> Option<&Ty> {
        match self {
            DestinationShape::Array { elem }
            | DestinationShape::Span { elem }
            | DestinationShape::ReadOnlySpan { elem }
            | DestinationShape::InterfaceAdapter { elem, .. } => Some(elem),
            DestinationShape::Initializer(init) => Some(&init.elem),
            DestinationShape::Builder(builder) => Some(&builder.elem),
            DestinationShape::Nullable { inner } => inner.element_ty(),
            DestinationShape::NotConstructible => None,
        }
    }

    pub fn is_constructible(&self) -> bool {
        !matches!(self, DestinationShape::NotConstructible)
    }

    /// Shapes whose realization may need a compiler-managed stack buffer.
    pub fn needs_escape_check(&self) -> bool {
        matches!(
            self,
            DestinationShape::Span { .. }
                | DestinationShape::ReadOnlySpan { .. }
                | DestinationShape::Builder(_)
        )
    }
}

/// `classify(target) -> DestinationShape`; deterministic and idempotent
/// for a fixed registry. Priority order is normative.
pub fn classify(comp: &Compilation, target: &Ty) -> DestinationShape {
    match target {
        // 1. Single-dimensional arrays. Multi-dimensional arrays are only
        // legal as spread sources.
        Ty::Array { elem, rank: 1 } => DestinationShape::Array {
            elem: elem.as_ref().clone(),
        },
        Ty::Array { .. } => DestinationShape::NotConstructible,

        // 2. Contiguous views.
        Ty::SpanView(elem) => DestinationShape::Span {
            elem: elem.as_ref().clone(),
        },
        Ty::ReadOnlySpanView(elem) => DestinationShape::ReadOnlySpan {
            elem: elem.as_ref().clone(),
        },

        // 3/4. User types: builder attribute first, then the initializer
        // pattern.
        Ty::Named(id) => match comp.registry().get(*id) {
            Some(def) => classify_named(comp, target, def),
            None => DestinationShape::NotConstructible,
        },

        // 5. The closed well-known interface family.
        Ty::Interface(kind, elem) => DestinationShape::InterfaceAdapter {
            interface: *kind,
            elem: elem.as_ref().clone(),
            backing: if kind.is_read_only() {
                BackingKind::Array
            } else {
                BackingKind::List
            },
        },

        // 6. Nullable of a constructible value; one level only.
        Ty::Nullable(inner) => {
            if matches!(inner.as_ref(), Ty::Nullable(_)) {
                return DestinationShape::NotConstructible;
            }
            match classify(comp, inner) {
                DestinationShape::NotConstructible => DestinationShape::NotConstructible,
                shape => DestinationShape::Nullable {
                    inner: Box::new(shape),
                },
            }
        }

        // Type parameters classify by constraint set alone.
        Ty::Param(param) => classify_param(target, param),

        // 7. Everything else fails closed: object, dynamic, primitives,
        // strings, pointers.
        Ty::Primitive(_) | Ty::String | Ty::Object | Ty::Dynamic | Ty::Pointer(_) => {
            DestinationShape::NotConstructible
        }
    }
}

fn classify_named(comp: &Compilation, target: &Ty, def: &TypeDef) -> DestinationShape {
    if !def.accessible {
        return DestinationShape::NotConstructible;
    }

    // 3. Builder attribute preempts the initializer pattern and carries
    // no kind restriction: an interface or ref-like type with the opt-in
    // and a well-shaped factory is a builder destination.
    if let Some(attr) = &def.builder {
        let Some(elem) = builder_element_ty(comp, target, def) else {
            // Element type undeterminable: diagnosed, never guessed.
            return DestinationShape::NotConstructible;
        };
        let method = resolve_builder_method(comp, target, def, &attr.method, &elem);
        return DestinationShape::Builder(BuilderShape {
            target: target.clone(),
            elem,
            method,
        });
    }

    match def.kind {
        // Without the opt-in, enums, delegates, and bare interfaces are
        // never constructible, even when they coincidentally satisfy
        // iteration. Ref-like types need the opt-in too.
        TypeDefKind::Enum
        | TypeDefKind::Delegate
        | TypeDefKind::Interface
        | TypeDefKind::RefStruct => {
            return DestinationShape::NotConstructible;
        }
        TypeDefKind::Class | TypeDefKind::Struct => {}
    }

    // 4. Initializer pattern: iterable + usable constructor + at least
    // one accessible instance `add`.
    let Some(iteration) = iteration_element(comp.registry(), target) else {
        return DestinationShape::NotConstructible;
    };
    if def.accessible_zero_arg_ctor().is_none() {
        return DestinationShape::NotConstructible;
    }
    let adds: Vec<Ty> = def.accessible_adds().map(|add| add.param.clone()).collect();
    if adds.is_empty() {
        return DestinationShape::NotConstructible;
    }
    DestinationShape::Initializer(InitializerShape {
        target: target.clone(),
        elem: def
            .element_ty
            .clone()
            .unwrap_or(iteration.element),
        adds,
        has_capacity_ctor: def.accessible_capacity_ctor().is_some(),
        grow_capability: def.grow_capability,
    })
}

fn builder_element_ty(comp: &Compilation, target: &Ty, def: &TypeDef) -> Option<Ty> {
    // The type's own enumerable element type wins; an instance or
    // extension iteration member is the fallback.
    if let Some(elem) = &def.element_ty {
        return Some(elem.clone());
    }
    iteration_element(comp.registry(), target).map(|member| member.element)
}

fn resolve_builder_method(
    comp: &Compilation,
    target: &Ty,
    def: &TypeDef,
    name: &str,
    elem: &Ty,
) -> Option<String> {
    let source = Ty::read_only_span(elem.clone());
    def.static_methods
        .iter()
        .find(|method| {
            method.name == name
                && method.accessible
                && !method.abi_restricted
                && implicitly_converts(comp.registry(), &source, &method.param)
                && (method.ret == *target
                    || implicitly_converts(comp.registry(), &method.ret, target))
        })
        .map(|method| method.name.clone())
}

fn classify_param(target: &Ty, param: &opal_core::types::TypeParam) -> DestinationShape {
    let constraints = &param.constraints;
    // Without a guaranteed-constructible constraint the parameter fails
    // closed.
    if !constraints.parameterless_new || !(constraints.value_type || constraints.reference_type) {
        return DestinationShape::NotConstructible;
    }
    // A mutable-shaped interface constraint supplies both the element
    // type and the `add` contract.
    for iface in &constraints.interfaces {
        if let Ty::Interface(kind, elem) = iface {
            if !kind.is_read_only() {
                return DestinationShape::Initializer(InitializerShape {
                    target: target.clone(),
                    elem: elem.as_ref().clone(),
                    adds: vec![elem.as_ref().clone()],
                    has_capacity_ctor: false,
                    grow_capability: false,
                });
            }
        }
    }
    DestinationShape::NotConstructible
}
