//! Member-lookup boundary with the host binder.
//!
//! The subsystem never walks metadata itself; it asks the registry for the
//! facts overload resolution and classification need: constructors, `add`
//! overloads, iteration members, builder attributes, implemented
//! interfaces, and capability flags.

use crate::error::{Error, Result};
use crate::types::{PrimitiveTy, Ty};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeDefKind {
    Class,
    Struct,
    RefStruct,
    Interface,
    Enum,
    Delegate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IterationKind {
    /// Direct indexed iteration (arrays, contiguous views).
    Indexed,
    /// An instance enumeration member.
    Instance,
    /// An extension enumeration member.
    Extension,
    /// The dynamic-typed escape hatch: element type resolved at runtime.
    Dynamic,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IterationMember {
    pub kind: IterationKind,
    pub element: Ty,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constructor {
    pub arity: usize,
    /// Trailing parameters that carry defaults; a constructor is
    /// zero-arg-satisfiable when `arity - defaulted == 0`.
    pub defaulted: usize,
    pub accessible: bool,
    /// Overload taking a single integer capacity.
    pub takes_capacity: bool,
}

impl Constructor {
    pub fn parameterless() -> Self {
        Constructor {
            arity: 0,
            defaulted: 0,
            accessible: true,
            takes_capacity: false,
        }
    }

    pub fn capacity() -> Self {
        Constructor {
            arity: 1,
            defaulted: 0,
            accessible: true,
            takes_capacity: true,
        }
    }

    pub fn zero_arg_satisfiable(&self) -> bool {
        self.accessible && self.arity == self.defaulted
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOverload {
    pub param: Ty,
    pub accessible: bool,
}

/// Payload of the builder opt-in attribute: the declared factory method
/// name, looked up among the type's static methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuilderAttribute {
    pub method: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticMethod {
    pub name: String,
    pub param: Ty,
    pub ret: Ty,
    pub accessible: bool,
    /// Methods with ABI restrictions (varargs and friends) are never
    /// usable as builders.
    pub abi_restricted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDef {
    pub name: String,
    pub kind: TypeDefKind,
    pub accessible: bool,
    /// Element type the type itself declares as its enumerable element,
    /// when discoverable.
    pub element_ty: Option<Ty>,
    pub iteration: Option<IterationMember>,
    pub ctors: Vec<Constructor>,
    pub add_overloads: Vec<AddOverload>,
    /// The grow-then-get-mutable-view capability: construct empty, grow
    /// to an exact size, store by index.
    pub grow_capability: bool,
    pub builder: Option<BuilderAttribute>,
    pub static_methods: Vec<StaticMethod>,
    pub implements: Vec<Ty>,
    /// Underlying primitive for enum definitions.
    pub underlying: Option<PrimitiveTy>,
}

impl TypeDef {
    pub fn new(name: impl Into<String>, kind: TypeDefKind) -> Self {
        TypeDef {
            name: name.into(),
            kind,
            accessible: true,
            element_ty: None,
            iteration: None,
            ctors: Vec::new(),
            add_overloads: Vec::new(),
            grow_capability: false,
            builder: None,
            static_methods: Vec::new(),
            implements: Vec::new(),
            underlying: None,
        }
    }

    pub fn with_element(mut self, elem: Ty) -> Self {
        self.iteration = Some(IterationMember {
            kind: IterationKind::Instance,
            element: elem.clone(),
        });
        self.element_ty = Some(elem);
        self
    }

    pub fn with_ctor(mut self, ctor: Constructor) -> Self {
        self.ctors.push(ctor);
        self
    }

    pub fn with_add(mut self, param: Ty) -> Self {
        self.add_overloads.push(AddOverload {
            param,
            accessible: true,
        });
        self
    }

    pub fn with_builder(mut self, method: impl Into<String>) -> Self {
        self.builder = Some(BuilderAttribute {
            method: method.into(),
        });
        self
    }

    pub fn with_static_method(mut self, method: StaticMethod) -> Self {
        self.static_methods.push(method);
        self
    }

    pub fn with_grow_capability(mut self) -> Self {
        self.grow_capability = true;
        self
    }

    pub fn implementing(mut self, interfaces: impl IntoIterator<Item = Ty>) -> Self {
        self.implements.extend(interfaces);
        self
    }

    pub fn accessible_zero_arg_ctor(&self) -> Option<&Constructor> {
        self.ctors.iter().find(|ctor| ctor.zero_arg_satisfiable())
    }

    pub fn accessible_capacity_ctor(&self) -> Option<&Constructor> {
        self.ctors
            .iter()
            .find(|ctor| ctor.accessible && ctor.takes_capacity)
    }

    pub fn accessible_adds(&self) -> impl Iterator<Item = &AddOverload> {
        self.add_overloads.iter().filter(|add| add.accessible)
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct TypeRegistry {
    defs: Vec<TypeDef>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a registry snapshot the host exported as JSON.
    pub fn from_json(json: &str) -> Result<TypeRegistry> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn add(&mut self, def: TypeDef) -> TypeId {
        let id = TypeId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    pub fn get(&self, id: TypeId) -> Option<&TypeDef> {
        self.defs.get(id.0 as usize)
    }

    /// Lookup for callers that treat a dangling id as a host-side bug
    /// rather than a fail-closed classification.
    pub fn require(&self, id: TypeId) -> Result<&TypeDef> {
        self.get(id).ok_or(Error::UnknownType(id.0))
    }

    pub fn get_mut(&mut self, id: TypeId) -> Option<&mut TypeDef> {
        self.defs.get_mut(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
