//! The host type model the collection-literal subsystem operates over.
//!
//! `Ty` is deliberately a closed enum: every consumer matches exhaustively,
//! so adding a variant forces every classification and conversion site to
//! take a position on it.

use crate::registry::TypeId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrimitiveTy {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    Char,
}

impl PrimitiveTy {
    pub fn byte_width(self) -> usize {
        use PrimitiveTy::*;
        match self {
            Bool | I8 | U8 => 1,
            I16 | U16 | Char => 2,
            I32 | U32 | F32 => 4,
            I64 | U64 | F64 => 8,
        }
    }

    pub fn is_integer(self) -> bool {
        use PrimitiveTy::*;
        matches!(self, I8 | I16 | I32 | I64 | U8 | U16 | U32 | U64)
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveTy::F32 | PrimitiveTy::F64)
    }

    fn signed_rank(self) -> Option<u8> {
        use PrimitiveTy::*;
        match self {
            I8 => Some(1),
            I16 => Some(2),
            I32 => Some(3),
            I64 => Some(4),
            _ => None,
        }
    }

    fn unsigned_rank(self) -> Option<u8> {
        use PrimitiveTy::*;
        match self {
            U8 => Some(1),
            U16 => Some(2),
            U32 => Some(3),
            U64 => Some(4),
            _ => None,
        }
    }

    /// The standard implicit numeric widening relation. Irreflexive: an
    /// identity conversion is not a widening.
    pub fn widens_to(self, other: PrimitiveTy) -> bool {
        use PrimitiveTy::*;
        if self == other {
            return false;
        }
        // Every numeric type (and char) widens to the floats.
        if other == F64 {
            return self.is_integer() || self == F32 || self == Char;
        }
        if other == F32 {
            return self.is_integer() || self == Char;
        }
        if let (Some(a), Some(b)) = (self.signed_rank(), other.signed_rank()) {
            return a < b;
        }
        if let (Some(a), Some(b)) = (self.unsigned_rank(), other.unsigned_rank()) {
            return a < b;
        }
        // An unsigned type fits in any strictly larger signed type.
        if let (Some(a), Some(b)) = (self.unsigned_rank(), other.signed_rank()) {
            return a < b;
        }
        // char behaves as a 16-bit unsigned scalar for widening purposes.
        if self == Char {
            return U16.widens_to(other) || other == U16;
        }
        false
    }
}

/// The closed family of well-known generic collection interfaces the
/// classifier treats as constructible. Anything outside this set fails
/// closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SequenceInterface {
    /// Enumerable-only.
    Sequence,
    ReadOnlyCollection,
    ReadOnlyList,
    Collection,
    List,
}

impl SequenceInterface {
    pub fn is_read_only(self) -> bool {
        use SequenceInterface::*;
        matches!(self, Sequence | ReadOnlyCollection | ReadOnlyList)
    }

    pub fn name(self) -> &'static str {
        use SequenceInterface::*;
        match self {
            Sequence => "Sequence",
            ReadOnlyCollection => "ReadOnlyCollection",
            ReadOnlyList => "ReadOnlyList",
            Collection => "Collection",
            List => "List",
        }
    }

    pub const ALL: [SequenceInterface; 5] = [
        SequenceInterface::Sequence,
        SequenceInterface::ReadOnlyCollection,
        SequenceInterface::ReadOnlyList,
        SequenceInterface::Collection,
        SequenceInterface::List,
    ];
}

/// Constraint set declared on a generic type parameter. Classification of
/// a parameter consults only this, never a concrete runtime type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConstraintSet {
    pub value_type: bool,
    pub reference_type: bool,
    pub parameterless_new: bool,
    pub interfaces: Vec<Ty>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TypeParam {
    pub name: String,
    pub constraints: ConstraintSet,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ty {
    Primitive(PrimitiveTy),
    String,
    Object,
    Dynamic,
    /// `rank > 1` is a multi-dimensional array: never a constructible
    /// destination, only legal as a spread source.
    Array { elem: Box<Ty>, rank: u8 },
    /// Mutable stack-only contiguous view (`Span<T>`).
    SpanView(Box<Ty>),
    /// Read-only stack-only contiguous view (`ReadOnlySpan<T>`).
    ReadOnlySpanView(Box<Ty>),
    Interface(SequenceInterface, Box<Ty>),
    Named(TypeId),
    Nullable(Box<Ty>),
    Param(TypeParam),
    Pointer(Box<Ty>),
}

impl Ty {
    pub fn array(elem: Ty) -> Ty {
        Ty::Array {
            elem: Box::new(elem),
            rank: 1,
        }
    }

    pub fn multi_array(elem: Ty, rank: u8) -> Ty {
        Ty::Array {
            elem: Box::new(elem),
            rank,
        }
    }

    pub fn span(elem: Ty) -> Ty {
        Ty::SpanView(Box::new(elem))
    }

    pub fn read_only_span(elem: Ty) -> Ty {
        Ty::ReadOnlySpanView(Box::new(elem))
    }

    pub fn interface(kind: SequenceInterface, elem: Ty) -> Ty {
        Ty::Interface(kind, Box::new(elem))
    }

    pub fn nullable(inner: Ty) -> Ty {
        Ty::Nullable(Box::new(inner))
    }

    pub fn i32() -> Ty {
        Ty::Primitive(PrimitiveTy::I32)
    }

    pub fn is_ref_struct_view(&self) -> bool {
        matches!(self, Ty::SpanView(_) | Ty::ReadOnlySpanView(_))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, Ty::Primitive(_))
    }

    pub fn is_type_param(&self) -> bool {
        matches!(self, Ty::Param(_))
    }
}

impl std::fmt::Display for Ty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Primitive(p) => {
                let name = match p {
                    PrimitiveTy::Bool => "bool",
                    PrimitiveTy::I8 => "i8",
                    PrimitiveTy::I16 => "i16",
                    PrimitiveTy::I32 => "i32",
                    PrimitiveTy::I64 => "i64",
                    PrimitiveTy::U8 => "u8",
                    PrimitiveTy::U16 => "u16",
                    PrimitiveTy::U32 => "u32",
                    PrimitiveTy::U64 => "u64",
                    PrimitiveTy::F32 => "f32",
                    PrimitiveTy::F64 => "f64",
                    PrimitiveTy::Char => "char",
                };
                write!(f, "{}", name)
            }
            Ty::String => write!(f, "string"),
            Ty::Object => write!(f, "object"),
            Ty::Dynamic => write!(f, "dynamic"),
            Ty::Array { elem, rank } => {
                write!(f, "{}[", elem)?;
                for _ in 1..*rank {
                    write!(f, ",")?;
                }
                write!(f, "]")
            }
            Ty::SpanView(elem) => write!(f, "Span<{}>", elem),
            Ty::ReadOnlySpanView(elem) => write!(f, "ReadOnlySpan<{}>", elem),
            Ty::Interface(kind, elem) => write!(f, "{}<{}>", kind.name(), elem),
            Ty::Named(id) => write!(f, "#{}", id.0),
            Ty::Nullable(inner) => write!(f, "{}?", inner),
            Ty::Param(param) => write!(f, "{}", param.name),
            Ty::Pointer(inner) => write!(f, "{}*", inner),
        }
    }
}
