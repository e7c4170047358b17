//! Compilation-wide shared state.
//!
//! The caches here are explicit, content-addressed tables owned by one
//! `Compilation`, not hidden globals: their lifetime is the compilation's,
//! and independent compilations never share entries. All of them use
//! insert-if-absent memoization so parallel binding of expressions is
//! safe without any broader locking discipline.

use crate::collections::ConcurrentMap;
use crate::registry::{TypeId, TypeRegistry};
use crate::types::Ty;
use bytes::Bytes;
use std::sync::Arc;

/// Which store a synthesized read-only adapter wraps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum BackingKind {
    /// Exact-size array, for read-only-shaped destinations.
    Array,
    /// Growable list, for mutable-shaped destinations and unknown lengths.
    List,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WrapperKey {
    pub backing: BackingKind,
    pub elem: Ty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberBehavior {
    /// Delegates to the backing store.
    Delegates,
    /// Throws a not-supported failure at runtime.
    ThrowsNotSupported,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrapperMember {
    pub name: &'static str,
    pub behavior: MemberBehavior,
}

/// A manufactured adapter type over an array or list backing store.
/// Created at most once per key per compilation and shared by reference.
#[derive(Debug, PartialEq, Eq)]
pub struct SynthesizedWrapper {
    pub key: WrapperKey,
    pub members: Vec<WrapperMember>,
    pub implements: Vec<Ty>,
}

/// Key for the constant-data table: the encoded bytes plus the element
/// count. Two literals with identical content share one blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobKey {
    pub bytes: Bytes,
    pub len: usize,
}

/// A shared constant data blob, materialized once per distinct key and
/// viewed directly (or copied from) wherever the same content appears.
#[derive(Debug, PartialEq, Eq)]
pub struct ConstantBlob {
    pub bytes: Bytes,
    pub len: usize,
    pub elem: Ty,
}

/// The shared zero-length instance for a given element type. Identity is
/// the `Arc` pointer: every empty literal of the same element type
/// resolves to the same allocation.
#[derive(Debug, PartialEq, Eq)]
pub struct EmptyInstance {
    pub elem: Ty,
}

#[derive(Default)]
pub struct Compilation {
    registry: TypeRegistry,
    wrappers: ConcurrentMap<WrapperKey, Arc<SynthesizedWrapper>>,
    blobs: ConcurrentMap<BlobKey, Arc<ConstantBlob>>,
    empties: ConcurrentMap<Ty, Arc<EmptyInstance>>,
}

impl Compilation {
    pub fn new(registry: TypeRegistry) -> Self {
        Compilation {
            registry,
            wrappers: ConcurrentMap::new(),
            blobs: ConcurrentMap::new(),
            empties: ConcurrentMap::new(),
        }
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut TypeRegistry {
        &mut self.registry
    }

    pub fn wrapper_for<F>(&self, key: WrapperKey, make: F) -> Arc<SynthesizedWrapper>
    where
        F: FnOnce() -> SynthesizedWrapper,
    {
        self.wrappers
            .get_or_insert_with(key, || Arc::new(make()))
    }

    pub fn intern_blob(&self, bytes: Bytes, len: usize, elem: Ty) -> Arc<ConstantBlob> {
        let key = BlobKey {
            bytes: bytes.clone(),
            len,
        };
        self.blobs.get_or_insert_with(key, || {
            Arc::new(ConstantBlob { bytes, len, elem })
        })
    }

    pub fn empty_instance(&self, elem: &Ty) -> Arc<EmptyInstance> {
        self.empties.get_or_insert_with(elem.clone(), || {
            Arc::new(EmptyInstance { elem: elem.clone() })
        })
    }

    pub fn wrapper_count(&self) -> usize {
        self.wrappers.len()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }

    /// Human-readable type name with registry ids resolved, for
    /// diagnostics.
    pub fn display_ty(&self, ty: &Ty) -> String {
        match ty {
            Ty::Named(id) => self.named_def_name(*id),
            Ty::Array { elem, rank } => {
                let mut s = self.display_ty(elem);
                s.push('[');
                for _ in 1..*rank {
                    s.push(',');
                }
                s.push(']');
                s
            }
            Ty::SpanView(elem) => format!("Span<{}>", self.display_ty(elem)),
            Ty::ReadOnlySpanView(elem) => format!("ReadOnlySpan<{}>", self.display_ty(elem)),
            Ty::Interface(kind, elem) => format!("{}<{}>", kind.name(), self.display_ty(elem)),
            Ty::Nullable(inner) => format!("{}?", self.display_ty(inner)),
            other => other.to_string(),
        }
    }

    fn named_def_name(&self, id: TypeId) -> String {
        self.registry
            .get(id)
            .map(|def| def.name.clone())
            .unwrap_or_else(|| format!("#{}", id.0))
    }
}
