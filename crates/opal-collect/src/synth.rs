//! Wrapper type synthesizer and constant-blob interning.
//!
//! Both tables are content-addressed and compilation-wide: an identical
//! key always yields the identical artifact, by reference, for the
//! compilation's lifetime.

use bytes::Bytes;
use opal_core::ast::ConstValue;
use opal_core::context::{
    BackingKind, ConstantBlob, MemberBehavior, SynthesizedWrapper, WrapperKey, WrapperMember,
};
use opal_core::registry::TypeDefKind;
use opal_core::types::{SequenceInterface, Ty};
use opal_core::Compilation;
use std::sync::Arc;

const READER_MEMBERS: &[&str] = &["count", "get", "enumerate", "contains", "copy_to", "index_of"];
const MUTATOR_MEMBERS: &[&str] = &["add", "clear", "insert", "remove", "remove_at", "set"];

/// The adapter type for `(backing, element)`; manufactured on first need
/// and cached for the compilation's lifetime.
pub fn wrapper_for(comp: &Compilation, backing: BackingKind, elem: &Ty) -> Arc<SynthesizedWrapper> {
    let key = WrapperKey {
        backing,
        elem: elem.clone(),
    };
    comp.wrapper_for(key.clone(), || manufacture(key))
}

fn manufacture(key: WrapperKey) -> SynthesizedWrapper {
    let mut members = Vec::with_capacity(READER_MEMBERS.len() + MUTATOR_MEMBERS.len());
    for name in READER_MEMBERS {
        members.push(WrapperMember {
            name,
            behavior: MemberBehavior::Delegates,
        });
    }
    for name in MUTATOR_MEMBERS {
        members.push(WrapperMember {
            name,
            behavior: MemberBehavior::ThrowsNotSupported,
        });
    }
    // The full read-only-shaped family plus the mutating supertypes; the
    // mutating surface is present but throwing.
    let implements = SequenceInterface::ALL
        .iter()
        .map(|kind| Ty::interface(*kind, key.elem.clone()))
        .collect();
    SynthesizedWrapper {
        key,
        members,
        implements,
    }
}

/// Flat element width for constant-data purposes: primitives and enums
/// over a primitive underlying type. Everything else has no blob form.
pub fn blob_element_width(comp: &Compilation, elem: &Ty) -> Option<usize> {
    match elem {
        Ty::Primitive(p) => Some(p.byte_width()),
        Ty::Named(id) => {
            let def = comp.registry().get(*id)?;
            if def.kind == TypeDefKind::Enum {
                def.underlying.map(|p| p.byte_width())
            } else {
                None
            }
        }
        _ => None,
    }
}

/// Encode the constant elements and intern the result. `None` when the
/// element type or any value has no flat encoding.
pub fn intern_constant_blob(
    comp: &Compilation,
    elem: &Ty,
    values: &[&ConstValue],
) -> Option<Arc<ConstantBlob>> {
    let width = blob_element_width(comp, elem)?;
    let mut buf = Vec::with_capacity(width * values.len());
    for value in values {
        if !value.encode_le(width, &mut buf) {
            return None;
        }
    }
    Some(comp.intern_blob(Bytes::from(buf), values.len(), elem.clone()))
}
