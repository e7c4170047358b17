//! Binding and lowering of collection literals.
//!
//! The pipeline runs element normalization, target classification,
//! per-element conversion, escape checking, and construction planning;
//! the host compiler drives it through [`CollectionBinder`] and the
//! relation queries its overload resolver needs.

pub mod binder;
pub mod convert;
pub mod element;
pub mod error;
pub mod escape;
pub mod plan;
pub mod relation;
pub mod shape;
pub mod synth;

pub use binder::{bind_literal, elements_of, CollectionBinder};
pub use convert::{ConversionKind, ConversionResult, ElementConversion, ValueConversion};
pub use element::{build_elements, Element, ElementPlan, SpreadElement, ValueElement};
pub use error::{CollectError, Result};
pub use escape::{ConsumeContext, EscapeAnalysis, EscapeScope};
pub use plan::{ConstructionPlan, EmitOp, PlanRequest, Strategy, TemporaryKind};
pub use relation::{
    compare_candidates, infer_element_type, literal_conversion_exists, Betterness,
};
pub use shape::{classify, BuilderShape, DestinationShape, InitializerShape};
