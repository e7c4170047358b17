//! The bound-expression surface the binder hands to the subsystem.
//!
//! Parsing is out of scope: by the time this model exists, every value
//! expression already carries its natural type, and source-level facts
//! (constancy, `scoped` qualifiers, provable sequence lengths) have been
//! recorded by the host binder.

use crate::span::Span;
use crate::types::Ty;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstValue {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Char(char),
    Str(String),
    Null,
}

impl ConstValue {
    /// Little-endian encoding at the given element width, for constant
    /// data blobs. Returns `false` for values without a flat encoding at
    /// that width.
    pub fn encode_le(&self, width: usize, out: &mut Vec<u8>) -> bool {
        match self {
            ConstValue::Bool(b) => {
                out.push(*b as u8);
                width == 1
            }
            ConstValue::Int(v) => {
                out.extend_from_slice(&v.to_le_bytes()[..width.min(8)]);
                width <= 8
            }
            ConstValue::UInt(v) => {
                out.extend_from_slice(&v.to_le_bytes()[..width.min(8)]);
                width <= 8
            }
            ConstValue::Float(v) => match width {
                4 => {
                    out.extend_from_slice(&(*v as f32).to_le_bytes());
                    true
                }
                8 => {
                    out.extend_from_slice(&v.to_le_bytes());
                    true
                }
                _ => false,
            },
            ConstValue::Char(c) => {
                out.extend_from_slice(&(*c as u16).to_le_bytes());
                width == 2
            }
            ConstValue::Str(_) | ConstValue::Null => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Constant(ConstValue),
    Local { name: String, scoped: bool },
    Parameter { name: String, scoped: bool },
    Call { callee: String, args: Vec<Expr> },
    /// Any other already-bound expression the subsystem treats as opaque.
    Opaque { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Ty,
    pub span: Span,
    /// Host-provided fact: the sequence length when it is a compile-time
    /// provable constant (fixed-size arrays and views). Only meaningful
    /// for expressions used as spread sources.
    pub known_length: Option<usize>,
}

impl Expr {
    pub fn constant(value: ConstValue, ty: Ty, span: Span) -> Expr {
        Expr {
            kind: ExprKind::Constant(value),
            ty,
            span,
            known_length: None,
        }
    }

    pub fn local(name: impl Into<String>, ty: Ty, span: Span) -> Expr {
        Expr {
            kind: ExprKind::Local {
                name: name.into(),
                scoped: false,
            },
            ty,
            span,
            known_length: None,
        }
    }

    pub fn parameter(name: impl Into<String>, ty: Ty, span: Span) -> Expr {
        Expr {
            kind: ExprKind::Parameter {
                name: name.into(),
                scoped: false,
            },
            ty,
            span,
            known_length: None,
        }
    }

    pub fn call(callee: impl Into<String>, args: Vec<Expr>, ty: Ty, span: Span) -> Expr {
        Expr {
            kind: ExprKind::Call {
                callee: callee.into(),
                args,
            },
            ty,
            span,
            known_length: None,
        }
    }

    pub fn opaque(name: impl Into<String>, ty: Ty, span: Span) -> Expr {
        Expr {
            kind: ExprKind::Opaque { name: name.into() },
            ty,
            span,
            known_length: None,
        }
    }

    pub fn with_known_length(mut self, len: usize) -> Expr {
        self.known_length = Some(len);
        self
    }

    pub fn scoped(mut self) -> Expr {
        match &mut self.kind {
            ExprKind::Local { scoped, .. } | ExprKind::Parameter { scoped, .. } => *scoped = true,
            _ => {}
        }
        self
    }

    pub fn constant_value(&self) -> Option<&ConstValue> {
        match &self.kind {
            ExprKind::Constant(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_constant(&self) -> bool {
        self.constant_value().is_some()
    }
}

/// One syntactic element of a bracketed collection literal. Textual order
/// is evaluation order; no later phase may reorder these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SyntaxElement {
    Value(Expr),
    Spread(Expr),
}

impl SyntaxElement {
    pub fn expr(&self) -> &Expr {
        match self {
            SyntaxElement::Value(expr) | SyntaxElement::Spread(expr) => expr,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionLiteralSyntax {
    pub elements: Vec<SyntaxElement>,
    pub span: Span,
}

impl CollectionLiteralSyntax {
    pub fn new(elements: Vec<SyntaxElement>, span: Span) -> Self {
        CollectionLiteralSyntax { elements, span }
    }
}
