//! End-to-end binding scenarios, executed through a miniature plan
//! evaluator that replays emission ops against instrumented element
//! sources and records every observable side effect.

use opal_collect::{
    bind_literal, Betterness, CollectError, CollectionBinder, ConstructionPlan, ConsumeContext,
    EmitOp, Strategy, TemporaryKind,
};
use opal_core::ast::{CollectionLiteralSyntax, ConstValue, Expr, SyntaxElement};
use opal_core::registry::{StaticMethod, TypeDef, TypeDefKind};
use opal_core::span::Span;
use opal_core::types::{SequenceInterface, Ty};
use opal_core::Compilation;
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Runtime stand-in for one literal element.
enum ElemInput {
    Value(i64),
    Spread(Vec<i64>),
}

/// Replay a plan against its element inputs. Returns the produced
/// sequence and the side-effect log, one entry per evaluation of an
/// element expression or spread source.
fn evaluate(plan: &ConstructionPlan, inputs: &[ElemInput]) -> (Vec<i64>, Vec<String>) {
    let mut out = Vec::new();
    let mut log = Vec::new();
    run(plan, inputs, &mut out, &mut log);
    (out, log)
}

fn run(plan: &ConstructionPlan, inputs: &[ElemInput], out: &mut Vec<i64>, log: &mut Vec<String>) {
    match &plan.strategy {
        Strategy::SharedEmpty { .. } => {
            assert!(plan.per_element_emit.is_empty());
            return;
        }
        Strategy::ConstantBlob { blob } => {
            assert!(plan.per_element_emit.is_empty());
            let width = blob.bytes.len() / blob.len;
            for chunk in blob.bytes.chunks(width) {
                let mut raw = [0u8; 8];
                raw[..width].copy_from_slice(chunk);
                out.push(i64::from_le_bytes(raw));
            }
            return;
        }
        Strategy::Builder { materialize, .. } => {
            run(materialize, inputs, out, log);
        }
        Strategy::NullableWrap { inner } => {
            run(inner, inputs, out, log);
        }
        _ => {}
    }

    let mut pending = None;
    for op in &plan.per_element_emit {
        match *op {
            EmitOp::EvalValue { element } => {
                let ElemInput::Value(v) = &inputs[element] else {
                    panic!("element {} is not a value", element);
                };
                log.push(format!("eval {}", element));
                pending = Some(*v);
            }
            EmitOp::StoreIndex { .. } | EmitOp::AddCall { .. } => {
                out.push(pending.take().expect("value evaluated first"));
            }
            EmitOp::DrainSpreadStore { element } | EmitOp::DrainSpreadAdd { element } => {
                let ElemInput::Spread(items) = &inputs[element] else {
                    panic!("element {} is not a spread", element);
                };
                log.push(format!("drain {}", element));
                out.extend(items.iter().copied());
            }
            EmitOp::ConvertToFinal => log.push("convert".into()),
            EmitOp::InvokeBuilder => log.push("invoke-builder".into()),
            EmitOp::WrapNullable => log.push("wrap-nullable".into()),
        }
    }
}

fn int(v: i64) -> SyntaxElement {
    SyntaxElement::Value(Expr::constant(ConstValue::Int(v), Ty::i32(), Span::synthetic()))
}

fn local(name: &str) -> SyntaxElement {
    SyntaxElement::Value(Expr::local(name, Ty::i32(), Span::synthetic()))
}

fn lit(elements: Vec<SyntaxElement>) -> CollectionLiteralSyntax {
    CollectionLiteralSyntax::new(elements, Span::synthetic())
}

#[test]
fn empty_literals_of_one_element_type_share_an_instance() {
    let comp = Compilation::default();
    let target = Ty::array(Ty::i32());
    let first = bind_literal(&comp, &lit(vec![]), &target, ConsumeContext::AssignedToLocal)
        .expect("binds");
    let second = bind_literal(&comp, &lit(vec![]), &target, ConsumeContext::AssignedToLocal)
        .expect("binds");
    let (Strategy::SharedEmpty { instance: a }, Strategy::SharedEmpty { instance: b }) =
        (&first.strategy, &second.strategy)
    else {
        panic!("expected shared-empty strategies");
    };
    assert!(Arc::ptr_eq(a, b));

    let (out, log) = evaluate(&first, &[]);
    assert!(out.is_empty());
    assert!(log.is_empty());
}

#[test]
fn constant_read_only_span_binds_to_a_blob_without_stores() {
    let comp = Compilation::default();
    let plan = bind_literal(
        &comp,
        &lit(vec![int(1), int(2), int(3)]),
        &Ty::read_only_span(Ty::i32()),
        ConsumeContext::AssignedToLocal,
    )
    .expect("binds");
    assert!(matches!(plan.strategy, Strategy::ConstantBlob { .. }));
    assert!(plan.per_element_emit.is_empty());

    let (out, log) = evaluate(&plan, &[]);
    assert_eq!(out, vec![1, 2, 3]);
    assert!(log.is_empty(), "blob construction has no side effects");
}

#[test]
fn constant_span_blob_copies_without_evaluating_elements() {
    let comp = Compilation::default();
    let plan = bind_literal(
        &comp,
        &lit(vec![int(4), int(5), int(6)]),
        &Ty::span(Ty::i32()),
        ConsumeContext::AssignedToLocal,
    )
    .expect("binds");
    assert!(matches!(plan.strategy, Strategy::ConstantBlob { .. }));
    assert_eq!(plan.temporary, TemporaryKind::StackInline);

    let (out, log) = evaluate(&plan, &[]);
    assert_eq!(out, vec![4, 5, 6]);
    assert!(log.is_empty(), "block copy has no per-element effects");
}

#[test]
fn identical_constant_contents_share_one_blob() {
    let comp = Compilation::default();
    let target = Ty::read_only_span(Ty::i32());
    let contents: Vec<i64> = (0..600).collect();
    let elements = || contents.iter().map(|v| int(*v)).collect::<Vec<_>>();

    let first = bind_literal(&comp, &lit(elements()), &target, ConsumeContext::AssignedToLocal)
        .expect("binds");
    let second = bind_literal(&comp, &lit(elements()), &target, ConsumeContext::AssignedToLocal)
        .expect("binds");
    let (Strategy::ConstantBlob { blob: a }, Strategy::ConstantBlob { blob: b }) =
        (&first.strategy, &second.strategy)
    else {
        panic!("expected constant blobs");
    };
    assert!(Arc::ptr_eq(a, b));
    assert_eq!(comp.blob_count(), 1);

    // A singleton literal gets its own, distinct blob.
    let single = bind_literal(
        &comp,
        &lit(vec![int(7)]),
        &target,
        ConsumeContext::AssignedToLocal,
    )
    .expect("binds");
    assert!(matches!(single.strategy, Strategy::ConstantBlob { .. }));
    assert_eq!(comp.blob_count(), 2);

    let (out, _) = evaluate(&first, &[]);
    assert_eq!(out, contents);
}

#[test]
fn classification_is_deterministic_and_idempotent() {
    let comp = Compilation::default();
    for target in [
        Ty::array(Ty::i32()),
        Ty::span(Ty::String),
        Ty::interface(SequenceInterface::List, Ty::i32()),
        Ty::nullable(Ty::array(Ty::i32())),
        Ty::Object,
    ] {
        let first = opal_collect::classify(&comp, &target);
        let second = opal_collect::classify(&comp, &target);
        assert_eq!(first, second);
    }
}

#[test]
fn elements_flatten_left_to_right_with_each_source_evaluated_once() {
    let comp = Compilation::default();
    let xs = Expr::local("xs", Ty::array(Ty::i32()), Span::synthetic()).with_known_length(3);
    let plan = bind_literal(
        &comp,
        &lit(vec![local("a"), SyntaxElement::Spread(xs), local("b")]),
        &Ty::array(Ty::i32()),
        ConsumeContext::AssignedToLocal,
    )
    .expect("binds");

    let inputs = [
        ElemInput::Value(10),
        ElemInput::Spread(vec![20, 21, 22]),
        ElemInput::Value(30),
    ];
    let (out, log) = evaluate(&plan, &inputs);
    assert_eq!(out, vec![10, 20, 21, 22, 30]);
    assert_eq!(log, vec!["eval 0", "drain 1", "eval 2"]);
}

#[test]
fn returning_a_span_of_locals_is_an_escape_error() {
    let comp = Compilation::default();
    let err = bind_literal(
        &comp,
        &lit(vec![local("x"), local("y")]),
        &Ty::span(Ty::i32()),
        ConsumeContext::ReturnedByValue {
            scoped_signature: false,
        },
    )
    .unwrap_err();
    assert!(matches!(err, CollectError::EscapeError { .. }));
    assert!(err.is_fatal());
}

#[test]
fn span_parameter_beats_array_parameter_for_a_literal_argument() {
    let comp = Compilation::default();
    let mut binder = CollectionBinder::new(&comp);
    let literal = lit(vec![int(1), int(2)]);
    assert_eq!(
        binder.better_candidate(&literal, &Ty::span(Ty::i32()), &Ty::array(Ty::i32())),
        Betterness::Better
    );
    assert_eq!(
        binder.better_candidate(&literal, &Ty::array(Ty::i32()), &Ty::span(Ty::i32())),
        Betterness::Worse
    );
}

#[test]
fn unknown_length_interface_destination_accumulates_in_order() {
    let comp = Compilation::default();
    let source = Expr::local(
        "dynamic_seq",
        Ty::interface(SequenceInterface::Sequence, Ty::i32()),
        Span::synthetic(),
    );
    let plan = bind_literal(
        &comp,
        &lit(vec![int(0), SyntaxElement::Spread(source), int(9)]),
        &Ty::interface(SequenceInterface::List, Ty::i32()),
        ConsumeContext::AssignedToLocal,
    )
    .expect("binds");
    assert_eq!(
        plan.strategy,
        Strategy::Accumulate {
            fix_to_final: false
        }
    );
    assert!(!plan.length_known);
    assert_eq!(plan.temporary, TemporaryKind::HeapList);
    assert!(plan.wrapper.is_some());

    let inputs = [
        ElemInput::Value(0),
        ElemInput::Spread(vec![5, 6, 7]),
        ElemInput::Value(9),
    ];
    let (out, log) = evaluate(&plan, &inputs);
    assert_eq!(out, vec![0, 5, 6, 7, 9]);
    assert_eq!(log, vec!["eval 0", "drain 1", "eval 2"]);
}

#[test]
fn nullable_builder_target_wraps_the_built_value() {
    let mut comp = Compilation::default();
    let id = comp
        .registry_mut()
        .add(TypeDef::new("MyValueCollection", TypeDefKind::Struct));
    let def = TypeDef::new("MyValueCollection", TypeDefKind::Struct)
        .with_element(Ty::i32())
        .with_builder("Create")
        .with_static_method(StaticMethod {
            name: "Create".into(),
            param: Ty::read_only_span(Ty::i32()),
            ret: Ty::Named(id),
            accessible: true,
            abi_restricted: false,
        });
    *comp.registry_mut().get_mut(id).expect("registered") = def;

    let plan = bind_literal(
        &comp,
        &lit(vec![int(1), int(2), int(3)]),
        &Ty::nullable(Ty::Named(id)),
        ConsumeContext::AssignedToLocal,
    )
    .expect("binds");

    let Strategy::NullableWrap { inner } = &plan.strategy else {
        panic!("expected a nullable wrap");
    };
    let Strategy::Builder { method, .. } = &inner.strategy else {
        panic!("expected a builder inside the wrap");
    };
    assert_eq!(method, "Create");

    let (out, log) = evaluate(&plan, &[]);
    assert_eq!(out, vec![1, 2, 3]);
    assert_eq!(log, vec!["invoke-builder", "wrap-nullable"]);
}
