use super::*;
use crate::testing::{EmitEvent, EmitLog, RecordingEmitter};
use pretty_assertions::assert_eq;
use tpipe_model::{TypeAttributes, TypeRef};

/// `P` (without a base type) declaring `N`, plus an unrelated `Q`.
fn batch_with_nested() -> (MutableTypeArena, MutableTypeId, MutableTypeId, MutableTypeId) {
    let mut arena = MutableTypeArena::new();
    let p = arena.create_type("P", None, TypeAttributes::PUBLIC, None);
    let q = arena.create_type(
        "Q",
        None,
        TypeAttributes::PUBLIC,
        Some(TypeRef::from(RuntimeType::root())),
    );
    let n = arena.create_nested_type(
        p,
        "N",
        TypeAttributes::PUBLIC,
        Some(TypeRef::from(RuntimeType::root())),
    );
    (arena, p, q, n)
}

#[test]
fn test_declares_in_dependency_order_with_nested() {
    let mut arena = MutableTypeArena::new();
    let q = arena.create_type(
        "Q",
        None,
        TypeAttributes::PUBLIC,
        Some(TypeRef::from(RuntimeType::root())),
    );
    let p = arena.create_type("P", None, TypeAttributes::PUBLIC, Some(TypeRef::Mutable(q)));
    let n = arena.create_nested_type(
        p,
        "N",
        TypeAttributes::PUBLIC,
        Some(TypeRef::from(RuntimeType::root())),
    );

    let log = EmitLog::default();
    let mut emitter = RecordingEmitter::new(log.clone());
    let generated = BatchCodeGenerator::new(&mut emitter)
        .generate_types(&arena, &[p, q])
        .unwrap();

    assert_eq!(
        log.events(),
        vec![
            EmitEvent::Declare("Q".to_owned()),
            EmitEvent::Declare("P".to_owned()),
            EmitEvent::Declare("P+N".to_owned()),
            EmitEvent::Define("Q".to_owned()),
            EmitEvent::Define("P".to_owned()),
            EmitEvent::Define("P+N".to_owned()),
            EmitEvent::Create("Q".to_owned()),
            EmitEvent::Create("P".to_owned()),
            EmitEvent::Create("P+N".to_owned()),
        ]
    );

    assert_eq!(generated.len(), 2);
    let generated_p = generated.get(p).unwrap();
    let generated_q = generated.get(q).unwrap();
    assert_eq!(generated_p.full_name(), "P");
    assert_eq!(generated_p.base_type(), Some(generated_q));
    assert!(!generated.contains(n));
    assert_eq!(generated_p.nested_types().len(), 1);
}

#[test]
fn test_cycle_aborts_before_emitting() {
    let mut arena = MutableTypeArena::new();
    let x = arena.create_type(
        "X",
        None,
        TypeAttributes::PUBLIC | TypeAttributes::INTERFACE,
        None,
    );
    let y = arena.create_type(
        "Y",
        None,
        TypeAttributes::PUBLIC | TypeAttributes::INTERFACE,
        None,
    );
    arena[x].add_interface(y);
    arena[y].add_interface(x);

    let log = EmitLog::default();
    let mut emitter = RecordingEmitter::new(log.clone());
    let err = BatchCodeGenerator::new(&mut emitter)
        .generate_types(&arena, &[x, y])
        .unwrap_err();
    assert!(matches!(err, BatchGenerationError::Cycle(_)));
    assert!(log.events().is_empty());
}

#[test]
fn test_emitter_errors_propagate() {
    let (arena, p, q, _) = batch_with_nested();
    let mut emitter = RecordingEmitter::new(EmitLog::default());
    // P has no base type and is not an interface.
    let err = BatchCodeGenerator::new(&mut emitter)
        .generate_types(&arena, &[p, q])
        .unwrap_err();
    assert!(matches!(err, BatchGenerationError::Emit(_)));
    assert_eq!(
        err.kind(),
        crate::error::CodeGenerationErrorKind::InvalidOperation
    );
}

#[test]
fn test_foreign_ids_are_rejected() {
    let (arena, _, _, _) = batch_with_nested();
    let mut other = MutableTypeArena::new();
    let foreign = other.create_type("F", None, TypeAttributes::PUBLIC, None);
    let mut emitter = RecordingEmitter::new(EmitLog::default());
    let err = BatchCodeGenerator::new(&mut emitter)
        .generate_types(&arena, &[foreign])
        .unwrap_err();
    assert!(err.to_string().contains("not part of the batch's arena"));
}

#[test]
fn test_empty_batch() {
    let arena = MutableTypeArena::new();
    let mut emitter = RecordingEmitter::new(EmitLog::default());
    let generated = BatchCodeGenerator::new(&mut emitter)
        .generate_types(&arena, &[])
        .unwrap();
    assert!(generated.is_empty());
}
