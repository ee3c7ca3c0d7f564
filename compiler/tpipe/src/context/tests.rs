use super::*;

use std::cell::Cell;
use std::rc::Rc;

use tpipe_model::{DefaultMutableTypeFactory, Value};

use crate::sync::CodeGenerationSynchronizationPoint;
use crate::testing::{EmitLog, RecordingEmitter};

fn with_context<R>(f: impl FnOnce(TypeAssemblyContext<'_>) -> R) -> R {
    let emitter = RecordingEmitter::new(EmitLog::default());
    let point = CodeGenerationSynchronizationPoint::new(Box::new(emitter));
    let factory = DefaultMutableTypeFactory::new();
    point.with_scope(|scope| {
        let context = TypeAssemblyContext::new(&factory, "config", scope);
        f(context)
    })
}

#[test]
fn test_additional_types_are_created_once_per_id() {
    with_context(|mut context| {
        let id = AdditionalTypeId::new("mixin");
        let first = context.create_additional_type(
            id.clone(),
            "Mixin",
            Some("Gen"),
            TypeAttributes::PUBLIC,
            Some(TypeRef::from(RuntimeType::root())),
        );
        let second =
            context.create_additional_type(id.clone(), "Other", None, TypeAttributes::PUBLIC, None);
        assert_eq!(first, second);
        assert_eq!(context.get_additional_type(&id), Some(first));
        assert_eq!(context.additional_types(), &[(id, first)]);
        assert_eq!(context.arena().len(), 1);
        assert_eq!(context.participant_configuration_id(), "config");
    });
}

#[test]
fn test_batch_contains_top_level_types_only() {
    with_context(|mut context| {
        let base = RuntimeType::builder("Base").build();
        let proxy = context.create_proxy(&base);
        let helper = context.create_type("Helper", None, TypeAttributes::PUBLIC, None);
        let nested = context.arena_mut().create_nested_type(
            proxy,
            "Inner",
            TypeAttributes::PUBLIC,
            None,
        );
        let batch = context.batch();
        assert_eq!(batch, vec![proxy, helper]);
        assert!(!batch.contains(&nested));
    });
}

#[test]
fn test_participant_state_is_shared_through_scope() {
    with_context(|context| {
        context.with_participant_state(|s| s.insert("seen", 1_u32));
        let seen = context.with_participant_state(|s| s.get::<u32>("seen").copied());
        assert_eq!(seen, Some(1));
    });
}

#[test]
fn test_proxy_context() {
    with_context(|common| {
        let requested = RuntimeType::builder("Domain").namespace("App").build();
        let type_id = AssembledTypeId::new(requested.clone(), [Some(Value::from("p"))]);
        let mut context = ProxyTypeAssemblyContext::new(common, &type_id);

        assert_eq!(context.requested_type(), &requested);
        assert_eq!(context.type_id(), &type_id);
        assert_eq!(
            context.proxy().base_type(),
            Some(&TypeRef::Runtime(requested.clone()))
        );
        assert!(!context.proxy().is_modified());
        context
            .proxy_mut()
            .add_custom_attribute(tpipe_model::CustomAttribute::new("Touched"));
        assert!(context.proxy().is_modified());
        assert_eq!(context.batch(), vec![context.proxy_type()]);
    });
}

#[test]
fn test_generation_completed_handlers_run_once() {
    with_context(|mut context| {
        let calls = Rc::new(Cell::new(0));
        let seen = Rc::clone(&calls);
        context.on_generation_completed(move |generated| {
            assert!(generated.generated_types().is_empty());
            seen.set(seen.get() + 1);
        });

        let generated = GeneratedTypesContext::new(GeneratedTypes::default());
        context.raise_generation_completed(&generated);
        context.raise_generation_completed(&generated);
        assert_eq!(calls.get(), 1);
    });
}

#[test]
fn test_resolver_passes_runtime_types_through() {
    let generated = GeneratedTypesContext::new(GeneratedTypes::default());
    let root = RuntimeType::root();
    assert_eq!(generated.resolve(&TypeRef::from(&root)), Some(root));

    let mut arena = MutableTypeArena::new();
    let id = arena.create_type("Pending", None, TypeAttributes::PUBLIC, None);
    assert_eq!(generated.resolve(&TypeRef::Mutable(id)), None);
}
