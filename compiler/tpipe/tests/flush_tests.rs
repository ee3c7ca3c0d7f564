#![allow(clippy::unwrap_used, clippy::expect_used)]
//! Flushing generated code to disk and loading it into another pipeline.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use pretty_assertions::assert_eq;
use tpipe::{
    AssembledTypeIdData, AssemblyError, Participant, ParticipantError, Pipeline, PipelineRegistry,
    PipelineSettings, ProxyTypeAssemblyContext, ASSEMBLED_TYPE_ATTRIBUTE,
    CONFIGURATION_ID_FIELD_NAME, PIPELINE_CONFIGURATION_ATTRIBUTE,
    SERIALIZABLE_ASSEMBLED_TYPE_ATTRIBUTE, TYPE_ID_DATA_FIELD_NAME,
};
use tpipe_model::{
    CustomAttribute, FieldDecl, ModuleManifest, RuntimeType, StaticType, TypeAttributes, Value,
};

#[derive(Default)]
struct AddField {
    runs: AtomicUsize,
}

impl Participant for AddField {
    fn name(&self) -> &str {
        "AddField"
    }

    fn participate(
        &self,
        _id_part: Option<&Value>,
        context: &mut ProxyTypeAssemblyContext<'_>,
    ) -> Result<(), ParticipantError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        context
            .proxy_mut()
            .add_field(FieldDecl::instance("audit", StaticType::Object));
        Ok(())
    }
}

fn host_type(name: &str) -> RuntimeType {
    RuntimeType::builder(name).namespace("Domain").build()
}

fn pipeline(id: &str, settings: PipelineSettings, adder: &Arc<AddField>) -> Pipeline {
    Pipeline::builder(id)
        .with_settings(settings)
        .with_participants([Arc::clone(adder) as Arc<dyn Participant>])
        .build()
        .unwrap()
}

#[test]
fn test_flush_writes_manifest_with_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let adder = Arc::new(AddField::default());
    let settings = PipelineSettings::default()
        .with_assembly_name_pattern("Gen_{counter}")
        .with_assembly_directory(dir.path());
    let pipeline = pipeline("config", settings, &adder);
    let order = pipeline.get_assembled_type(&host_type("Order")).unwrap();

    let modules = pipeline
        .code_manager()
        .flush_code_to_disk(&[CustomAttribute::new("Build").with_argument(7_i64)])
        .unwrap();

    assert_eq!(modules.len(), 1);
    let module = &modules[0];
    assert_eq!(module.name, "Gen_1");
    assert_eq!(module.types, vec![order.clone()]);
    let manifest_path = module.manifest_path.clone().unwrap();
    assert_eq!(manifest_path, dir.path().join("Gen_1.manifest.json"));

    let manifest = ModuleManifest::read(&manifest_path).unwrap();
    assert_eq!(manifest.module, "Gen_1");
    assert_eq!(
        manifest
            .attributes
            .iter()
            .map(|a| (a.name.as_str(), a.arguments.clone()))
            .collect::<Vec<_>>(),
        vec![
            ("Build", vec!["7".to_owned()]),
            (PIPELINE_CONFIGURATION_ATTRIBUTE, vec!["\"config\"".to_owned()]),
        ]
    );
    assert_eq!(manifest.types.len(), 1);
    assert_eq!(manifest.types[0].full_name, order.full_name());
    assert_eq!(manifest.types[0].base.as_deref(), Some("Domain.Order"));
    assert!(manifest.types[0]
        .custom_attributes
        .iter()
        .any(|a| a == ASSEMBLED_TYPE_ATTRIBUTE));
}

#[test]
fn test_flush_without_new_code_produces_no_module() {
    let adder = Arc::new(AddField::default());
    let pipeline = pipeline("config", PipelineSettings::default(), &adder);

    let manager = pipeline.code_manager();
    assert!(manager.flush_code_to_disk(&[]).unwrap().is_empty());

    pipeline.get_assembled_type(&host_type("Order")).unwrap();
    assert_eq!(manager.flush_code_to_disk(&[]).unwrap().len(), 1);
    assert!(manager.flush_code_to_disk(&[]).unwrap().is_empty());
}

#[test]
fn test_generation_continues_after_flush() {
    let adder = Arc::new(AddField::default());
    let settings = PipelineSettings::default().with_assembly_name_pattern("Gen_{counter}");
    let pipeline = pipeline("config", settings, &adder);
    let order = host_type("Order");
    let customer = host_type("Customer");

    let assembled_order = pipeline.get_assembled_type(&order).unwrap();
    let first = pipeline.code_manager().flush_code_to_disk(&[]).unwrap();
    let assembled_customer = pipeline.get_assembled_type(&customer).unwrap();
    let second = pipeline.code_manager().flush_code_to_disk(&[]).unwrap();

    assert_eq!(first[0].name, "Gen_1");
    assert_eq!(second[0].name, "Gen_2");
    assert_eq!(second[0].types, vec![assembled_customer]);
    assert_eq!(
        pipeline.get_assembled_type(&order).unwrap(),
        assembled_order
    );
    assert_eq!(adder.runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_flushed_code_loads_into_pipeline_with_same_configuration() {
    let dir = tempfile::tempdir().unwrap();
    let first_adder = Arc::new(AddField::default());
    let first = pipeline(
        "config",
        PipelineSettings::default().with_assembly_directory(dir.path()),
        &first_adder,
    );
    let order = host_type("Order");
    let assembled = first.get_assembled_type(&order).unwrap();
    let modules = first.code_manager().flush_code_to_disk(&[]).unwrap();

    let second_adder = Arc::new(AddField::default());
    let second = pipeline("config", PipelineSettings::default(), &second_adder);
    let manager = second.code_manager();
    manager.load_flushed_code(&modules[0]).unwrap();

    assert_eq!(second.get_assembled_type(&order).unwrap(), assembled);
    assert_eq!(second_adder.runs.load(Ordering::SeqCst), 0);
    assert!(second.reflection_service().is_assembled_type(&assembled));
}

#[test]
fn test_loading_flushed_code_of_another_configuration_fails() {
    let adder = Arc::new(AddField::default());
    let first = pipeline("config", PipelineSettings::default(), &adder);
    first.get_assembled_type(&host_type("Order")).unwrap();
    let modules = first.code_manager().flush_code_to_disk(&[]).unwrap();

    let other = pipeline("other", PipelineSettings::default(), &adder);
    let manager = other.code_manager();
    let err = manager.load_flushed_code(&modules[0]).unwrap_err();

    assert!(matches!(
        err,
        AssemblyError::ConfigurationMismatch { ref expected, ref actual }
            if expected == "other" && actual == "config"
    ));
}

#[test]
fn test_serializable_proxy_records_its_identity() {
    let adder = Arc::new(AddField::default());
    let pipeline = pipeline(
        "config",
        PipelineSettings::default().with_complex_serialization(true),
        &adder,
    );
    let requested = RuntimeType::builder("Snapshot")
        .namespace("Domain")
        .attributes(TypeAttributes::PUBLIC | TypeAttributes::SERIALIZABLE)
        .build();

    let assembled = pipeline.get_assembled_type(&requested).unwrap();

    let serializable = assembled.has_custom_attribute(SERIALIZABLE_ASSEMBLED_TYPE_ATTRIBUTE);
    assert!(serializable);
    assert_eq!(
        assembled.static_field_value(CONFIGURATION_ID_FIELD_NAME),
        Some(&Value::from("config"))
    );
    let data = assembled
        .static_field_value(TYPE_ID_DATA_FIELD_NAME)
        .and_then(Value::downcast_ref::<AssembledTypeIdData>)
        .unwrap();
    assert_eq!(data.requested_type_name, "Domain.Snapshot");
    let type_id = data
        .to_type_id(|n| (n == "Domain.Snapshot").then(|| requested.clone()))
        .unwrap();
    let reflection = pipeline.reflection_service();
    assert_eq!(reflection.get_assembled_type(&type_id).unwrap(), assembled);

    let plain = pipeline.get_assembled_type(&host_type("Order")).unwrap();
    let serializable = plain.has_custom_attribute(SERIALIZABLE_ASSEMBLED_TYPE_ATTRIBUTE);
    assert!(!serializable);
    assert_eq!(plain.static_field_value(TYPE_ID_DATA_FIELD_NAME), None);
}

#[test]
fn test_registry_hands_out_registered_pipelines() {
    let adder = Arc::new(AddField::default());
    let registry = PipelineRegistry::new();
    let pipeline = Arc::new(pipeline("config", PipelineSettings::default(), &adder));
    registry.register(Arc::clone(&pipeline)).unwrap();
    registry.set_default("config").unwrap();

    let order = host_type("Order");
    let default = registry.default_pipeline().unwrap();
    let via_default = default.get_assembled_type(&order).unwrap();

    assert_eq!(pipeline.get_assembled_type(&order).unwrap(), via_default);
    assert_eq!(adder.runs.load(Ordering::SeqCst), 1);
}
