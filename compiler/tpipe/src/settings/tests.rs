use super::*;

use pretty_assertions::assert_eq;

#[test]
fn test_defaults() {
    let settings = PipelineSettings::default();
    assert_eq!(settings.degree_of_parallelism, 1);
    assert_eq!(
        settings.assembly_name_pattern,
        "TypePipe_GeneratedAssembly_{counter}"
    );
    assert_eq!(settings.assembly_directory, None);
    assert!(!settings.enable_complex_serialization);
    assert!(settings.validate().is_ok());
}

#[test]
fn test_from_json_fills_missing_keys() {
    let json = r#"{ "degree_of_parallelism": 3, "enable_complex_serialization": true }"#;
    let settings = PipelineSettings::from_json(json).unwrap();
    assert_eq!(
        settings,
        PipelineSettings::default()
            .with_degree_of_parallelism(3)
            .with_complex_serialization(true)
    );
}

#[test]
fn test_from_json_rejects_unknown_keys() {
    let err = PipelineSettings::from_json(r#"{ "degree": 3 }"#).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_pattern_needs_counter() {
    let err = PipelineSettings::from_json(r#"{ "assembly_name_pattern": "Fixed" }"#).unwrap_err();
    assert!(matches!(
        err,
        ConfigError::MissingCounterPlaceholder(p) if p == "Fixed"
    ));
}

#[test]
fn test_zero_degree_uses_available_parallelism() {
    let settings = PipelineSettings::default().with_degree_of_parallelism(0);
    assert!(settings.effective_degree_of_parallelism() >= 1);
}

#[test]
fn test_module_name_pattern_per_context() {
    let single = PipelineSettings::default().with_assembly_name_pattern("Gen_{counter}");
    assert_eq!(single.module_name_pattern(0), "Gen_{counter}");

    let several = single.with_degree_of_parallelism(2);
    assert_eq!(several.module_name_pattern(0), "Gen_{counter}_1");
    assert_eq!(several.module_name_pattern(1), "Gen_{counter}_2");
}
