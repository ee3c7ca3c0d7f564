//! In-memory reference backend.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{CodeEmitter, EmitError, FlushedModule, GeneratedCodeFlusher};
use crate::expr::{EvalEnv, EvalError};
use crate::mutable::{MutableType, MutableTypeArena, MutableTypeId, TypeRef};
use crate::runtime_type::{CustomAttribute, RuntimeType, TypeOrigin};
use crate::value::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Stage {
    Declared,
    Defined,
}

/// Builds runtime types directly from mutable types and groups them into
/// numbered modules.
///
/// Module names come from a pattern in which `{counter}` is replaced by the
/// module's sequence number, starting at 1. With an output directory, every
/// flush also writes `<module>.manifest.json` there.
#[derive(Debug)]
pub struct ModuleEmitter {
    name_pattern: String,
    module_counter: u32,
    output_directory: Option<PathBuf>,
    stages: FxHashMap<MutableTypeId, Stage>,
    created: FxHashMap<MutableTypeId, RuntimeType>,
    module_types: Vec<RuntimeType>,
}

impl ModuleEmitter {
    pub fn new(name_pattern: impl Into<String>) -> Self {
        ModuleEmitter {
            name_pattern: name_pattern.into(),
            module_counter: 1,
            output_directory: None,
            stages: FxHashMap::default(),
            created: FxHashMap::default(),
            module_types: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_output_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.output_directory = Some(directory.into());
        self
    }

    /// Name of the module the next flush produces.
    pub fn module_name(&self) -> String {
        self.name_pattern
            .replace("{counter}", &self.module_counter.to_string())
    }

    /// Types created since the last flush.
    pub fn pending_types(&self) -> &[RuntimeType] {
        &self.module_types
    }

    fn mutable<'a>(
        arena: &'a MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<&'a MutableType, EmitError> {
        let Some(ty) = arena.get(id) else {
            let message = format!("{id:?} is not part of the arena");
            return Err(EmitError::invalid_operation(message));
        };
        Ok(ty)
    }

    fn resolve(
        &self,
        arena: &MutableTypeArena,
        type_ref: &TypeRef,
    ) -> Result<RuntimeType, EmitError> {
        match type_ref {
            TypeRef::Runtime(ty) => Ok(ty.clone()),
            TypeRef::Mutable(id) => self.created.get(id).cloned().ok_or_else(|| {
                let name = arena.get(*id).map_or("<unknown>", MutableType::full_name);
                EmitError::invalid_operation(format!(
                    "type '{name}' is referenced before it has been created"
                ))
            }),
        }
    }
}

impl CodeEmitter for ModuleEmitter {
    fn declare_type(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<(), EmitError> {
        let ty = Self::mutable(arena, id)?;
        if self.stages.contains_key(&id) || self.created.contains_key(&id) {
            return Err(EmitError::invalid_operation(format!(
                "type '{}' has already been declared",
                ty.full_name()
            )));
        }
        if ty.is_interface()
            && (ty.fields().iter().any(|f| !f.is_static) || !ty.constructors().is_empty())
        {
            return Err(EmitError::not_supported(format!(
                "interface '{}' cannot have instance fields or constructors",
                ty.full_name()
            )));
        }
        self.stages.insert(id, Stage::Declared);
        Ok(())
    }

    fn define_type_facets(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<(), EmitError> {
        let ty = Self::mutable(arena, id)?;
        match self.stages.get(&id) {
            Some(Stage::Declared) => {}
            Some(Stage::Defined) => {
                return Err(EmitError::invalid_operation(format!(
                    "facets of type '{}' have already been defined",
                    ty.full_name()
                )));
            }
            None => {
                return Err(EmitError::invalid_operation(format!(
                    "type '{}' must be declared before its facets are defined",
                    ty.full_name()
                )));
            }
        }

        let mut seen = FxHashSet::default();
        for field in ty.fields() {
            if !seen.insert(field.name.as_str()) {
                return Err(EmitError::invalid_operation(format!(
                    "type '{}' declares field '{}' more than once",
                    ty.full_name(),
                    field.name
                )));
            }
        }
        let mut seen = FxHashSet::default();
        for method in ty.methods() {
            if !seen.insert((method.name.as_str(), &method.parameters)) {
                return Err(EmitError::invalid_operation(format!(
                    "type '{}' declares method '{}' more than once",
                    ty.full_name(),
                    method.name
                )));
            }
        }

        self.stages.insert(id, Stage::Defined);
        Ok(())
    }

    fn create_type(
        &mut self,
        arena: &MutableTypeArena,
        id: MutableTypeId,
    ) -> Result<RuntimeType, EmitError> {
        let ty = Self::mutable(arena, id)?;
        if self.stages.get(&id) != Some(&Stage::Defined) {
            return Err(EmitError::invalid_operation(format!(
                "type '{}' must have its facets defined before it is created",
                ty.full_name()
            )));
        }

        let declaring = match ty.declaring_type() {
            Some(outer) => Some(self.created.get(&outer).cloned().ok_or_else(|| {
                EmitError::invalid_operation(format!(
                    "declaring type of '{}' must be created first",
                    ty.full_name()
                ))
            })?),
            None => None,
        };

        let base = match ty.base_type() {
            Some(base) => Some(self.resolve(arena, base)?),
            None if ty.is_interface() => None,
            None => {
                return Err(EmitError::invalid_operation(format!(
                    "type '{}' has no base type",
                    ty.full_name()
                )));
            }
        };
        if let Some(base) = &base {
            if base.is_sealed() || base.is_interface() {
                return Err(EmitError::invalid_operation(format!(
                    "type '{}' cannot derive from '{}'",
                    ty.full_name(),
                    base.full_name()
                )));
            }
        }

        let mut interfaces = Vec::with_capacity(ty.interfaces().len());
        for interface in ty.interfaces() {
            let interface = self.resolve(arena, interface)?;
            if !interface.is_interface() {
                return Err(EmitError::invalid_operation(format!(
                    "type '{}' cannot implement '{}', which is not an interface",
                    ty.full_name(),
                    interface.full_name()
                )));
            }
            interfaces.push(interface);
        }

        let mut env = InitializerEnv {
            created: &self.created,
            ty,
            statics: FxHashMap::default(),
        };
        for initialization in ty.type_initializations() {
            initialization.evaluate(&mut env).map_err(|e| {
                EmitError::invalid_operation(format!(
                    "type initializer of '{}' failed: {e}",
                    ty.full_name()
                ))
                .with_source(e)
            })?;
        }
        let statics = env.statics;

        let mut builder = RuntimeType::builder(ty.name())
            .attributes(ty.attributes())
            .origin(TypeOrigin::Generated {
                module: self.module_name(),
            })
            .without_constructors();
        if let Some(ns) = ty.namespace() {
            builder = builder.namespace(ns);
        }
        if let Some(outer) = &declaring {
            builder = builder.declared_in(outer.full_name());
        }
        builder = match base {
            Some(base) => builder.base(base),
            None => builder.without_base(),
        };
        for interface in interfaces {
            builder = builder.interface(interface);
        }
        for constructor in ty.constructors() {
            builder = builder.constructor(constructor.clone());
        }
        for field in ty.fields() {
            builder = builder.field(field.name.clone());
        }
        for method in ty.methods() {
            builder = builder.method(method.name.clone());
        }
        for attribute in ty.custom_attributes() {
            builder = builder.custom_attribute(attribute.clone());
        }
        for (field, value) in statics {
            builder = builder.static_value(field, value);
        }
        let runtime_type = builder.build();

        if let Some(outer) = declaring {
            outer.add_nested_type(runtime_type.clone());
        }
        trace!(ty = %runtime_type.full_name(), module = %self.module_name(), "created type");
        self.stages.remove(&id);
        self.created.insert(id, runtime_type.clone());
        self.module_types.push(runtime_type.clone());
        Ok(runtime_type)
    }
}

impl GeneratedCodeFlusher for ModuleEmitter {
    fn flush_code(
        &mut self,
        attributes: &[CustomAttribute],
    ) -> Result<Option<FlushedModule>, EmitError> {
        // Leftovers of a failed batch are never completed.
        self.stages.clear();
        if self.module_types.is_empty() {
            return Ok(None);
        }

        let name = self.module_name();
        let manifest_path = match &self.output_directory {
            Some(directory) => {
                let path = directory.join(format!("{name}.manifest.json"));
                ModuleManifest::describe(&name, attributes, &self.module_types).write(&path)?;
                Some(path)
            }
            None => None,
        };

        debug!(
            module = %name,
            types = self.module_types.len(),
            manifest = ?manifest_path,
            "module sealed"
        );
        self.module_counter += 1;
        self.created.clear();
        Ok(Some(FlushedModule {
            name,
            attributes: attributes.to_vec(),
            types: std::mem::take(&mut self.module_types),
            manifest_path,
        }))
    }
}

struct InitializerEnv<'a> {
    created: &'a FxHashMap<MutableTypeId, RuntimeType>,
    ty: &'a MutableType,
    statics: FxHashMap<String, Value>,
}

impl EvalEnv for InitializerEnv<'_> {
    fn resolve_type(&self, type_ref: &TypeRef) -> Result<RuntimeType, EvalError> {
        match type_ref {
            TypeRef::Runtime(ty) => Ok(ty.clone()),
            TypeRef::Mutable(id) => self
                .created
                .get(id)
                .cloned()
                .ok_or_else(|| EvalError::UnresolvedType(format!("{id:?}"))),
        }
    }

    fn assign_static(&mut self, field: &str, value: Option<Value>) -> Result<(), EvalError> {
        match self.ty.field(field) {
            Some(decl) if decl.is_static => {
                match value {
                    Some(value) => self.statics.insert(field.to_owned(), value),
                    None => self.statics.remove(field),
                };
                Ok(())
            }
            _ => Err(EvalError::UnknownStaticField(field.to_owned())),
        }
    }
}

/// On-disk description of a flushed module.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleManifest {
    pub module: String,
    pub attributes: Vec<ManifestAttribute>,
    pub types: Vec<ManifestType>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestAttribute {
    pub name: String,
    pub arguments: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestType {
    pub full_name: String,
    pub base: Option<String>,
    pub interfaces: Vec<String>,
    pub custom_attributes: Vec<String>,
}

impl ManifestType {
    fn describe(ty: &RuntimeType) -> Self {
        let interfaces = ty.interfaces().iter().map(|i| i.full_name().to_owned());
        let attributes = ty.custom_attributes().iter().map(|a| a.name.clone());
        ManifestType {
            full_name: ty.full_name().to_owned(),
            base: ty.base_type().map(|b| b.full_name().to_owned()),
            interfaces: interfaces.collect(),
            custom_attributes: attributes.collect(),
        }
    }
}

impl ModuleManifest {
    fn describe(module: &str, attributes: &[CustomAttribute], types: &[RuntimeType]) -> Self {
        ModuleManifest {
            module: module.to_owned(),
            attributes: attributes
                .iter()
                .map(|a| ManifestAttribute {
                    name: a.name.clone(),
                    arguments: a.arguments.iter().map(ToString::to_string).collect(),
                })
                .collect(),
            types: types.iter().map(ManifestType::describe).collect(),
        }
    }

    pub fn read(path: &Path) -> Result<Self, EmitError> {
        let file = File::open(path).map_err(|e| EmitError::io(path.display(), e))?;
        serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            EmitError::invalid_operation(format!("malformed manifest '{}'", path.display()))
                .with_source(e)
        })
    }

    fn write(&self, path: &Path) -> Result<(), EmitError> {
        let file = File::create(path).map_err(|e| EmitError::io(path.display(), e))?;
        serde_json::to_writer_pretty(BufWriter::new(file), self).map_err(|e| {
            EmitError::invalid_operation(format!("cannot write manifest '{}'", path.display()))
                .with_source(e)
        })
    }
}
