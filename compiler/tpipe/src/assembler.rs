//! Orchestration of one assembly run.
//!
//! [`TypeAssembler`] runs the participants over a fresh proxy of the
//! requested type, embeds the type id, and hands the run's types to the
//! batch generator of the current assembly context. It owns no cache; the
//! caller decides whether a type needs assembling at all.

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tpipe_model::{CustomAttribute, MutableTypeFactory, RuntimeType};
use tracing::debug;

use crate::batch::{GeneratedTypes, MutableTypeBatchCodeGenerator};
use crate::context::{
    AdditionalTypeAssemblyContext, GeneratedTypesContext, ProxyTypeAssemblyContext,
    TypeAssemblyContext,
};
use crate::error::AssemblyError;
use crate::identifier::{AssembledTypeIdentifierProvider, ASSEMBLED_TYPE_ATTRIBUTE};
use crate::participant::{AdditionalTypeRef, Participant};
use crate::serialization::ComplexSerializationEnabler;
use crate::sync::GenerationScope;
use crate::type_id::{AdditionalTypeId, AssembledTypeId};

/// The outcome of an assembly run.
#[derive(Clone, Debug)]
pub struct TypeAssemblyResult {
    pub ty: RuntimeType,
    /// Additional types created during the run, by identifier.
    pub additional_types: FxHashMap<AdditionalTypeId, RuntimeType>,
}

impl TypeAssemblyResult {
    fn unchanged(ty: RuntimeType) -> Self {
        TypeAssemblyResult {
            ty,
            additional_types: FxHashMap::default(),
        }
    }
}

pub struct TypeAssembler {
    participant_configuration_id: String,
    participants: Arc<[Arc<dyn Participant>]>,
    participant_names: String,
    identifier_provider: AssembledTypeIdentifierProvider,
    type_factory: Arc<dyn MutableTypeFactory>,
    serialization_enabler: Arc<dyn ComplexSerializationEnabler>,
}

impl TypeAssembler {
    pub fn new(
        participant_configuration_id: impl Into<String>,
        participants: Arc<[Arc<dyn Participant>]>,
        type_factory: Arc<dyn MutableTypeFactory>,
        serialization_enabler: Arc<dyn ComplexSerializationEnabler>,
    ) -> Self {
        let participant_names = participants
            .iter()
            .map(|p| p.name())
            .collect::<Vec<_>>()
            .join("', '");
        TypeAssembler {
            participant_configuration_id: participant_configuration_id.into(),
            identifier_provider: AssembledTypeIdentifierProvider::new(Arc::clone(&participants)),
            participants,
            participant_names,
            type_factory,
            serialization_enabler,
        }
    }

    pub fn participant_configuration_id(&self) -> &str {
        &self.participant_configuration_id
    }

    pub fn participants(&self) -> &[Arc<dyn Participant>] {
        &self.participants
    }

    pub fn identifier_provider(&self) -> &AssembledTypeIdentifierProvider {
        &self.identifier_provider
    }

    /// Assemble the type identified by `type_id` on the context behind
    /// `scope`.
    ///
    /// Returns the requested type itself when it cannot be subclassed or
    /// when no participant modified its proxy; nothing is generated then.
    #[tracing::instrument(level = "debug", skip_all, fields(requested = %type_id))]
    pub fn assemble_type(
        &self,
        type_id: &AssembledTypeId,
        scope: &GenerationScope<'_>,
    ) -> Result<TypeAssemblyResult, AssemblyError> {
        let requested = type_id.requested_type();
        if self.is_assembled_type(requested) {
            let name = requested.full_name().to_owned();
            return Err(AssemblyError::AlreadyAssembled(name));
        }

        if !requested.is_subclassable() {
            for participant in self.participants.iter() {
                participant.handle_non_subclassable_type(requested)?;
            }
            debug!("type is not subclassable, returned unchanged");
            return Ok(TypeAssemblyResult::unchanged(requested.clone()));
        }

        let common = TypeAssemblyContext::new(
            self.type_factory.as_ref(),
            &self.participant_configuration_id,
            scope,
        );
        let mut context = ProxyTypeAssemblyContext::new(common, type_id);
        for (index, participant) in self.participants.iter().enumerate() {
            let part = self.identifier_provider.get_part(type_id, index);
            participant.participate(part, &mut context)?;
        }

        if !context.proxy().is_modified() {
            debug!("proxy unmodified, returned the requested type");
            return Ok(TypeAssemblyResult::unchanged(requested.clone()));
        }

        let proxy = context.proxy_type();
        let mut common = context.into_common();
        self.identifier_provider
            .add_type_id(common.arena_mut(), proxy, type_id);
        self.serialization_enabler.make_serializable(
            common.arena_mut(),
            proxy,
            &self.participant_configuration_id,
            &self.identifier_provider,
            type_id,
        )?;
        let marker = CustomAttribute::new(ASSEMBLED_TYPE_ATTRIBUTE);
        common.arena_mut()[proxy].add_custom_attribute(marker);

        let generated = self.generate_batch(requested.full_name(), scope, &common)?;
        let Some(ty) = generated.get(proxy).cloned() else {
            let name = common.arena()[proxy].full_name().to_owned();
            return Err(AssemblyError::TypeNotGenerated(name));
        };
        let additional_types = collect_additional_types(&common, &generated);

        common.raise_generation_completed(&GeneratedTypesContext::new(generated));
        debug!(assembled = %ty.full_name(), "assembled type generated");
        Ok(TypeAssemblyResult {
            ty,
            additional_types,
        })
    }

    /// Ask the participants, in order, for the additional type `id`; the
    /// first answer wins.
    #[tracing::instrument(level = "debug", skip_all, fields(id = %additional_type_id))]
    pub fn assemble_additional_type(
        &self,
        additional_type_id: &AdditionalTypeId,
        scope: &GenerationScope<'_>,
    ) -> Result<TypeAssemblyResult, AssemblyError> {
        let mut context = AdditionalTypeAssemblyContext::new(TypeAssemblyContext::new(
            self.type_factory.as_ref(),
            &self.participant_configuration_id,
            scope,
        ));

        let mut answer = None;
        for participant in self.participants.iter() {
            if let Some(found) =
                participant.get_or_create_additional_type(additional_type_id, &mut context)?
            {
                answer = Some((participant.name(), found));
                break;
            }
        }
        let Some((winner, answer)) = answer else {
            let id = additional_type_id.to_string();
            return Err(AssemblyError::AdditionalTypeNotSupported(id));
        };

        let mut common = context.into_common();
        let generated = if common.arena().is_empty() {
            GeneratedTypes::default()
        } else {
            self.generate_batch(&additional_type_id.to_string(), scope, &common)?
        };
        let ty = match answer {
            AdditionalTypeRef::Existing(ty) => ty,
            AdditionalTypeRef::Mutable(id) => generated.get(id).cloned().ok_or_else(|| {
                AssemblyError::AdditionalTypeNotGenerated {
                    participant: winner.to_owned(),
                    id: additional_type_id.to_string(),
                }
            })?,
        };
        let additional_types = collect_additional_types(&common, &generated);

        common.raise_generation_completed(&GeneratedTypesContext::new(generated));
        Ok(TypeAssemblyResult {
            ty,
            additional_types,
        })
    }

    pub fn compute_type_id(&self, requested_type: &RuntimeType) -> AssembledTypeId {
        self.identifier_provider.compute_type_id(requested_type)
    }

    pub fn extract_type_id(
        &self,
        assembled: &RuntimeType,
    ) -> Result<AssembledTypeId, AssemblyError> {
        self.ensure_assembled(assembled)?;
        self.identifier_provider.extract_type_id(assembled)
    }

    /// The type an assembled type was generated for.
    pub fn get_requested_type(
        &self,
        assembled: &RuntimeType,
    ) -> Result<RuntimeType, AssemblyError> {
        self.ensure_assembled(assembled)?;
        let name = assembled.full_name();
        assembled
            .base_type()
            .cloned()
            .ok_or_else(|| AssemblyError::MalformedTypeId(name.to_owned()))
    }

    pub fn is_assembled_type(&self, ty: &RuntimeType) -> bool {
        ty.has_custom_attribute(ASSEMBLED_TYPE_ATTRIBUTE)
    }

    /// The identifier under which a participant created `additional_type`.
    /// More than one claiming participant is an error.
    pub fn get_additional_type_id(
        &self,
        additional_type: &RuntimeType,
    ) -> Result<Option<AdditionalTypeId>, AssemblyError> {
        let mut claimed: Option<(&str, AdditionalTypeId)> = None;
        for participant in self.participants.iter() {
            let Some(id) = participant.get_additional_type_id(additional_type) else {
                continue;
            };
            if let Some((first, _)) = &claimed {
                return Err(AssemblyError::AmbiguousAdditionalTypeId {
                    ty: additional_type.full_name().to_owned(),
                    first: (*first).to_owned(),
                    second: participant.name().to_owned(),
                });
            }
            claimed = Some((participant.name(), id));
        }
        Ok(claimed.map(|(_, id)| id))
    }

    fn ensure_assembled(&self, ty: &RuntimeType) -> Result<(), AssemblyError> {
        if self.is_assembled_type(ty) {
            Ok(())
        } else {
            Err(AssemblyError::NotAssembled(ty.full_name().to_owned()))
        }
    }

    fn generate_batch(
        &self,
        requested: &str,
        generator: &dyn MutableTypeBatchCodeGenerator,
        context: &TypeAssemblyContext<'_>,
    ) -> Result<GeneratedTypes, AssemblyError> {
        generator
            .generate_types(context.arena(), &context.batch())
            .map_err(|source| AssemblyError::CodeGeneration {
                kind: source.kind(),
                requested: requested.to_owned(),
                participants: self.participant_names.clone(),
                source,
            })
    }
}

fn collect_additional_types(
    context: &TypeAssemblyContext<'_>,
    generated: &GeneratedTypes,
) -> FxHashMap<AdditionalTypeId, RuntimeType> {
    context
        .additional_types()
        .iter()
        .filter_map(|(id, mutable)| {
            let ty = generated.get(*mutable)?;
            Some((id.clone(), ty.clone()))
        })
        .collect()
}

impl fmt::Debug for TypeAssembler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeAssembler")
            .field("configuration", &self.participant_configuration_id)
            .field("participants", &self.participant_names)
            .finish_non_exhaustive()
    }
}
