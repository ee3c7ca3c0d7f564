//! What participants see while a type is being assembled.

use std::fmt;
use std::ops::{Deref, DerefMut};

use rustc_hash::FxHashMap;
use tpipe_model::{
    MutableType, MutableTypeArena, MutableTypeFactory, MutableTypeId, RuntimeType, TypeAttributes,
    TypeRef,
};

use crate::batch::GeneratedTypes;
use crate::participant::ParticipantState;
use crate::sync::GenerationScope;
use crate::type_id::{AdditionalTypeId, AssembledTypeId};

type GenerationCompletedHandler = Box<dyn FnOnce(&GeneratedTypesContext)>;

/// State of one assembly run, shared by the proxy and additional type
/// variants.
///
/// Every mutable type of the run lives in the context's arena, and every
/// top-level type of the arena is generated in the run's batch.
pub struct TypeAssemblyContext<'a> {
    arena: MutableTypeArena,
    type_factory: &'a dyn MutableTypeFactory,
    participant_configuration_id: &'a str,
    scope: &'a GenerationScope<'a>,
    additional_types: Vec<(AdditionalTypeId, MutableTypeId)>,
    additional_index: FxHashMap<AdditionalTypeId, MutableTypeId>,
    generation_completed: Vec<GenerationCompletedHandler>,
}

impl<'a> TypeAssemblyContext<'a> {
    pub(crate) fn new(
        type_factory: &'a dyn MutableTypeFactory,
        participant_configuration_id: &'a str,
        scope: &'a GenerationScope<'a>,
    ) -> Self {
        TypeAssemblyContext {
            arena: MutableTypeArena::new(),
            type_factory,
            participant_configuration_id,
            scope,
            additional_types: Vec::new(),
            additional_index: FxHashMap::default(),
            generation_completed: Vec::new(),
        }
    }

    pub fn participant_configuration_id(&self) -> &str {
        self.participant_configuration_id
    }

    pub fn arena(&self) -> &MutableTypeArena {
        &self.arena
    }

    pub fn arena_mut(&mut self) -> &mut MutableTypeArena {
        &mut self.arena
    }

    /// The additional type registered under `id`, creating it on first use.
    ///
    /// Later calls with the same id return the first type, whatever their
    /// other arguments.
    pub fn create_additional_type(
        &mut self,
        id: AdditionalTypeId,
        name: &str,
        namespace: Option<&str>,
        attributes: TypeAttributes,
        base: Option<TypeRef>,
    ) -> MutableTypeId {
        if let Some(&existing) = self.additional_index.get(&id) {
            return existing;
        }
        let created = self
            .type_factory
            .create_type(&mut self.arena, name, namespace, attributes, base);
        self.additional_index.insert(id.clone(), created);
        self.additional_types.push((id, created));
        created
    }

    pub fn get_additional_type(&self, id: &AdditionalTypeId) -> Option<MutableTypeId> {
        self.additional_index.get(id).copied()
    }

    /// Additional types in creation order.
    pub fn additional_types(&self) -> &[(AdditionalTypeId, MutableTypeId)] {
        &self.additional_types
    }

    /// Create a helper type that is generated with the batch but not
    /// reported as an additional type.
    pub fn create_type(
        &mut self,
        name: &str,
        namespace: Option<&str>,
        attributes: TypeAttributes,
        base: Option<TypeRef>,
    ) -> MutableTypeId {
        self.type_factory
            .create_type(&mut self.arena, name, namespace, attributes, base)
    }

    /// Create a proxy of `base` that is generated with the batch.
    pub fn create_proxy(&mut self, base: &RuntimeType) -> MutableTypeId {
        self.type_factory.create_proxy(&mut self.arena, base)
    }

    /// Run `f` on the participant state of the current assembly context.
    pub fn with_participant_state<R>(&self, f: impl FnOnce(&mut ParticipantState) -> R) -> R {
        self.scope.with_participant_state(f)
    }

    /// Register a handler that runs once the batch has been generated.
    pub fn on_generation_completed(
        &mut self,
        handler: impl FnOnce(&GeneratedTypesContext) + 'static,
    ) {
        self.generation_completed.push(Box::new(handler));
    }

    /// Top-level types of the arena, in creation order.
    pub(crate) fn batch(&self) -> Vec<MutableTypeId> {
        self.arena
            .ids()
            .filter(|id| self.arena[*id].declaring_type().is_none())
            .collect()
    }

    pub(crate) fn raise_generation_completed(&mut self, generated: &GeneratedTypesContext) {
        for handler in self.generation_completed.drain(..) {
            handler(generated);
        }
    }
}

impl fmt::Debug for TypeAssemblyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeAssemblyContext")
            .field("configuration", &self.participant_configuration_id)
            .field("types", &self.arena.len())
            .field("additional_types", &self.additional_types)
            .finish_non_exhaustive()
    }
}

/// Context of a proxy assembly run.
pub struct ProxyTypeAssemblyContext<'a> {
    common: TypeAssemblyContext<'a>,
    requested_type: RuntimeType,
    type_id: AssembledTypeId,
    proxy: MutableTypeId,
}

impl<'a> ProxyTypeAssemblyContext<'a> {
    pub(crate) fn new(mut common: TypeAssemblyContext<'a>, type_id: &AssembledTypeId) -> Self {
        let requested_type = type_id.requested_type().clone();
        let proxy = common.create_proxy(&requested_type);
        ProxyTypeAssemblyContext {
            common,
            requested_type,
            type_id: type_id.clone(),
            proxy,
        }
    }

    pub fn requested_type(&self) -> &RuntimeType {
        &self.requested_type
    }

    pub fn type_id(&self) -> &AssembledTypeId {
        &self.type_id
    }

    pub fn proxy_type(&self) -> MutableTypeId {
        self.proxy
    }

    pub fn proxy(&self) -> &MutableType {
        &self.common.arena[self.proxy]
    }

    pub fn proxy_mut(&mut self) -> &mut MutableType {
        &mut self.common.arena[self.proxy]
    }

    pub(crate) fn into_common(self) -> TypeAssemblyContext<'a> {
        self.common
    }
}

impl<'a> Deref for ProxyTypeAssemblyContext<'a> {
    type Target = TypeAssemblyContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.common
    }
}

impl DerefMut for ProxyTypeAssemblyContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.common
    }
}

/// Context of an additional type request.
pub struct AdditionalTypeAssemblyContext<'a> {
    common: TypeAssemblyContext<'a>,
}

impl<'a> AdditionalTypeAssemblyContext<'a> {
    pub(crate) fn new(common: TypeAssemblyContext<'a>) -> Self {
        AdditionalTypeAssemblyContext { common }
    }

    pub(crate) fn into_common(self) -> TypeAssemblyContext<'a> {
        self.common
    }
}

impl<'a> Deref for AdditionalTypeAssemblyContext<'a> {
    type Target = TypeAssemblyContext<'a>;

    fn deref(&self) -> &Self::Target {
        &self.common
    }
}

impl DerefMut for AdditionalTypeAssemblyContext<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.common
    }
}

/// Maps the top-level mutable types of a generated batch to their runtime
/// types.
#[derive(Debug)]
pub struct GeneratedTypesContext {
    generated: GeneratedTypes,
}

impl GeneratedTypesContext {
    pub(crate) fn new(generated: GeneratedTypes) -> Self {
        GeneratedTypesContext { generated }
    }

    pub fn get_generated_type(&self, id: MutableTypeId) -> Option<&RuntimeType> {
        self.generated.get(id)
    }

    /// Resolve a type reference captured before generation.
    pub fn resolve(&self, type_ref: &TypeRef) -> Option<RuntimeType> {
        match type_ref {
            TypeRef::Runtime(ty) => Some(ty.clone()),
            TypeRef::Mutable(id) => self.generated.get(*id).cloned(),
        }
    }

    pub fn generated_types(&self) -> &GeneratedTypes {
        &self.generated
    }
}

#[cfg(test)]
mod tests;
