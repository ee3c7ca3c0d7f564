//! Aggregation of identity parts and their embedding in generated types.

use std::fmt;
use std::sync::Arc;

use tpipe_model::{
    Expr, FieldDecl, FlatValue, MutableTypeArena, MutableTypeId, RuntimeType, StaticType, Value,
    ValueConstructor,
};

use crate::error::AssemblyError;
use crate::participant::{Participant, TypeIdentifierProvider};
use crate::type_id::AssembledTypeId;

/// Private static field holding the assembled type id of a generated proxy.
pub const TYPE_ID_FIELD_NAME: &str = "__typeID";

/// Custom attribute marking a generated proxy.
pub const ASSEMBLED_TYPE_ATTRIBUTE: &str = "AssembledType";

/// Computes, embeds and extracts [`AssembledTypeId`]s for one participant
/// configuration.
///
/// Only participants that offer a [`TypeIdentifierProvider`] contribute a
/// part; the table from participant index to part slot is built once.
pub struct AssembledTypeIdentifierProvider {
    participants: Arc<[Arc<dyn Participant>]>,
    /// Participant index of the provider in each slot.
    providers: Vec<usize>,
    /// Slot of each participant, by participant index.
    slots: Vec<Option<usize>>,
}

impl AssembledTypeIdentifierProvider {
    pub fn new(participants: Arc<[Arc<dyn Participant>]>) -> Self {
        let mut providers = Vec::new();
        let mut slots = Vec::with_capacity(participants.len());
        for (index, participant) in participants.iter().enumerate() {
            if participant.partial_type_identifier_provider().is_some() {
                slots.push(Some(providers.len()));
                providers.push(index);
            } else {
                slots.push(None);
            }
        }
        AssembledTypeIdentifierProvider {
            participants,
            providers,
            slots,
        }
    }

    /// Number of identity parts of every id this provider computes.
    pub fn part_count(&self) -> usize {
        self.providers.len()
    }

    pub fn compute_type_id(&self, requested_type: &RuntimeType) -> AssembledTypeId {
        let parts = self
            .slot_providers()
            .map(|(_, provider)| provider.get_id(requested_type));
        AssembledTypeId::new(requested_type.clone(), parts)
    }

    /// The part contributed by the participant at `participant_index`.
    pub fn get_part<'t>(
        &self,
        type_id: &'t AssembledTypeId,
        participant_index: usize,
    ) -> Option<&'t Value> {
        let slot = self.slots.get(participant_index).copied().flatten()?;
        type_id.part(slot)
    }

    /// Give `proxy` a private static `__typeID` field that its type
    /// initializer sets to `type_id`.
    pub fn add_type_id(
        &self,
        arena: &mut MutableTypeArena,
        proxy: MutableTypeId,
        type_id: &AssembledTypeId,
    ) {
        let mut arguments = Vec::with_capacity(1 + self.part_count());
        arguments.push(Expr::type_of(type_id.requested_type()));
        for (slot, (_, provider)) in self.slot_providers().enumerate() {
            let expression = type_id
                .part(slot)
                .and_then(|part| provider.get_expression(part))
                .unwrap_or(Expr::Null);
            arguments.push(expression);
        }

        let rebuild = Expr::new_object(
            StaticType::Named("AssembledTypeId"),
            arguments,
            ValueConstructor::new(|mut values| {
                if values.is_empty() {
                    return Err("missing requested type".to_owned());
                }
                let parts = values.split_off(1);
                match values.pop().flatten() {
                    Some(Value::Type(requested)) => {
                        Ok(Value::opaque(AssembledTypeId::new(requested, parts)))
                    }
                    other => Err(format!("expected a type, found {other:?}")),
                }
            }),
        );

        let proxy = &mut arena[proxy];
        proxy.add_field(FieldDecl::private_static(
            TYPE_ID_FIELD_NAME,
            StaticType::Named("AssembledTypeId"),
        ));
        proxy.add_type_initialization(Expr::assign_static(TYPE_ID_FIELD_NAME, rebuild));
    }

    /// Read back the id embedded by [`Self::add_type_id`].
    pub fn extract_type_id(
        &self,
        assembled: &RuntimeType,
    ) -> Result<AssembledTypeId, AssemblyError> {
        let name = assembled.full_name();
        assembled
            .static_field_value(TYPE_ID_FIELD_NAME)
            .and_then(Value::downcast_ref::<AssembledTypeId>)
            .filter(|id| id.parts().len() == self.part_count())
            .cloned()
            .ok_or_else(|| AssemblyError::MalformedTypeId(name.to_owned()))
    }

    /// An expression building the serializable form of `type_id`.
    pub fn get_serializable_type_id_expression(
        &self,
        type_id: &AssembledTypeId,
    ) -> Result<Expr, AssemblyError> {
        let mut arguments = Vec::with_capacity(1 + self.part_count());
        arguments.push(Expr::constant(type_id.requested_type().full_name()));
        for (slot, (participant, provider)) in self.slot_providers().enumerate() {
            let expression = type_id
                .part(slot)
                .and_then(|p| provider.get_flat_value_expression_for_serialization(p))
                .unwrap_or_else(|| Expr::flat_value(Expr::Null));
            let actual = expression.static_type();
            if actual != StaticType::FlatValue {
                return Err(AssemblyError::InvalidFlatValueExpression {
                    participant: participant.name().to_owned(),
                    requested: type_id.requested_type().full_name().to_owned(),
                    actual,
                });
            }
            arguments.push(expression);
        }

        Ok(Expr::new_object(
            StaticType::Named("AssembledTypeIdData"),
            arguments,
            ValueConstructor::new(|values| {
                let mut values = values.into_iter();
                let requested_type_name = match values.next().flatten() {
                    Some(Value::Str(name)) => name.to_string(),
                    other => return Err(format!("expected a type name, found {other:?}")),
                };
                let parts = values
                    .map(|value| {
                        value
                            .as_ref()
                            .and_then(Value::downcast_ref::<FlatValue>)
                            .map(|flat| flat.0.clone())
                            .ok_or_else(|| format!("expected a flat value, found {value:?}"))
                    })
                    .collect::<Result<_, _>>()?;
                Ok(Value::opaque(AssembledTypeIdData {
                    requested_type_name,
                    parts,
                }))
            }),
        ))
    }

    fn slot_providers(
        &self,
    ) -> impl Iterator<Item = (&dyn Participant, &dyn TypeIdentifierProvider)> {
        self.providers.iter().filter_map(|&index| {
            let participant = self.participants[index].as_ref();
            participant
                .partial_type_identifier_provider()
                .map(|provider| (participant, provider))
        })
    }
}

impl fmt::Debug for AssembledTypeIdentifierProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssembledTypeIdentifierProvider")
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}

/// Serializable form of an [`AssembledTypeId`]: the requested type by name
/// and each part in its flat form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssembledTypeIdData {
    pub requested_type_name: String,
    pub parts: Vec<Option<Value>>,
}

impl AssembledTypeIdData {
    /// Rebuild the id, looking the requested type up by full name.
    pub fn to_type_id(
        &self,
        resolve: impl FnOnce(&str) -> Option<RuntimeType>,
    ) -> Option<AssembledTypeId> {
        let requested = resolve(&self.requested_type_name)?;
        Some(AssembledTypeId::new(requested, self.parts.iter().cloned()))
    }
}
