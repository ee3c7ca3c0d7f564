//! Serialization hook for generated proxies.

use tpipe_model::{
    CustomAttribute, Expr, FieldDecl, MutableTypeArena, MutableTypeId, StaticType, TypeAttributes,
};

use crate::error::AssemblyError;
use crate::identifier::AssembledTypeIdentifierProvider;
use crate::type_id::AssembledTypeId;

/// Static field holding the serializable form of the proxy's type id.
pub const TYPE_ID_DATA_FIELD_NAME: &str = "__typeIdData";

/// Static field holding the participant configuration id of the proxy.
pub const CONFIGURATION_ID_FIELD_NAME: &str = "__participantConfigurationID";

/// Custom attribute marking a proxy that can be deserialized through the
/// pipeline.
pub const SERIALIZABLE_ASSEMBLED_TYPE_ATTRIBUTE: &str = "SerializableAssembledType";

/// Collaborator told about every proxy that is about to be generated.
pub trait ComplexSerializationEnabler: Send + Sync {
    fn make_serializable(
        &self,
        arena: &mut MutableTypeArena,
        proxy: MutableTypeId,
        participant_configuration_id: &str,
        identifier_provider: &AssembledTypeIdentifierProvider,
        type_id: &AssembledTypeId,
    ) -> Result<(), AssemblyError>;
}

/// Leaves proxies alone.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopSerializationEnabler;

impl ComplexSerializationEnabler for NoopSerializationEnabler {
    fn make_serializable(
        &self,
        _arena: &mut MutableTypeArena,
        _proxy: MutableTypeId,
        _participant_configuration_id: &str,
        _identifier_provider: &AssembledTypeIdentifierProvider,
        _type_id: &AssembledTypeId,
    ) -> Result<(), AssemblyError> {
        Ok(())
    }
}

/// Records, on serializable proxies, what a deserializer needs to find the
/// assembled type again: the flat type id and the participant
/// configuration.
#[derive(Copy, Clone, Debug, Default)]
pub struct SurrogateSerializationEnabler;

impl ComplexSerializationEnabler for SurrogateSerializationEnabler {
    fn make_serializable(
        &self,
        arena: &mut MutableTypeArena,
        proxy: MutableTypeId,
        participant_configuration_id: &str,
        identifier_provider: &AssembledTypeIdentifierProvider,
        type_id: &AssembledTypeId,
    ) -> Result<(), AssemblyError> {
        let attributes = arena[proxy].attributes();
        if !attributes.contains(TypeAttributes::SERIALIZABLE) {
            return Ok(());
        }
        let data = identifier_provider.get_serializable_type_id_expression(type_id)?;

        let proxy = &mut arena[proxy];
        proxy.add_field(FieldDecl::private_static(
            TYPE_ID_DATA_FIELD_NAME,
            StaticType::Named("AssembledTypeIdData"),
        ));
        let field = FieldDecl::private_static(CONFIGURATION_ID_FIELD_NAME, StaticType::Object);
        proxy.add_field(field);
        proxy.add_type_initialization(Expr::assign_static(TYPE_ID_DATA_FIELD_NAME, data));
        proxy.add_type_initialization(Expr::assign_static(
            CONFIGURATION_ID_FIELD_NAME,
            Expr::constant(participant_configuration_id),
        ));
        proxy.add_custom_attribute(
            CustomAttribute::new(SERIALIZABLE_ASSEMBLED_TYPE_ATTRIBUTE)
                .with_argument(participant_configuration_id),
        );
        Ok(())
    }
}
