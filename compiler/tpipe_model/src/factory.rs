//! Creation of mutable types.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::mutable::{MutableTypeArena, MutableTypeId, TypeRef};
use crate::runtime_type::{RuntimeType, TypeAttributes};

/// Creates the mutable types an assembly run works on.
pub trait MutableTypeFactory: Send + Sync {
    /// Create a free-standing type.
    fn create_type(
        &self,
        arena: &mut MutableTypeArena,
        name: &str,
        namespace: Option<&str>,
        attributes: TypeAttributes,
        base: Option<TypeRef>,
    ) -> MutableTypeId;

    /// Create a subtype of `base` carrying copies of every constructor a
    /// subtype can call.
    fn create_proxy(&self, arena: &mut MutableTypeArena, base: &RuntimeType) -> MutableTypeId;
}

/// Names proxies `<Base>_Proxy<n>` with a counter shared by all runs.
#[derive(Debug, Default)]
pub struct DefaultMutableTypeFactory {
    proxy_counter: AtomicU64,
}

impl DefaultMutableTypeFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MutableTypeFactory for DefaultMutableTypeFactory {
    fn create_type(
        &self,
        arena: &mut MutableTypeArena,
        name: &str,
        namespace: Option<&str>,
        attributes: TypeAttributes,
        base: Option<TypeRef>,
    ) -> MutableTypeId {
        arena.create_type(name, namespace, attributes, base)
    }

    fn create_proxy(&self, arena: &mut MutableTypeArena, base: &RuntimeType) -> MutableTypeId {
        let n = self.proxy_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let name = format!("{}_Proxy{n}", base.name());
        let attributes =
            TypeAttributes::PUBLIC | (base.attributes() & TypeAttributes::SERIALIZABLE);
        let id = arena.create_type(
            &name,
            base.namespace(),
            attributes,
            Some(TypeRef::Runtime(base.clone())),
        );
        let proxy = &mut arena[id];
        for constructor in base.constructors() {
            if constructor.visibility.is_visible_to_subclass() {
                proxy.copy_constructor(constructor.clone());
            }
        }
        id
    }
}
