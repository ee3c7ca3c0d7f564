//! Compound cache keys.
//!
//! An [`AssembledTypeId`] is the requested type plus one identity part per
//! identifier-providing participant. Its hash is computed once, at
//! construction, with `FxHasher`; equality checks the hash first.

use std::fmt;
use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;
use smallvec::SmallVec;
use tpipe_model::{DelegateShape, RuntimeType, Value};

/// Identity parts, one slot per identifier-providing participant.
pub type IdentityParts = SmallVec<[Option<Value>; 4]>;

/// Cache key of an assembled type.
#[derive(Clone)]
pub struct AssembledTypeId {
    requested_type: RuntimeType,
    parts: IdentityParts,
    hash: u64,
}

impl AssembledTypeId {
    pub fn new(
        requested_type: RuntimeType,
        parts: impl IntoIterator<Item = Option<Value>>,
    ) -> Self {
        let parts: IdentityParts = parts.into_iter().collect();
        let mut hasher = FxHasher::default();
        requested_type.hash(&mut hasher);
        for part in &parts {
            part.hash(&mut hasher);
        }
        AssembledTypeId {
            requested_type,
            parts,
            hash: hasher.finish(),
        }
    }

    pub fn requested_type(&self) -> &RuntimeType {
        &self.requested_type
    }

    pub fn parts(&self) -> &[Option<Value>] {
        &self.parts
    }

    /// The part in `slot`; `None` for a `null` part or an out-of-range slot.
    pub fn part(&self, slot: usize) -> Option<&Value> {
        self.parts.get(slot).and_then(Option::as_ref)
    }
}

impl PartialEq for AssembledTypeId {
    fn eq(&self, other: &Self) -> bool {
        debug_assert_eq!(
            self.parts.len(),
            other.parts.len(),
            "type ids from different participant configurations are not comparable"
        );
        self.hash == other.hash
            && self.requested_type == other.requested_type
            && self.parts == other.parts
    }
}

impl Eq for AssembledTypeId {}

impl Hash for AssembledTypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

impl fmt::Debug for AssembledTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssembledTypeId({}", self.requested_type.full_name())?;
        for part in &self.parts {
            match part {
                Some(value) => write!(f, ", {value:?}")?,
                None => f.write_str(", null")?,
            }
        }
        f.write_str(")")
    }
}

impl fmt::Display for AssembledTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.requested_type.full_name())
    }
}

/// Cache key of a constructor delegate.
#[derive(Clone, Debug)]
pub struct ConstructionKey {
    type_id: AssembledTypeId,
    delegate_shape: DelegateShape,
    allow_non_public: bool,
    hash: u64,
}

impl ConstructionKey {
    pub fn new(
        type_id: AssembledTypeId,
        delegate_shape: DelegateShape,
        allow_non_public: bool,
    ) -> Self {
        let mut hasher = FxHasher::default();
        hasher.write_u64(type_id.hash);
        delegate_shape.hash(&mut hasher);
        allow_non_public.hash(&mut hasher);
        ConstructionKey {
            type_id,
            delegate_shape,
            allow_non_public,
            hash: hasher.finish(),
        }
    }

    pub fn type_id(&self) -> &AssembledTypeId {
        &self.type_id
    }

    pub fn delegate_shape(&self) -> &DelegateShape {
        &self.delegate_shape
    }

    pub fn allow_non_public(&self) -> bool {
        self.allow_non_public
    }
}

impl PartialEq for ConstructionKey {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.allow_non_public == other.allow_non_public
            && self.delegate_shape == other.delegate_shape
            && self.type_id == other.type_id
    }
}

impl Eq for ConstructionKey {}

impl Hash for ConstructionKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Identifier of an additional type, chosen by the participant that owns it.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AdditionalTypeId(pub Value);

impl AdditionalTypeId {
    pub fn new(value: impl Into<Value>) -> Self {
        AdditionalTypeId(value.into())
    }

    pub fn value(&self) -> &Value {
        &self.0
    }
}

impl fmt::Display for AdditionalTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests;
