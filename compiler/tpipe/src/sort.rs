//! Dependency ordering of mutable types.
//!
//! Types are ordered so that every type comes after the types it derives
//! from or implements. Nested types are not ordered on their own: they fold
//! into their outermost declaring type, which inherits their dependencies.
//! Runtime types and mutable types outside the sorted set are terminal.

use rustc_hash::{FxHashMap, FxHashSet};
use tpipe_model::{MutableTypeArena, MutableTypeId, TypeRef};

use crate::error::DependencyCycleError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    /// On the current DFS path.
    Visiting,
    Done,
}

/// Depth-first topological sort over base types and interfaces.
pub struct DependentTypeSorter<'a> {
    arena: &'a MutableTypeArena,
    members: FxHashSet<MutableTypeId>,
    marks: FxHashMap<MutableTypeId, Mark>,
    path: Vec<MutableTypeId>,
    order: Vec<MutableTypeId>,
}

impl<'a> DependentTypeSorter<'a> {
    /// Order the outermost declaring types of `types`.
    ///
    /// Unrelated types keep their relative input order.
    pub fn sort(
        arena: &'a MutableTypeArena,
        types: &[MutableTypeId],
    ) -> Result<Vec<MutableTypeId>, DependencyCycleError> {
        let mut roots = Vec::with_capacity(types.len());
        let mut members = FxHashSet::default();
        for &id in types {
            let owner = arena.outermost_declaring_type(id);
            if members.insert(owner) {
                roots.push(owner);
            }
        }

        let mut sorter = DependentTypeSorter {
            arena,
            members,
            marks: FxHashMap::default(),
            path: Vec::new(),
            order: Vec::with_capacity(roots.len()),
        };
        for root in roots {
            sorter.visit(root)?;
        }
        Ok(sorter.order)
    }

    fn visit(&mut self, id: MutableTypeId) -> Result<(), DependencyCycleError> {
        match self.marks.get(&id) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(self.cycle_error(id)),
            None => {}
        }

        self.marks.insert(id, Mark::Visiting);
        self.path.push(id);
        for dependency in self.dependencies(id) {
            self.visit(dependency)?;
        }
        self.path.pop();
        self.marks.insert(id, Mark::Done);
        self.order.push(id);
        Ok(())
    }

    /// Dependencies of `owner` and of every type nested in it, mapped to
    /// their outermost declaring types.
    fn dependencies(&self, owner: MutableTypeId) -> Vec<MutableTypeId> {
        let mut result = Vec::new();
        let mut pending = vec![owner];
        while let Some(current) = pending.pop() {
            let Some(ty) = self.arena.get(current) else {
                continue;
            };
            for dependency in ty.dependencies() {
                let TypeRef::Mutable(target) = dependency else {
                    continue;
                };
                let target = self.arena.outermost_declaring_type(*target);
                if target != owner && self.members.contains(&target) && !result.contains(&target) {
                    result.push(target);
                }
            }
            pending.extend(ty.nested_types().iter().rev());
        }
        result
    }

    fn cycle_error(&self, repeated: MutableTypeId) -> DependencyCycleError {
        let start = self.path.iter().position(|id| *id == repeated);
        let start = start.unwrap_or(0);
        let types = self.path[start..]
            .iter()
            .chain(std::iter::once(&repeated))
            .map(|id| self.name_of(*id))
            .collect();
        DependencyCycleError { types }
    }

    fn name_of(&self, id: MutableTypeId) -> String {
        self.arena
            .get(id)
            .map_or_else(|| format!("{id:?}"), |ty| ty.full_name().to_owned())
    }
}
