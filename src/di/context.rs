//! The abstract context (C3): per-register and per-memory-cell state at a
//! single program point, plus the join used at CFG merge points.

use super::lattice::Object;
use super::memory::{Cell, Location, Root};
use crate::ir::Reg;
use std::collections::{BTreeMap, BTreeSet};

/// What a register holds: either a set of addresses it might name (never
/// empty — an empty `Locations` would mean "names nothing," which this IR
/// has no operation that could produce), or an inline rvalue object.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Locations(BTreeSet<Location>),
    Object(Object),
}

impl Value {
    pub fn locations(set: BTreeSet<Location>) -> Self {
        assert!(!set.is_empty(), "precondition violation: a Locations value must name at least one address");
        Value::Locations(set)
    }

    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Value::Locations(a), Value::Locations(b)) => Value::Locations(a.union(b).cloned().collect()),
            (Value::Object(a), Value::Object(b)) => Value::Object(a.join(b)),
            _ => panic!("precondition violation: cannot join a Locations value with an Object value"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Context {
    pub locals: BTreeMap<Reg, Value>,
    pub memory: BTreeMap<Root, Cell>,
}

impl Context {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn get(&self, reg: Reg) -> Option<&Value> {
        self.locals.get(&reg)
    }

    pub fn cell(&self, root: Root) -> Option<&Cell> {
        self.memory.get(&root)
    }

    /// Read-only walk to the object at `loc`, disaggregating on the fly
    /// without persisting the split — for reading a transient context
    /// (e.g. a predecessor's already-stored after-context during
    /// reconciliation) where there is nothing to persist into.
    pub fn object_at(&self, loc: &Location) -> Object {
        let root = loc.root().expect("precondition violation: reading the null location");
        let cell = self
            .cell(root)
            .unwrap_or_else(|| panic!("precondition violation: location root {root} missing from memory"));
        let mut ty = cell.ty.clone();
        let mut obj = cell.object.clone();
        for &idx in loc.path() {
            let field_count = ty.stored_property_types().len();
            obj = obj.disaggregate(field_count);
            match &obj {
                super::lattice::Object::Partial(parts) => {
                    ty = ty.stored_property_types()[idx].clone();
                    obj = parts[idx].clone();
                }
                super::lattice::Object::Full(_) => unreachable!(),
            }
        }
        obj
    }

    /// In-place walk to the object at `loc`, lazily disaggregating (and
    /// persisting the split) as it descends. This is how every live
    /// evaluation step reads or writes through a location.
    pub fn project_mut(&mut self, loc: &Location) -> &mut Object {
        let root = loc.root().expect("precondition violation: projecting the null location");
        let path = loc.path().to_vec();
        let cell = self
            .memory
            .get_mut(&root)
            .unwrap_or_else(|| panic!("precondition violation: location root {root} missing from memory"));
        let mut ty = cell.ty.clone();
        let mut obj = &mut cell.object;
        for &idx in &path {
            let field_count = ty.stored_property_types().len();
            let disaggregated = std::mem::replace(obj, Object::Partial(Vec::new())).disaggregate(field_count);
            *obj = disaggregated;
            match obj {
                Object::Partial(parts) => {
                    ty = ty.stored_property_types()[idx].clone();
                    obj = &mut parts[idx];
                }
                Object::Full(_) => unreachable!(),
            }
        }
        obj
    }

    /// Edge-reconciliation merge (§4.4 step 3): a local survives only if
    /// present in every source (value-joined across all of them); memory
    /// cells are unioned, joining cell-wise on collision.
    pub fn join(sources: &[Context]) -> Context {
        assert!(!sources.is_empty(), "precondition violation: joining zero contexts");

        let mut locals = BTreeMap::new();
        if let Some(first) = sources.first() {
            'keys: for key in first.locals.keys() {
                let mut joined: Option<Value> = None;
                for source in sources {
                    match source.locals.get(key) {
                        None => continue 'keys,
                        Some(value) => {
                            joined = Some(match joined {
                                None => value.clone(),
                                Some(acc) => acc.join(value),
                            });
                        }
                    }
                }
                if let Some(value) = joined {
                    locals.insert(*key, value);
                }
            }
        }

        let mut memory: BTreeMap<Root, Cell> = BTreeMap::new();
        for source in sources {
            for (&root, cell) in &source.memory {
                memory
                    .entry(root)
                    .and_modify(|existing: &mut Cell| {
                        assert_eq!(
                            existing.ty, cell.ty,
                            "precondition violation: merged cells at {root} disagree on type"
                        );
                        existing.object = existing.object.join(&cell.object);
                    })
                    .or_insert_with(|| cell.clone());
            }
        }

        Context { locals, memory }
    }
}
