//! The abstract value lattice (C1): `ObjectState`, `Object`, `Summary`,
//! and `difference`. Every algebraic law here is exercised directly by
//! `tests/lattice_laws.rs`.
//!
//! The shape (a tagged tree distinguishing a single state from a
//! record's per-field states) is deliberately not the flat place-set
//! representation prusti-dev's `DefinitelyInitializedState` uses; that
//! domain tracks a `HashSet` of fully-initialized places directly, which
//! doesn't give a canonical per-field `Consumed(by: ...)` provenance set
//! the way a tree of `ObjectState` does. The invariant-checking *style*
//! (debug assertions on well-formedness) is borrowed from it regardless.

use crate::ir::{FieldPath, InstId};
use std::collections::BTreeSet;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectState {
    Initialized,
    Uninitialized,
    Consumed(BTreeSet<InstId>),
}

impl ObjectState {
    /// The conservative merge: `Initialized` only survives when every
    /// source agrees; anything else wins, and two `Consumed` sets union
    /// their provenance rather than picking one arbitrarily.
    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (ObjectState::Initialized, other) => other.clone(),
            (this, ObjectState::Initialized) => this.clone(),
            (ObjectState::Uninitialized, ObjectState::Uninitialized) => ObjectState::Uninitialized,
            (ObjectState::Uninitialized, ObjectState::Consumed(c)) | (ObjectState::Consumed(c), ObjectState::Uninitialized) => {
                ObjectState::Consumed(c.clone())
            }
            (ObjectState::Consumed(a), ObjectState::Consumed(b)) => ObjectState::Consumed(a.union(b).cloned().collect()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Object {
    Full(ObjectState),
    Partial(Vec<Object>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Summary {
    FullyInitialized,
    FullyUninitialized,
    FullyConsumed(BTreeSet<InstId>),
    PartiallyInitialized(Vec<FieldPath>),
    PartiallyConsumed(BTreeSet<InstId>, Vec<FieldPath>),
}

impl Object {
    pub fn full(state: ObjectState) -> Self {
        Object::Full(state)
    }

    /// Collapse a `Partial` whose parts have all converged back to the
    /// same full state. Applied recursively, bottom-up.
    pub fn canonicalize(self) -> Self {
        match self {
            Object::Partial(parts) => {
                let parts: Vec<Object> = parts.into_iter().map(Object::canonicalize).collect();
                debug_assert!(!parts.is_empty(), "precondition violation: a Partial object has no parts");
                if let Some(Object::Full(first)) = parts.first() {
                    if parts.iter().all(|p| matches!(p, Object::Full(s) if s == first)) {
                        return Object::Full(first.clone());
                    }
                }
                Object::Partial(parts)
            }
            full @ Object::Full(_) => full,
        }
    }

    /// Expand a `Full` object into `field_count` identical parts. A
    /// no-op on an already-`Partial` object (lazy disaggregation never
    /// re-splits what is already split).
    pub fn disaggregate(self, field_count: usize) -> Self {
        match self {
            Object::Full(state) => Object::Partial(vec![Object::Full(state); field_count]),
            partial @ Object::Partial(_) => partial,
        }
    }

    pub fn join(&self, other: &Self) -> Self {
        match (self, other) {
            (Object::Full(a), Object::Full(b)) => Object::Full(a.join(b)),
            (Object::Partial(a), Object::Partial(b)) if a.len() == b.len() => {
                Object::Partial(a.iter().zip(b.iter()).map(|(x, y)| x.join(y)).collect()).canonicalize()
            }
            (Object::Full(_), Object::Partial(b)) => self.clone().disaggregate(b.len()).join(other).canonicalize(),
            (Object::Partial(a), Object::Full(_)) => self.join(&other.clone().disaggregate(a.len())).canonicalize(),
            _ => unreachable!("precondition violation: mismatched partial arity at join — violates the locations-of-equal-extent invariant"),
        }
    }

    pub fn summary(&self) -> Summary {
        let canon = self.clone().canonicalize();
        match &canon {
            Object::Full(ObjectState::Initialized) => Summary::FullyInitialized,
            Object::Full(ObjectState::Uninitialized) => Summary::FullyUninitialized,
            Object::Full(ObjectState::Consumed(c)) => Summary::FullyConsumed(c.clone()),
            Object::Partial(_) => {
                let mut initialized = Vec::new();
                let mut consumed = BTreeSet::new();
                collect_paths(&canon, FieldPath::new(), &mut initialized, &mut consumed);
                if consumed.is_empty() {
                    Summary::PartiallyInitialized(initialized)
                } else {
                    Summary::PartiallyConsumed(consumed, initialized)
                }
            }
        }
    }

    /// The field paths that are fully initialized in this object.
    pub fn initialized_paths(&self) -> Vec<FieldPath> {
        match self.summary() {
            Summary::FullyInitialized => vec![FieldPath::new()],
            Summary::PartiallyInitialized(paths) | Summary::PartiallyConsumed(_, paths) => paths,
            Summary::FullyUninitialized | Summary::FullyConsumed(_) => Vec::new(),
        }
    }

    /// The field paths that are *not* fully initialized (uninitialized or
    /// consumed, leaf by leaf).
    pub fn uninitialized_or_consumed_paths(&self) -> Vec<FieldPath> {
        let canon = self.clone().canonicalize();
        match &canon {
            Object::Full(ObjectState::Initialized) => Vec::new(),
            Object::Full(_) => vec![FieldPath::new()],
            Object::Partial(parts) => {
                let mut out = Vec::new();
                for (i, part) in parts.iter().enumerate() {
                    for mut path in part.uninitialized_or_consumed_paths() {
                        path.insert(0, i);
                        out.push(path);
                    }
                }
                out
            }
        }
    }
}

fn collect_paths(obj: &Object, prefix: FieldPath, initialized: &mut Vec<FieldPath>, consumed: &mut BTreeSet<InstId>) {
    match obj {
        Object::Full(ObjectState::Initialized) => initialized.push(prefix),
        Object::Full(ObjectState::Consumed(c)) => consumed.extend(c.iter().cloned()),
        Object::Full(ObjectState::Uninitialized) => {}
        Object::Partial(parts) => {
            for (i, part) in parts.iter().enumerate() {
                let mut path = prefix.clone();
                path.push(i);
                collect_paths(part, path, initialized, consumed);
            }
        }
    }
}

/// The set of record paths initialized in `a` but not in `b` — the
/// `load`+`deinit` repair pairs needed to bring `a` down to `b`.
pub fn difference(a: &Object, b: &Object) -> Vec<FieldPath> {
    match (a, b) {
        (Object::Full(ObjectState::Initialized), _) => b.uninitialized_or_consumed_paths(),
        (Object::Full(_), _) => Vec::new(),
        (Object::Partial(pa), Object::Partial(pb)) if pa.len() == pb.len() => {
            let mut out = Vec::new();
            for (i, (x, y)) in pa.iter().zip(pb.iter()).enumerate() {
                for mut path in difference(x, y) {
                    path.insert(0, i);
                    out.push(path);
                }
            }
            out
        }
        (Object::Partial(pa), Object::Full(_)) => difference(a, &b.clone().disaggregate(pa.len())),
        _ => unreachable!("precondition violation: mismatched shapes in difference — violates the locations-of-equal-extent invariant"),
    }
}
