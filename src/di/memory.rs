//! The symbolic memory model (C2): `Root`, `Location`, `Cell`.

use super::lattice::Object;
use crate::ir::{FieldPath, InstId, Ty};
use std::fmt;

/// The two ways a piece of memory can come into existence: a function
/// argument slot, or the result of an `alloc_stack`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Root {
    Arg(u32),
    Inst(InstId),
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Root::Arg(i) => write!(f, "arg{i}"),
            Root::Inst(id) => write!(f, "{id}"),
        }
    }
}

/// A symbolic address: either nothing (a precondition-violation sentinel,
/// never a member of `Context.memory`'s key space or any `Locations` set),
/// a bare root, or a root plus a non-empty field path. `Sub` is always
/// rooted directly in a `Root` — nested `Sub`s are flattened on
/// construction so two locations naming the same address always compare
/// equal without needing a second canonicalization pass.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Location {
    Null,
    Root(Root),
    Sub(Root, FieldPath),
}

impl Location {
    pub fn arg(index: u32) -> Self {
        Location::Root(Root::Arg(index))
    }

    pub fn inst(id: InstId) -> Self {
        Location::Root(Root::Inst(id))
    }

    pub fn root(&self) -> Option<Root> {
        match self {
            Location::Null => None,
            Location::Root(r) | Location::Sub(r, _) => Some(*r),
        }
    }

    pub fn path(&self) -> &[usize] {
        match self {
            Location::Sub(_, p) => p,
            _ => &[],
        }
    }

    /// Project a further field path onto this location, flattening into a
    /// single `Sub(root, path)`.
    pub fn append(&self, extra: &[usize]) -> Self {
        if extra.is_empty() {
            return self.clone();
        }
        match self {
            Location::Null => panic!("precondition violation: projecting a field path onto the null location"),
            Location::Root(r) => Location::Sub(*r, extra.iter().copied().collect()),
            Location::Sub(r, p) => {
                let mut np = p.clone();
                np.extend_from_slice(extra);
                Location::Sub(*r, np)
            }
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Location::Null => write!(f, "null"),
            Location::Root(r) => write!(f, "{r}"),
            Location::Sub(r, path) => {
                write!(f, "{r}")?;
                for idx in path {
                    write!(f, ".{idx}")?;
                }
                Ok(())
            }
        }
    }
}

/// A memory cell: the statically-known type of the storage, and the
/// (possibly disaggregated) object living in it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub ty: Ty,
    pub object: Object,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_flattens_into_a_single_sub() {
        let root = Location::arg(0);
        let once = root.append(&[1]);
        let twice = once.append(&[2]);
        assert_eq!(twice, Location::Sub(Root::Arg(0), FieldPath::from_slice(&[1, 2])));
    }

    #[test]
    fn append_with_empty_path_is_identity() {
        let root = Location::arg(3);
        assert_eq!(root.append(&[]), root);
    }
}
