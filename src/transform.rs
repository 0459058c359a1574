//! Integer remaps describing which states of an automaton survive and which are merged.
//!
//! A `Transformation` never touches the automaton it describes. Pipelines stack them with
//! `compose`, and a `View` pairs one with the automaton it was computed for.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::error::{Error, Result};
use crate::nfa::StateId;

/// Remap from an automaton's id space to a canonical id space.
///
/// `remap[i] == None` deletes `i`. `remap[i] == Some(c)` merges `i` into `c`, and `c` itself
/// always satisfies `remap[c] == Some(c)`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Transformation {
    remap: Vec<Option<StateId>>,
}

impl Transformation {
    pub fn identity(n: usize) -> Self {
        Transformation {
            remap: (0..n).map(Some).collect(),
        }
    }

    /// Deletes every listed state. Ids `>= n` are ignored.
    pub fn deletion<I>(n: usize, deleted: I) -> Self
        where I: IntoIterator<Item = StateId>
    {
        let mut remap: Vec<_> = (0..n).map(Some).collect();
        for id in deleted {
            if let Some(slot) = remap.get_mut(id) {
                *slot = None;
            }
        }
        Transformation { remap }
    }

    /// Checks bounds and that every target is a fixed point.
    pub fn from_remap(remap: Vec<Option<StateId>>) -> Result<Self> {
        let n = remap.len();
        for (i, target) in remap.iter().enumerate() {
            if let Some(c) = *target {
                if c >= n {
                    return Err(Error::UnknownState { id: c, len: n });
                }
                if remap[c] != Some(c) {
                    return Err(Error::PreconditionViolation(format!(
                        "state {} maps to {} which is not canonical",
                        i, c
                    )));
                }
            }
        }
        Ok(Transformation { remap })
    }

    /// Trusted construction for remaps built by this crate's own analyses.
    pub(crate) fn from_parts(remap: Vec<Option<StateId>>) -> Self {
        debug_assert!(remap.iter().all(|t| t.map_or(true, |c| remap.get(c) == Some(&Some(c)))));
        Transformation { remap }
    }

    /// Applies `self`, then `other`.
    ///
    /// `other` is read in the id space `self` maps into, so deleting in either operand
    /// deletes in the result and merges in `other` collapse the groups `self` formed.
    pub fn compose(&self, other: &Transformation) -> Transformation {
        Transformation {
            remap: self
                .remap
                .iter()
                .map(|target| target.and_then(|c| other.get(c)))
                .collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.remap.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remap.is_empty()
    }

    /// Canonical id of `id`, `None` if deleted or out of range.
    #[inline]
    pub fn get(&self, id: StateId) -> Option<StateId> {
        self.remap.get(id).copied().flatten()
    }

    #[inline]
    pub fn is_canonical(&self, id: StateId) -> bool {
        self.get(id) == Some(id)
    }

    #[inline]
    pub fn is_deleted(&self, id: StateId) -> bool {
        self.get(id).is_none()
    }

    pub fn is_identity(&self) -> bool {
        self.remap.iter().enumerate().all(|(i, &t)| t == Some(i))
    }

    pub fn remap(&self) -> &[Option<StateId>] {
        &self.remap
    }

    /// Canonical states in ascending order.
    pub fn canonical_states(&self) -> impl Iterator<Item = StateId> + '_ {
        self.remap
            .iter()
            .enumerate()
            .filter(|&(i, &t)| t == Some(i))
            .map(|(i, _)| i)
    }

    /// Source states of every canonical state, both in ascending order.
    pub fn groups(&self) -> BTreeMap<StateId, Vec<StateId>> {
        let mut groups: BTreeMap<StateId, Vec<StateId>> = BTreeMap::new();
        for (i, target) in self.remap.iter().enumerate() {
            if let Some(c) = *target {
                groups.entry(c).or_default().push(i);
            }
        }
        groups
    }

    /// The remap in its flat integer form, `-1` marking deletion.
    pub fn to_signed(&self) -> Vec<i64> {
        self.remap
            .iter()
            .map(|t| t.map_or(-1, |c| c as i64))
            .collect()
    }
}

impl Serialize for Transformation {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.remap.len()))?;
        for value in self.to_signed() {
            seq.serialize_element(&value)?;
        }
        seq.end()
    }
}
