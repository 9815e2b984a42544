// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transitive closure computation over direct edges.
//!
//! The closure is a pure function of the set of active direct edges. Only pairs reachable over
//! two or more hops which are not already connected by a direct edge are materialized as indirect
//! edges, everything else would be redundant.
use std::collections::{BTreeSet, HashSet};

use petgraph::graphmap::DiGraphMap;
use rolegraph_store::{Pair, RoleId};
use serde::{Deserialize, Serialize};

/// Compute all pairs `(i, k)` with `i != k` for which a path of direct edges from `i` to `k`
/// exists.
///
/// The result includes the direct edges themselves (unless they are self-loops).
pub fn transitive_closure(direct: &HashSet<Pair>) -> HashSet<Pair> {
    let mut graph: DiGraphMap<RoleId, ()> = DiGraphMap::with_capacity(direct.len(), direct.len());
    for (parent, child) in direct {
        graph.add_edge(*parent, *child, ());
    }

    let mut closure: HashSet<Pair> = direct
        .iter()
        .filter(|(parent, child)| parent != child)
        .copied()
        .collect();

    // Every newly discovered pair is composed with the direct edges leaving its end exactly
    // once.
    let mut worklist: Vec<Pair> = closure.iter().copied().collect();
    while let Some((start, end)) = worklist.pop() {
        for next in graph.neighbors(end) {
            if next != start && closure.insert((start, next)) {
                worklist.push((start, next));
            }
        }
    }

    closure
}

/// Changes needed to bring the stored indirect edges in line with the direct ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClosureDiff {
    /// Indirect edges which should be active after applying the diff.
    pub target: HashSet<Pair>,

    /// Active indirect edges which need to be soft-deleted, sorted.
    pub obsolete: Vec<Pair>,

    /// Indirect edges which need to be inserted or undeleted, sorted.
    pub new: Vec<Pair>,
}

impl ClosureDiff {
    /// Compare the closure of the given active direct edges with the currently active indirect
    /// edges.
    pub fn compute(direct: &HashSet<Pair>, indirect: &HashSet<Pair>) -> Self {
        let target: HashSet<Pair> = transitive_closure(direct)
            .into_iter()
            .filter(|pair| !direct.contains(pair))
            .collect();

        // Indirect rows duplicating a direct edge are not part of the target set and get removed
        // here as well.
        let mut obsolete: Vec<Pair> = indirect.difference(&target).copied().collect();
        obsolete.sort();

        let mut new: Vec<Pair> = target.difference(indirect).copied().collect();
        new.sort();

        Self {
            target,
            obsolete,
            new,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.obsolete.is_empty() && self.new.is_empty()
    }
}

/// Outcome of reconciling the stored closure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureReport {
    /// Indirect edges which were inserted or undeleted.
    pub created: Vec<Pair>,

    /// Indirect edges which were soft-deleted.
    pub removed: Vec<Pair>,
}

impl ClosureReport {
    /// Returns `true` if the closure was already up-to-date.
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.removed.is_empty()
    }
}

impl From<ClosureDiff> for ClosureReport {
    fn from(diff: ClosureDiff) -> Self {
        Self {
            created: diff.new,
            removed: diff.obsolete,
        }
    }
}

/// Snapshot of all active edges of a role graph.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Closure {
    pub direct: BTreeSet<Pair>,
    pub indirect: BTreeSet<Pair>,
}

impl Closure {
    /// Returns `true` if an active edge of any kind leads from `parent` to `child`.
    pub fn contains(&self, parent: RoleId, child: RoleId) -> bool {
        self.direct.contains(&(parent, child)) || self.indirect.contains(&(parent, child))
    }
}
