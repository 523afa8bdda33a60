//! Grouping of constraints into trace rows.
//!
//! Each constraint starts in a group of its own. Groups sharing the most wires are merged
//! until the target group count is reached, then ordered into a chain so that groups sharing
//! wires land on adjacent rows. Wires that still span more than two rows, or two rows that are
//! not adjacent, become globals: columns that hold the same value on every row.
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use itertools::Itertools;
use tracing::{debug, instrument};

use super::PackingConfig;
use crate::r1cs::R1csDocument;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Group {
    wires: BTreeSet<usize>,
    constraints: Vec<usize>,
}

impl Group {
    fn overlap(&self, other: &Group) -> usize {
        self.wires.intersection(&other.wires).count()
    }

    fn merge(mut self, other: Group) -> Group {
        self.wires.extend(other.wires);
        self.constraints.extend(other.constraints);
        self
    }
}

/// Row assignment of a circuit's wires and constraints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packing {
    /// Local wires of each row, ascending. Globals are excluded.
    pub rows: Vec<Vec<usize>>,
    pub globals: Vec<usize>,
    /// Row holding the group each constraint was merged into.
    pub homes: Vec<usize>,
}

impl Packing {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// Width of the widest row.
    pub fn payload_width(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Position of `wire` among the local wires of `row`.
    pub fn payload_index(&self, row: usize, wire: usize) -> Option<usize> {
        self.rows.get(row)?.binary_search(&wire).ok()
    }

    pub fn global_index(&self, wire: usize) -> Option<usize> {
        self.globals.binary_search(&wire).ok()
    }

    /// Rows `wire` is local to, ascending.
    pub fn rows_of(&self, wire: usize) -> Vec<usize> {
        (0..self.n_rows())
            .filter(|row| self.payload_index(*row, wire).is_some())
            .collect()
    }
}

#[instrument(skip_all, fields(n_constraints = doc.n_constraints()))]
pub fn pack(doc: &R1csDocument, config: &PackingConfig) -> Packing {
    let target = config.target_groups(doc.n_constraints());
    let mut groups = doc
        .constraints
        .iter()
        .enumerate()
        .map(|(i, c)| Group {
            wires: c.wires(),
            constraints: vec![i],
        })
        .collect::<Vec<_>>();

    let mut round = 0;
    while groups.len() > target {
        round += 1;
        groups = merge_round(groups, target);
        debug!(round, groups = groups.len(), "Merge round.");
    }

    let mut chain = order_chain(groups);
    while chain.len() < 2 {
        chain.push(Group::default());
    }

    let mut placements = BTreeMap::<usize, Vec<usize>>::new();
    for (row, group) in chain.iter().enumerate() {
        for wire in &group.wires {
            placements.entry(*wire).or_default().push(row);
        }
    }
    let mut globals = placements
        .iter()
        .filter(|(_, rows)| match rows[..] {
            [_] => false,
            [a, b] => b != a + 1,
            _ => true,
        })
        .map(|(wire, _)| *wire)
        .collect::<BTreeSet<_>>();
    // Public inputs no constraint uses still need a cell to be pinned in.
    globals.extend(
        doc.public_input_wires()
            .filter(|wire| !placements.contains_key(wire)),
    );

    let mut homes = vec![0; doc.n_constraints()];
    for (row, group) in chain.iter().enumerate() {
        for constraint in &group.constraints {
            homes[*constraint] = row;
        }
    }
    let rows = chain
        .into_iter()
        .map(|group| {
            group
                .wires
                .into_iter()
                .filter(|wire| !globals.contains(wire))
                .collect()
        })
        .collect();

    Packing {
        rows,
        globals: globals.into_iter().collect(),
        homes,
    }
}

/// Pairs every group with the unpaired group it overlaps most, lowest index first on ties.
/// Groups without any overlapping partner are then paired in index order. At most
/// `groups.len() - target` pairs are merged, so the count never drops below `target`.
fn merge_round(groups: Vec<Group>, target: usize) -> Vec<Group> {
    let n = groups.len();
    let max_merges = n.saturating_sub(target);
    let mut partner = vec![None; n];
    let mut merges = 0;

    for i in 0..n {
        if merges == max_merges {
            break;
        }
        if partner[i].is_some() {
            continue;
        }
        let best = (i + 1..n)
            .filter(|j| partner[*j].is_none())
            .map(|j| (groups[i].overlap(&groups[j]), j))
            .filter(|(overlap, _)| *overlap > 0)
            .max_by(|(a, ja), (b, jb)| a.cmp(b).then(jb.cmp(ja)));
        if let Some((_, j)) = best {
            partner[i] = Some(j);
            partner[j] = Some(i);
            merges += 1;
        }
    }
    let unpaired = (0..n).filter(|i| partner[*i].is_none()).collect_vec();
    for pair in unpaired.chunks_exact(2) {
        if merges == max_merges {
            break;
        }
        partner[pair[0]] = Some(pair[1]);
        partner[pair[1]] = Some(pair[0]);
        merges += 1;
    }

    let mut slots = groups.into_iter().map(Some).collect_vec();
    let mut merged = Vec::with_capacity(n - merges);
    for i in 0..n {
        let Some(group) = slots[i].take() else {
            continue;
        };
        let group = match partner[i] {
            Some(j) => match slots[j].take() {
                Some(other) => group.merge(other),
                None => group,
            },
            None => group,
        };
        merged.push(group);
    }
    merged
}

/// Orders groups into a chain, growing it from group 0 by repeatedly attaching the remaining
/// group with the greatest overlap with either end.
fn order_chain(groups: Vec<Group>) -> Vec<Group> {
    let mut remaining = groups.into_iter().map(Some).collect_vec();
    let Some(first) = remaining.first_mut().and_then(Option::take) else {
        return Vec::new();
    };
    let mut chain = VecDeque::from([first]);

    for _ in 1..remaining.len() {
        // (overlap, attach at front, index), maximal overlap, tail before head, lowest index.
        let mut best: Option<(usize, bool, usize)> = None;
        for (j, group) in remaining.iter().enumerate() {
            let Some(group) = group else {
                continue;
            };
            let tail = chain.back().map_or(0, |g| g.overlap(group));
            let head = chain.front().map_or(0, |g| g.overlap(group));
            let candidate = if head > tail {
                (head, true, j)
            } else {
                (tail, false, j)
            };
            if best.map_or(true, |b| candidate.0 > b.0) {
                best = Some(candidate);
            }
        }
        let Some((_, front, j)) = best else {
            break;
        };
        if let Some(group) = remaining[j].take() {
            if front {
                chain.push_front(group);
            } else {
                chain.push_back(group);
            }
        }
    }
    chain.into()
}
