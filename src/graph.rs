use itertools::Itertools;
use std::cmp::Reverse;
use std::collections::BTreeSet;

use crate::data::{ConflictEdge, ProblemInstance, RoomId, SubjectId};
use crate::error::{Result, TimetableError};

/// Validated adjacency view over the conflict edges of a [`ProblemInstance`].
///
/// Construction is the single validation gate of the crate: every encoder builds a
/// graph before it creates any variable, so a malformed instance never produces a
/// partial model.
#[derive(Debug, Clone)]
pub struct ConflictGraph<'a> {
    instance: &'a ProblemInstance,
    neighbours: Vec<BTreeSet<SubjectId>>,
    edges: Vec<ConflictEdge>,
}

impl<'a> ConflictGraph<'a> {
    pub fn new(instance: &'a ProblemInstance) -> Result<Self> {
        for (position, subject) in instance.subjects.iter().enumerate() {
            if subject.id as usize != position {
                return Err(TimetableError::invalid(format!(
                    "subject at position {position} has id {}",
                    subject.id
                )));
            }
        }
        for (position, room) in instance.rooms.iter().enumerate() {
            if room.id as usize != position {
                return Err(TimetableError::invalid(format!(
                    "room at position {position} has id {}",
                    room.id
                )));
            }
        }

        let num_subjects = instance.num_subjects();
        let mut neighbours = vec![BTreeSet::new(); num_subjects];
        let mut edges = Vec::with_capacity(instance.conflicts.len());

        for edge in &instance.conflicts {
            let ConflictEdge(a, b) = edge.normalized();
            if b as usize >= num_subjects {
                return Err(TimetableError::invalid(format!(
                    "conflict ({}, {}) references a subject outside 0..{num_subjects}",
                    edge.0, edge.1
                )));
            }
            if a == b {
                return Err(TimetableError::invalid(format!("conflict ({a}, {b}) is a self-loop")));
            }
            // duplicates collapse
            if neighbours[a as usize].insert(b) {
                neighbours[b as usize].insert(a);
                edges.push(ConflictEdge(a, b));
            }
        }

        Ok(ConflictGraph {
            instance,
            neighbours,
            edges,
        })
    }

    pub fn instance(&self) -> &'a ProblemInstance {
        self.instance
    }

    pub fn num_subjects(&self) -> usize {
        self.neighbours.len()
    }

    pub fn neighbours(&self, subject: SubjectId) -> &BTreeSet<SubjectId> {
        &self.neighbours[subject as usize]
    }

    pub fn conflicts(&self, a: SubjectId, b: SubjectId) -> bool {
        self.neighbours
            .get(a as usize)
            .is_some_and(|n| n.contains(&b))
    }

    /// Distinct edges, endpoints ascending, in first-seen order.
    pub fn edges(&self) -> &[ConflictEdge] {
        &self.edges
    }

    pub fn max_degree(&self) -> usize {
        self.neighbours.iter().map(BTreeSet::len).max().unwrap_or(0)
    }

    /// Number of slots used by a first-fit timetable: subjects in order of falling
    /// degree (then demand) take the lowest slot that has no neighbour of theirs and
    /// enough free seats, filling rooms largest first.
    ///
    /// The result is a feasible timetable, so it bounds the optimum from above.
    /// `None` when some subject does not fit even into an empty slot.
    pub fn first_fit_slot_count(&self) -> Option<usize> {
        let rooms = &self.instance.rooms;
        let order = self
            .instance
            .subjects
            .iter()
            .sorted_by_key(|s| {
                (
                    Reverse(self.neighbours[s.id as usize].len()),
                    Reverse(s.demand),
                    s.id,
                )
            });

        let capacities = || rooms.iter().map(|r| (r.id, r.capacity));

        let mut slots: Vec<(BTreeSet<SubjectId>, Vec<bool>)> = Vec::new();
        for subject in order {
            let fits = |members: &BTreeSet<SubjectId>, taken: &[bool]| {
                members.is_disjoint(&self.neighbours[subject.id as usize])
                    && first_fit_rooms(subject.demand, capacities(), taken).is_some()
            };
            let position = match slots.iter().position(|(members, taken)| fits(members, taken)) {
                Some(position) => position,
                None => {
                    slots.push((BTreeSet::new(), vec![false; rooms.len()]));
                    slots.len() - 1
                }
            };
            let (members, taken) = &mut slots[position];
            let chosen = first_fit_rooms(subject.demand, capacities(), taken)?;
            for room in chosen {
                taken[room as usize] = true;
            }
            members.insert(subject.id);
        }
        Some(slots.len())
    }

    /// Lazily yields every unordered subject pair `(s1, s2)` with `s1 < s2`.
    pub fn subject_pairs(&self) -> impl Iterator<Item = (SubjectId, SubjectId)> + '_ {
        (0..self.num_subjects() as SubjectId).tuple_combinations()
    }

    /// Unordered pairs that are free to share a slot, i.e. not joined by an edge.
    pub fn compatible_pairs(&self) -> impl Iterator<Item = (SubjectId, SubjectId)> + '_ {
        self.subject_pairs().filter(|&(a, b)| !self.conflicts(a, b))
    }
}

/// Free rooms, largest first, until `demand` seats are covered.
fn first_fit_rooms(
    demand: u32,
    rooms: impl Iterator<Item = (RoomId, u32)>,
    taken: &[bool],
) -> Option<Vec<RoomId>> {
    let mut chosen = Vec::new();
    let mut seats = 0u64;
    for (room, capacity) in rooms
        .filter(|&(room, _)| !taken[room as usize])
        .sorted_by_key(|&(room, capacity)| (Reverse(capacity), room))
    {
        if seats >= u64::from(demand) {
            break;
        }
        seats += u64::from(capacity);
        chosen.push(room);
    }
    (seats >= u64::from(demand)).then_some(chosen)
}
