use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::encoding::Encoding;
use crate::error::{Result, TimetableError};

// Type aliases for clarity
pub type SubjectId = u32;
pub type RoomId = u32;
pub type Slot = u32;

/// An exam subject and the number of students sitting it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Subject {
    pub id: SubjectId,
    pub demand: u32,
}

/// Represents a physical room with a given seat capacity.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Room {
    pub id: RoomId,
    pub capacity: u32,
}

/// Two subjects that share students and therefore cannot sit in the same slot.
/// The pair is unordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct ConflictEdge(pub SubjectId, pub SubjectId);

impl ConflictEdge {
    /// The same edge with its endpoints in ascending order.
    pub fn normalized(self) -> Self {
        if self.0 <= self.1 {
            self
        } else {
            ConflictEdge(self.1, self.0)
        }
    }
}

/// The complete input of the timetabling problem. Loaded once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemInstance {
    pub subjects: Vec<Subject>,
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub conflicts: Vec<ConflictEdge>,
}

impl ProblemInstance {
    /// Builds an instance whose subject and room ids are their list positions.
    pub fn new(demands: &[u32], capacities: &[u32], conflicts: &[(SubjectId, SubjectId)]) -> Self {
        ProblemInstance {
            subjects: (0..)
                .zip(demands)
                .map(|(id, &demand)| Subject { id, demand })
                .collect(),
            rooms: (0..)
                .zip(capacities)
                .map(|(id, &capacity)| Room { id, capacity })
                .collect(),
            conflicts: conflicts.iter().map(|&(a, b)| ConflictEdge(a, b)).collect(),
        }
    }

    pub fn num_subjects(&self) -> usize {
        self.subjects.len()
    }

    pub fn num_rooms(&self) -> usize {
        self.rooms.len()
    }

    pub fn total_capacity(&self) -> u64 {
        self.rooms.iter().map(|r| u64::from(r.capacity)).sum()
    }
}

/// Parses the whitespace separated text format:
///
/// ```text
/// <numSubjects> <numConflicts> <numRooms>
/// <demand_0> ... <demand_{S-1}>
/// <capacity_0> ... <capacity_{R-1}>
/// <a_0> <b_0>
/// ...
/// ```
impl FromStr for ProblemInstance {
    type Err = TimetableError;

    fn from_str(text: &str) -> Result<Self> {
        let mut tokens = text.split_whitespace();

        let num_subjects = next_number(&mut tokens, "number of subjects")?;
        let num_conflicts = next_number(&mut tokens, "number of conflicts")?;
        let num_rooms = next_number(&mut tokens, "number of rooms")?;

        let demands = (0..num_subjects)
            .map(|i| next_number(&mut tokens, &format!("demand of subject {i}")))
            .collect::<Result<Vec<_>>>()?;
        let capacities = (0..num_rooms)
            .map(|i| next_number(&mut tokens, &format!("capacity of room {i}")))
            .collect::<Result<Vec<_>>>()?;
        let conflicts = (0..num_conflicts)
            .map(|i| {
                let a = next_number(&mut tokens, &format!("first subject of conflict {i}"))?;
                let b = next_number(&mut tokens, &format!("second subject of conflict {i}"))?;
                Ok((a, b))
            })
            .collect::<Result<Vec<_>>>()?;

        if let Some(extra) = tokens.next() {
            return Err(TimetableError::invalid(format!(
                "unexpected trailing token '{extra}' after {num_conflicts} conflicts"
            )));
        }

        Ok(ProblemInstance::new(&demands, &capacities, &conflicts))
    }
}

fn next_number<'a>(tokens: &mut impl Iterator<Item = &'a str>, what: &str) -> Result<u32> {
    let token = tokens
        .next()
        .ok_or_else(|| TimetableError::invalid(format!("missing {what}")))?;
    let value: i64 = token
        .parse()
        .map_err(|_| TimetableError::invalid(format!("{what} is not an integer: '{token}'")))?;
    if value < 0 {
        return Err(TimetableError::invalid(format!("{what} is negative: {value}")));
    }
    u32::try_from(value)
        .map_err(|_| TimetableError::invalid(format!("{what} is too large: {value}")))
}

/// The slot and rooms given to one subject.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAssignment {
    pub subject_id: SubjectId,
    pub slot: Slot,
    pub rooms: Vec<RoomId>,
}

impl fmt::Display for SubjectAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "subject {} -> slot {}, rooms {:?}", self.subject_id, self.slot, self.rooms)
    }
}

/// The final output of a solve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timetable {
    pub encoding: Encoding,
    /// One entry per subject, ordered by subject id.
    pub assignments: Vec<SubjectAssignment>,
    /// Number of distinct slots that host at least one subject.
    pub slots_used: u32,
    /// Objective value of the submitted model, evaluated on the returned values.
    pub objective: f64,
    /// False when the solver stopped on its time limit before proving optimality.
    pub optimal: bool,
}

impl Timetable {
    pub fn slot_of(&self, subject: SubjectId) -> Option<Slot> {
        self.assignments
            .iter()
            .find(|a| a.subject_id == subject)
            .map(|a| a.slot)
    }

    /// Checks the structural invariants every produced timetable must satisfy:
    /// one slot per subject, rooms covering demand, conflicting subjects apart and no
    /// room shared by two subjects in the same slot.
    pub fn verify(&self, instance: &ProblemInstance) -> Result<()> {
        if self.assignments.len() != instance.num_subjects() {
            return Err(TimetableError::inconsistent(format!(
                "{} assignments for {} subjects",
                self.assignments.len(),
                instance.num_subjects()
            )));
        }

        let mut by_subject: HashMap<SubjectId, &SubjectAssignment> = HashMap::new();
        for assignment in &self.assignments {
            if by_subject.insert(assignment.subject_id, assignment).is_some() {
                return Err(TimetableError::inconsistent(format!(
                    "subject {} is assigned more than once",
                    assignment.subject_id
                )));
            }
        }

        for subject in &instance.subjects {
            let assignment = by_subject.get(&subject.id).ok_or_else(|| {
                TimetableError::inconsistent(format!("subject {} has no slot", subject.id))
            })?;
            let mut seats = 0u64;
            for room_id in &assignment.rooms {
                let room = instance.rooms.get(*room_id as usize).ok_or_else(|| {
                    TimetableError::inconsistent(format!(
                        "subject {} uses unknown room {}",
                        subject.id, room_id
                    ))
                })?;
                seats += u64::from(room.capacity);
            }
            if seats < u64::from(subject.demand) {
                return Err(TimetableError::inconsistent(format!(
                    "subject {} has {} students but only {} seats",
                    subject.id, subject.demand, seats
                )));
            }
        }

        for edge in &instance.conflicts {
            let (Some(a), Some(b)) = (by_subject.get(&edge.0), by_subject.get(&edge.1)) else {
                return Err(TimetableError::inconsistent(format!(
                    "conflict ({}, {}) names a subject without a slot",
                    edge.0, edge.1
                )));
            };
            if a.slot == b.slot {
                return Err(TimetableError::inconsistent(format!(
                    "conflicting subjects {} and {} share slot {}",
                    edge.0, edge.1, a.slot
                )));
            }
        }

        let mut taken: HashMap<(Slot, RoomId), SubjectId> = HashMap::new();
        for assignment in &self.assignments {
            for &room in &assignment.rooms {
                if let Some(other) = taken.insert((assignment.slot, room), assignment.subject_id) {
                    if other != assignment.subject_id {
                        return Err(TimetableError::inconsistent(format!(
                            "room {} is used by subjects {} and {} in slot {}",
                            room, other, assignment.subject_id, assignment.slot
                        )));
                    }
                }
            }
        }

        let distinct: BTreeSet<Slot> = self.assignments.iter().map(|a| a.slot).collect();
        if distinct.len() != self.slots_used as usize {
            return Err(TimetableError::inconsistent(format!(
                "timetable reports {} slots but uses {}",
                self.slots_used,
                distinct.len()
            )));
        }

        Ok(())
    }
}

impl fmt::Display for Timetable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} slots used ({}, objective {}{})",
            self.slots_used,
            self.encoding,
            self.objective,
            if self.optimal { "" } else { ", not proven optimal" }
        )?;
        for assignment in &self.assignments {
            writeln!(f, "  {assignment}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timetable(assignments: Vec<SubjectAssignment>, slots_used: u32) -> Timetable {
        Timetable {
            encoding: Encoding::FlatSlotMip,
            assignments,
            slots_used,
            objective: f64::from(slots_used),
            optimal: true,
        }
    }

    fn at(subject_id: SubjectId, slot: Slot, rooms: &[RoomId]) -> SubjectAssignment {
        SubjectAssignment { subject_id, slot, rooms: rooms.to_vec() }
    }

    #[test]
    fn test_parse_text_format() {
        let text = "4 3 2\n10 10 10 10\n10 10\n0 1\n1 2\n2 3\n";
        let instance: ProblemInstance = text.parse().unwrap();
        assert_eq!(instance.num_subjects(), 4);
        assert_eq!(instance.num_rooms(), 2);
        assert_eq!(instance.subjects[3], Subject { id: 3, demand: 10 });
        assert_eq!(instance.rooms[1], Room { id: 1, capacity: 10 });
        assert_eq!(
            instance.conflicts,
            vec![ConflictEdge(0, 1), ConflictEdge(1, 2), ConflictEdge(2, 3)]
        );
    }

    #[test]
    fn test_parse_rejects_negative_demand() {
        let err = "1 0 1\n-5\n10\n".parse::<ProblemInstance>().unwrap_err();
        assert!(matches!(err, TimetableError::InvalidInstance(_)));
    }

    #[test]
    fn test_parse_rejects_missing_tokens() {
        let err = "2 1 1\n10 10\n10\n0\n".parse::<ProblemInstance>().unwrap_err();
        assert!(matches!(err, TimetableError::InvalidInstance(ref m) if m.contains("missing")));
    }

    #[test]
    fn test_parse_rejects_trailing_tokens() {
        let err = "1 0 1\n10\n10\n0 1\n".parse::<ProblemInstance>().unwrap_err();
        assert!(matches!(err, TimetableError::InvalidInstance(_)));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = "1 0 x\n".parse::<ProblemInstance>().unwrap_err();
        assert!(matches!(err, TimetableError::InvalidInstance(_)));
    }

    #[test]
    fn test_instance_json_shape() {
        let instance = ProblemInstance::new(&[5], &[7], &[]);
        let json = serde_json::to_value(&instance).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "subjects": [{ "id": 0, "demand": 5 }],
                "rooms": [{ "id": 0, "capacity": 7 }],
                "conflicts": []
            })
        );
    }

    #[test]
    fn test_verify_accepts_valid_timetable() {
        let instance =
            ProblemInstance::new(&[10, 10, 10, 10], &[10, 10], &[(0, 1), (1, 2), (2, 3)]);
        let t = timetable(vec![at(0, 0, &[0]), at(1, 1, &[0]), at(2, 0, &[1]), at(3, 1, &[1])], 2);
        assert_eq!(t.verify(&instance), Ok(()));
    }

    #[test]
    fn test_verify_rejects_conflict_in_same_slot() {
        let instance = ProblemInstance::new(&[1, 1], &[1, 1], &[(0, 1)]);
        let t = timetable(vec![at(0, 0, &[0]), at(1, 0, &[1])], 1);
        assert!(matches!(t.verify(&instance), Err(TimetableError::InconsistentSolution(_))));
    }

    #[test]
    fn test_verify_rejects_shared_room() {
        let instance = ProblemInstance::new(&[1, 1], &[1, 1], &[]);
        let t = timetable(vec![at(0, 0, &[0]), at(1, 0, &[0])], 1);
        assert!(matches!(t.verify(&instance), Err(TimetableError::InconsistentSolution(_))));
    }

    #[test]
    fn test_verify_rejects_uncovered_demand() {
        let instance = ProblemInstance::new(&[50], &[40, 20], &[]);
        let t = timetable(vec![at(0, 0, &[0])], 1);
        assert!(matches!(t.verify(&instance), Err(TimetableError::InconsistentSolution(_))));
    }

    #[test]
    fn test_verify_accepts_multi_room_split() {
        let instance = ProblemInstance::new(&[50], &[40, 20], &[]);
        let t = timetable(vec![at(0, 0, &[0, 1])], 1);
        assert_eq!(t.verify(&instance), Ok(()));
    }
}
