//! Reading solver values back into a [`Timetable`].

use itertools::Itertools;
use log::debug;
use std::collections::BTreeSet;

use crate::data::{ProblemInstance, Slot, SubjectAssignment, Timetable};
use crate::encoding::session_indexed::compact_sessions;
use crate::encoding::{AllDifferentLayout, EncodedModel, IndexedLayout, Layout};
use crate::error::{Result, TimetableError};
use crate::model::VarHandle;
use crate::solver::{SolveStatus, SolverOutput};

pub fn decode(
    encoded: &EncodedModel,
    instance: &ProblemInstance,
    output: &SolverOutput,
) -> Result<Timetable> {
    let model = &encoded.model;
    if output.values().len() != model.num_vars() {
        return Err(TimetableError::inconsistent(format!(
            "solver returned {} values for {} variables",
            output.values().len(),
            model.num_vars()
        )));
    }
    let solution = SolverOutput::new(output.status.clone(), model.round_values(output.values()));
    if let Some(handle) = model.first_violation(solution.values()) {
        return Err(TimetableError::inconsistent(format!(
            "solution violates constraint #{}: {:?}",
            handle.index(),
            model.constraint(handle)
        )));
    }

    let assignments = match &encoded.layout {
        Layout::SlotIndexed(layout) => decode_indexed(layout, &solution)?,
        Layout::SessionIndexed(layout) => decode_sessions(layout, &solution)?,
        Layout::AllDifferent(layout) => decode_all_different(layout, &solution),
    };
    let slots_used = assignments.iter().map(|a| a.slot).unique().count() as u32;

    let timetable = Timetable {
        encoding: encoded.encoding,
        assignments,
        slots_used,
        objective: model.objective_value(solution.values()),
        optimal: solution.status == SolveStatus::Optimal,
    };
    timetable.verify(instance)?;
    Ok(timetable)
}

/// The single index marked in `row`; zero or several marks are an error.
fn chosen_index(subject: usize, row: &[VarHandle], solution: &SolverOutput) -> Result<usize> {
    let marked: Vec<usize> = row
        .iter()
        .positions(|&var| solution.value_of(var) > 0.5)
        .collect();
    match marked.as_slice() {
        [t] => Ok(*t),
        [] => Err(TimetableError::inconsistent(format!(
            "subject {subject} is not assigned to any slot"
        ))),
        _ => Err(TimetableError::inconsistent(format!(
            "subject {subject} is assigned to slots {marked:?}"
        ))),
    }
}

fn decode_indexed(
    layout: &IndexedLayout,
    solution: &SolverOutput,
) -> Result<Vec<SubjectAssignment>> {
    layout
        .assign
        .iter()
        .enumerate()
        .map(|(s, row)| {
            Ok(SubjectAssignment {
                subject_id: s as u32,
                slot: chosen_index(s, row, solution)? as Slot,
                rooms: layout.rooms.selected(s, solution.values()),
            })
        })
        .collect()
}

fn decode_sessions(
    layout: &IndexedLayout,
    solution: &SolverOutput,
) -> Result<Vec<SubjectAssignment>> {
    let mut assignments = decode_indexed(layout, solution)?;

    let flagged: BTreeSet<usize> = layout
        .used
        .iter()
        .positions(|&var| solution.value_of(var) > 0.5)
        .collect();
    let hosting: BTreeSet<usize> = assignments.iter().map(|a| a.slot as usize).collect();
    if let Some(session) = hosting.difference(&flagged).next() {
        return Err(TimetableError::inconsistent(format!(
            "session {session} hosts subjects but is not flagged as used"
        )));
    }
    let idle = flagged.len() - hosting.len();
    if idle > 0 {
        debug!("{idle} sessions are flagged as used but host no subject; dropping them");
    }

    let dense = compact_sessions(&hosting);
    for assignment in &mut assignments {
        assignment.slot = dense[&(assignment.slot as usize)];
    }
    Ok(assignments)
}

fn decode_all_different(
    layout: &AllDifferentLayout,
    solution: &SolverOutput,
) -> Vec<SubjectAssignment> {
    layout
        .slot
        .iter()
        .enumerate()
        .map(|(s, var)| SubjectAssignment {
            subject_id: s as u32,
            slot: solution.value_of(*var) as Slot,
            rooms: layout.rooms.selected(s, solution.values()),
        })
        .collect()
}
