//! Exam timetabling as mathematical programming.
//!
//! A [`ProblemInstance`] (subjects with student counts, rooms with seats, a conflict
//! graph) is formulated as one of three equivalent models, submitted to an external
//! engine through a [`SolverAdapter`] and decoded into a [`Timetable`]: every subject
//! gets a slot and enough rooms, conflicting subjects never share a slot, no room is
//! shared within a slot, and the number of slots is minimised.

pub mod config;
pub mod data;
pub mod decode;
pub mod encoding;
pub mod error;
pub mod graph;
pub mod model;
pub mod server;
pub mod solver;

pub use config::{ServerConfig, SolveOptions};
pub use data::{ConflictEdge, ProblemInstance, Room, Subject, SubjectAssignment, Timetable};
pub use encoding::Encoding;
pub use error::{Result, TimetableError};
pub use graph::ConflictGraph;
pub use solver::{HighsSolver, SolveStatus, SolverAdapter, SolverOutput, solve, solve_all_encodings};
