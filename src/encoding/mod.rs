//! The three formulations of the timetabling problem.
//!
//! Every encoder is a pure function of a validated [`ConflictGraph`]: it writes a
//! fresh [`Model`] and returns it together with the variable layout the decoder
//! needs to read a solution back. Nothing is kept once `encode` returns.

pub mod all_different;
pub mod rooms;
pub mod session_indexed;
pub mod slot_indexed;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::SolveOptions;
use crate::error::TimetableError;
use crate::graph::ConflictGraph;
use crate::model::{Model, VarHandle};

pub use all_different::AllDifferentEncoder;
pub use rooms::RoomSelection;
pub use session_indexed::SessionIndexedEncoder;
pub use slot_indexed::SlotIndexedEncoder;

/// Which formulation to submit to the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Encoding {
    /// Model A: one boolean per (subject, slot) over a small slot bound.
    #[default]
    FlatSlotMip,
    /// Model B: Model A over a larger session pool, compacted after solving.
    SessionIndexedMip,
    /// Model D: one integer slot per subject, all-different and reified room layer.
    AllDifferentCp,
}

impl Encoding {
    pub const ALL: [Encoding; 3] = [
        Encoding::FlatSlotMip,
        Encoding::SessionIndexedMip,
        Encoding::AllDifferentCp,
    ];

    /// The encoder for this formulation, sized for `graph`.
    pub fn encoder(self, options: &SolveOptions, graph: &ConflictGraph) -> Box<dyn Encoder> {
        match self {
            Encoding::FlatSlotMip => {
                Box::new(SlotIndexedEncoder::new(options.slot_bound_for(graph)))
            }
            Encoding::SessionIndexedMip => {
                Box::new(SessionIndexedEncoder::new(options.session_bound_for(graph)))
            }
            Encoding::AllDifferentCp => {
                Box::new(AllDifferentEncoder::new(options.slot_bound_for(graph)))
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::FlatSlotMip => "flat-slot-mip",
            Encoding::SessionIndexedMip => "session-indexed-mip",
            Encoding::AllDifferentCp => "all-different-cp",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Encoding {
    type Err = TimetableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Encoding::ALL
            .into_iter()
            .find(|e| e.as_str() == s)
            .ok_or_else(|| {
                TimetableError::invalid(format!(
                    "unknown encoding '{s}', expected one of flat-slot-mip, session-indexed-mip, all-different-cp"
                ))
            })
    }
}

/// A formulation strategy.
pub trait Encoder: Send {
    fn encoding(&self) -> Encoding;

    fn encode(&self, graph: &ConflictGraph<'_>) -> EncodedModel;
}

/// Variables of the slot- and session-indexed integer programs.
#[derive(Debug, Clone)]
pub struct IndexedLayout {
    /// `assign[s][t]`: subject `s` runs in slot (or session) `t`.
    pub assign: Vec<Vec<VarHandle>>,
    /// `used[t]`: slot (or session) `t` hosts at least one subject.
    pub used: Vec<VarHandle>,
    pub rooms: RoomSelection,
}

#[derive(Debug, Clone)]
pub struct AllDifferentLayout {
    pub slot: Vec<VarHandle>,
    pub max_slot: VarHandle,
    pub rooms: RoomSelection,
}

#[derive(Debug, Clone)]
pub enum Layout {
    SlotIndexed(IndexedLayout),
    SessionIndexed(IndexedLayout),
    AllDifferent(AllDifferentLayout),
}

/// A finished model and the layout needed to decode its solution.
#[derive(Debug, Clone)]
pub struct EncodedModel {
    pub encoding: Encoding,
    pub model: Model,
    pub layout: Layout,
}
