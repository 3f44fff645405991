use log::info;
use std::collections::{BTreeMap, BTreeSet};

use crate::data::Slot;
use crate::encoding::slot_indexed::build_indexed;
use crate::encoding::{EncodedModel, Encoder, Encoding, Layout};
use crate::graph::ConflictGraph;
use crate::model::Model;

/// Model B: the slot-indexed program over a larger pool of abstract sessions, with
/// `z[t]` flagging used sessions and a capacity constraint coupled to the session
/// choice. Session numbers are compacted into dense slots after solving.
#[derive(Debug, Clone, Copy)]
pub struct SessionIndexedEncoder {
    session_bound: usize,
}

impl SessionIndexedEncoder {
    pub fn new(session_bound: usize) -> Self {
        SessionIndexedEncoder { session_bound }
    }
}

impl Encoder for SessionIndexedEncoder {
    fn encoding(&self) -> Encoding {
        Encoding::SessionIndexedMip
    }

    fn encode(&self, graph: &ConflictGraph<'_>) -> EncodedModel {
        let instance = graph.instance();
        info!(
            "Setting up session-indexed model with {} subjects, {} rooms and {} sessions...",
            instance.num_subjects(),
            instance.num_rooms(),
            self.session_bound
        );
        let mut model = Model::new();
        let layout = build_indexed(&mut model, graph, self.session_bound, "x", "z");

        info!("Adding 'session capacity coupling' constraints...");
        layout
            .rooms
            .add_coupled_covering(&mut model, instance, &layout.assign);

        EncodedModel {
            encoding: Encoding::SessionIndexedMip,
            model,
            layout: Layout::SessionIndexed(layout),
        }
    }
}

/// Maps each used session to a dense slot, keeping their relative order: the lowest
/// used session becomes slot 0.
pub fn compact_sessions(used: &BTreeSet<usize>) -> BTreeMap<usize, Slot> {
    used.iter()
        .enumerate()
        .map(|(slot, &session)| (session, slot as Slot))
        .collect()
}
