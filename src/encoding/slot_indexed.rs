use log::{info, trace};

use crate::encoding::{EncodedModel, Encoder, Encoding, IndexedLayout, Layout, RoomSelection};
use crate::graph::ConflictGraph;
use crate::model::{Model, Sense, VarHandle};

/// Coefficient of the slot indicators in the room exclusivity constraint
/// `M*x[s1][t] + M*x[s2][t] + y[s1][r] + y[s2][r] <= 2M + 1`.
///
/// The room terms sum to at most 2, so with one indicator at 0 the left side is at most
/// `M + 2`, which stays within `2M + 1` for any `M >= 1`. With both at 1 the room terms
/// are held to 1.
pub const ROOM_EXCLUSIVITY_BIG_M: f64 = 2.0;

/// Model A: `x[s][t]` per subject and slot, `u[t]` marking used slots, minimise
/// `sum_t u[t]`.
#[derive(Debug, Clone, Copy)]
pub struct SlotIndexedEncoder {
    slot_bound: usize,
}

impl SlotIndexedEncoder {
    pub fn new(slot_bound: usize) -> Self {
        SlotIndexedEncoder { slot_bound }
    }
}

impl Encoder for SlotIndexedEncoder {
    fn encoding(&self) -> Encoding {
        Encoding::FlatSlotMip
    }

    fn encode(&self, graph: &ConflictGraph<'_>) -> EncodedModel {
        let instance = graph.instance();
        info!(
            "Setting up slot-indexed model with {} subjects, {} rooms and {} slots...",
            instance.num_subjects(),
            instance.num_rooms(),
            self.slot_bound
        );
        let mut model = Model::new();
        let layout = build_indexed(&mut model, graph, self.slot_bound, "x", "u");

        info!("Adding 'capacity covering' constraints...");
        layout.rooms.add_covering(&mut model, instance);

        EncodedModel {
            encoding: Encoding::FlatSlotMip,
            model,
            layout: Layout::SlotIndexed(layout),
        }
    }
}

/// Variables and constraints common to the slot- and session-indexed programs: one slot
/// per subject, usage flags, conflicts and room exclusivity. The capacity constraint is
/// left to the caller.
pub(super) fn build_indexed(
    model: &mut Model,
    graph: &ConflictGraph<'_>,
    bound: usize,
    assign_name: &str,
    used_name: &str,
) -> IndexedLayout {
    let instance = graph.instance();

    let assign: Vec<Vec<VarHandle>> = (0..instance.num_subjects())
        .map(|s| {
            (0..bound)
                .map(|t| model.new_bool_var(format!("{assign_name}[{s}][{t}]")))
                .collect()
        })
        .collect();
    let rooms = RoomSelection::encode(model, instance, "y");
    let used: Vec<VarHandle> = (0..bound)
        .map(|t| model.new_bool_var(format!("{used_name}[{t}]")))
        .collect();

    info!("Adding 'exactly one slot' constraints...");
    for row in &assign {
        model.add_linear_constraint(row.iter().map(|&x| (x, 1.0)), 1.0, 1.0);
    }

    info!("Adding 'slot usage' constraints...");
    for row in &assign {
        for (&x, &u) in row.iter().zip(&used) {
            model.add_linear_constraint([(x, 1.0), (u, -1.0)], f64::NEG_INFINITY, 0.0);
        }
    }

    info!("Adding 'conflict' constraints...");
    for edge in graph.edges() {
        let (a, b) = (edge.0 as usize, edge.1 as usize);
        for t in 0..bound {
            model.add_linear_constraint(
                [(assign[a][t], 1.0), (assign[b][t], 1.0), (used[t], -1.0)],
                f64::NEG_INFINITY,
                0.0,
            );
        }
    }

    info!("Adding 'room exclusivity' constraints...");
    let before = model.num_constraints();
    let m = ROOM_EXCLUSIVITY_BIG_M;
    for (s1, s2) in graph.compatible_pairs() {
        let (s1, s2) = (s1 as usize, s2 as usize);
        for t in 0..bound {
            for r in 0..instance.num_rooms() {
                model.add_linear_constraint(
                    [
                        (assign[s1][t], m),
                        (assign[s2][t], m),
                        (rooms.var(s1, r), 1.0),
                        (rooms.var(s2, r), 1.0),
                    ],
                    f64::NEG_INFINITY,
                    2.0 * m + 1.0,
                );
            }
        }
    }
    trace!(
        "Emitted {} room exclusivity constraints out of a dense maximum of {}.",
        model.num_constraints() - before,
        instance.num_subjects().pow(2) * bound * instance.num_rooms()
    );

    model.set_objective(used.iter().map(|&u| (u, 1.0)), Sense::Minimize);

    IndexedLayout {
        assign,
        used,
        rooms,
    }
}
