use log::{info, trace};

use crate::encoding::{AllDifferentLayout, EncodedModel, Encoder, Encoding, Layout, RoomSelection};
use crate::graph::ConflictGraph;
use crate::model::{LinearConstraint, Literal, Model, Sense, VarHandle};

/// Model D: one integer `slot[s]` per subject.
///
/// The slot variables form a proper colouring of the conflict graph (all-different on
/// every edge). For every pair that may share a slot, `sameSlot[s1][s2]` is reified
/// against `slot[s1] = slot[s2]` and implies `roomsDisjoint[s1][s2][r]` for every room,
/// which is itself reified against `room[s1][r] + room[s2][r] <= 1`.
///
/// The objective minimises the largest slot index, not the number of distinct slots.
/// The two agree at the optimum, because any timetable can be relabelled onto
/// `0..k`, but a feasible solution using slots `{0, 2}` scores 2 while using two slots.
#[derive(Debug, Clone, Copy)]
pub struct AllDifferentEncoder {
    slot_bound: usize,
}

impl AllDifferentEncoder {
    pub fn new(slot_bound: usize) -> Self {
        AllDifferentEncoder { slot_bound }
    }
}

impl Encoder for AllDifferentEncoder {
    fn encoding(&self) -> Encoding {
        Encoding::AllDifferentCp
    }

    fn encode(&self, graph: &ConflictGraph<'_>) -> EncodedModel {
        let instance = graph.instance();
        let last_slot = self.slot_bound.max(1) as i64 - 1;
        info!(
            "Setting up all-different model with {} subjects, {} rooms and slots 0..={}...",
            instance.num_subjects(),
            instance.num_rooms(),
            last_slot
        );
        let mut model = Model::new();

        let slot: Vec<VarHandle> = (0..instance.num_subjects())
            .map(|s| model.new_int_var(0, last_slot, format!("slot[{s}]")))
            .collect();
        let rooms = RoomSelection::encode(&mut model, instance, "room");

        info!("Adding 'capacity covering' constraints...");
        rooms.add_covering(&mut model, instance);

        info!("Adding 'all different' constraints on conflict edges...");
        for edge in graph.edges() {
            model.add_all_different(vec![slot[edge.0 as usize], slot[edge.1 as usize]]);
        }

        info!("Adding 'same slot implies disjoint rooms' constraints...");
        let mut pairs = 0usize;
        for (s1, s2) in graph.compatible_pairs() {
            pairs += 1;
            let (s1, s2) = (s1 as usize, s2 as usize);
            let same = model.new_bool_var(format!("sameSlot[{s1}][{s2}]"));
            let before = model.new_bool_var(format!("before[{s1}][{s2}]"));
            let after = model.new_bool_var(format!("after[{s1}][{s2}]"));

            // sameSlot <=> slot[s1] == slot[s2], with "not equal" split by direction
            let gap = [(slot[s1], 1.0), (slot[s2], -1.0)];
            model.add_reified_implication(same, LinearConstraint::equal(gap, 0.0));
            model.add_reified_implication(before, LinearConstraint::at_most(gap, -1.0));
            model.add_reified_implication(after, LinearConstraint::at_least(gap, 1.0));
            model.add_linear_constraint([(same, 1.0), (before, 1.0), (after, 1.0)], 1.0, 1.0);

            for r in 0..instance.num_rooms() {
                let disjoint = model.new_bool_var(format!("roomsDisjoint[{s1}][{s2}][{r}]"));
                let shared = [(rooms.var(s1, r), 1.0), (rooms.var(s2, r), 1.0)];
                model.add_reified_implication(disjoint, LinearConstraint::at_most(shared, 1.0));
                model.add_reified_implication(
                    Literal::negative(disjoint),
                    LinearConstraint::at_least(shared, 2.0),
                );
                model.add_reified_implication(
                    same,
                    LinearConstraint::at_least([(disjoint, 1.0)], 1.0),
                );
            }
        }
        trace!(
            "Indicator layer covers {} subject pairs ({} skipped as conflicting).",
            pairs,
            graph.edges().len()
        );

        let max_slot = model.new_int_var(0, last_slot, "maxSlot");
        for &s in &slot {
            model.add_linear_constraint([(s, 1.0), (max_slot, -1.0)], f64::NEG_INFINITY, 0.0);
        }
        model.set_objective([(max_slot, 1.0)], Sense::Minimize);

        EncodedModel {
            encoding: Encoding::AllDifferentCp,
            model,
            layout: Layout::AllDifferent(AllDifferentLayout {
                slot,
                max_slot,
                rooms,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ProblemInstance;

    fn encode(instance: &ProblemInstance, slots: usize) -> (Model, AllDifferentLayout) {
        let graph = ConflictGraph::new(instance).unwrap();
        let encoded = AllDifferentEncoder::new(slots).encode(&graph);
        match encoded.layout {
            Layout::AllDifferent(layout) => (encoded.model, layout),
            other => panic!("unexpected layout {other:?}"),
        }
    }

    #[test]
    fn test_structure_counts() {
        // triangle 0-1-2 plus a free subject 3, two rooms
        let instance = ProblemInstance::new(&[5, 5, 5, 5], &[5, 5], &[(0, 1), (1, 2), (0, 2)]);
        let (model, layout) = encode(&instance, 4);
        let stats = model.stats();

        let compatible_pairs = 6 - 3;
        assert_eq!(stats.integer_vars, 4 + 1);
        assert_eq!(stats.boolean_vars, 4 * 2 + compatible_pairs * (3 + 2));
        assert_eq!(stats.all_different, 3);
        assert_eq!(stats.reified, compatible_pairs * (3 + 2 * 3));
        // covering + one-of-three per pair + max slot links
        assert_eq!(stats.linear, 4 + compatible_pairs + 4);
        assert_eq!(model.var(layout.slot[2]).upper, 3);
        assert_eq!(model.objective().terms, vec![(layout.max_slot, 1.0)]);
    }

    /// Builds a full value vector for two compatible subjects and one room.
    fn values_for(
        model: &Model,
        layout: &AllDifferentLayout,
        slots: [f64; 2],
        rooms: [f64; 2],
    ) -> Vec<f64> {
        let mut values = vec![0.0; model.num_vars()];
        for s in 0..2 {
            values[layout.slot[s].index()] = slots[s];
            values[layout.rooms.var(s, 0).index()] = rooms[s];
        }
        let find = |name: &str| {
            model
                .vars()
                .find(|(_, def)| def.name == name)
                .map(|(h, _)| h.index())
                .unwrap()
        };
        let gap = slots[0] - slots[1];
        values[find("sameSlot[0][1]")] = f64::from(gap == 0.0);
        values[find("before[0][1]")] = f64::from(gap < 0.0);
        values[find("after[0][1]")] = f64::from(gap > 0.0);
        values[find("roomsDisjoint[0][1][0]")] = f64::from(rooms[0] + rooms[1] <= 1.0);
        values[layout.max_slot.index()] = slots[0].max(slots[1]);
        values
    }

    #[test]
    fn test_room_sharing_allowed_only_across_slots() {
        let instance = ProblemInstance::new(&[1, 1], &[1], &[]);
        let (model, layout) = encode(&instance, 2);

        let apart = values_for(&model, &layout, [0.0, 1.0], [1.0, 1.0]);
        assert_eq!(model.first_violation(&apart), None);

        let together = values_for(&model, &layout, [1.0, 1.0], [1.0, 1.0]);
        assert!(model.first_violation(&together).is_some());
    }

    #[test]
    fn test_objective_is_max_slot_not_slot_count() {
        let instance = ProblemInstance::new(&[1, 1], &[1], &[]);
        let (model, layout) = encode(&instance, 3);
        let gapped = values_for(&model, &layout, [0.0, 2.0], [1.0, 1.0]);
        assert_eq!(model.first_violation(&gapped), None);
        assert_eq!(model.objective_value(&gapped), 2.0);
    }

    #[test]
    fn test_conflicting_subjects_need_distinct_slots() {
        let instance = ProblemInstance::new(&[1, 1], &[1], &[(0, 1)]);
        let (model, layout) = encode(&instance, 2);
        let mut values = vec![0.0; model.num_vars()];
        values[layout.rooms.var(0, 0).index()] = 1.0;
        values[layout.rooms.var(1, 0).index()] = 1.0;
        assert!(model.first_violation(&values).is_some());
        values[layout.slot[1].index()] = 1.0;
        values[layout.max_slot.index()] = 1.0;
        assert_eq!(model.first_violation(&values), None);
    }
}
