//! Room selection shared by every formulation: one boolean per (subject, room) and a
//! capacity covering constraint per subject.

use crate::data::{ProblemInstance, RoomId};
use crate::model::{Model, VarHandle};

#[derive(Debug, Clone)]
pub struct RoomSelection {
    /// `vars[s][r]`: subject `s` sits (partly) in room `r`.
    vars: Vec<Vec<VarHandle>>,
}

impl RoomSelection {
    pub fn encode(model: &mut Model, instance: &ProblemInstance, name: &str) -> Self {
        let vars = instance
            .subjects
            .iter()
            .map(|subject| {
                instance
                    .rooms
                    .iter()
                    .map(|room| model.new_bool_var(format!("{name}[{}][{}]", subject.id, room.id)))
                    .collect()
            })
            .collect();
        RoomSelection { vars }
    }

    pub fn var(&self, subject: usize, room: usize) -> VarHandle {
        self.vars[subject][room]
    }

    /// `sum_r cap[r] * y[s][r] >= demand[s]` for every subject.
    pub fn add_covering(&self, model: &mut Model, instance: &ProblemInstance) {
        for subject in &instance.subjects {
            self.cover(model, instance, subject.id as usize, Vec::new(), f64::from(subject.demand));
        }
    }

    /// `sum_r cap[r] * y[s][r] - demand[s] * sum_t x[s][t] >= 0`: the demand only has to
    /// be covered once the subject is given a slot through one of `activation[s]`.
    pub fn add_coupled_covering(
        &self,
        model: &mut Model,
        instance: &ProblemInstance,
        activation: &[Vec<VarHandle>],
    ) {
        for subject in &instance.subjects {
            let s = subject.id as usize;
            let demand = f64::from(subject.demand);
            let coupling = activation[s].iter().map(|&x| (x, -demand)).collect();
            self.cover(model, instance, s, coupling, 0.0);
        }
    }

    fn cover(
        &self,
        model: &mut Model,
        instance: &ProblemInstance,
        subject: usize,
        mut terms: Vec<(VarHandle, f64)>,
        lower: f64,
    ) {
        terms.extend(
            instance
                .rooms
                .iter()
                .map(|room| (self.vars[subject][room.id as usize], f64::from(room.capacity))),
        );
        model.add_linear_constraint(terms, lower, f64::INFINITY);
    }

    /// Rooms whose selection variable is set in `values`, ascending.
    pub fn selected(&self, subject: usize, values: &[f64]) -> Vec<RoomId> {
        self.vars[subject]
            .iter()
            .enumerate()
            .filter(|(_, var)| values[var.index()] > 0.5)
            .map(|(room, _)| room as RoomId)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Constraint;

    #[test]
    fn test_covering_weights_rooms_by_capacity() {
        let instance = ProblemInstance::new(&[50], &[40, 20], &[]);
        let mut model = Model::new();
        let rooms = RoomSelection::encode(&mut model, &instance, "y");
        rooms.add_covering(&mut model, &instance);

        assert_eq!(model.var(rooms.var(0, 1)).name, "y[0][1]");
        let Constraint::Linear(cover) = &model.constraints()[0] else {
            panic!("covering must be linear");
        };
        assert_eq!(cover.lower, 50.0);
        assert_eq!(cover.terms, vec![(rooms.var(0, 0), 40.0), (rooms.var(0, 1), 20.0)]);

        assert!(!cover.is_satisfied(&[1.0, 0.0]));
        assert!(cover.is_satisfied(&[1.0, 1.0]));
        assert_eq!(rooms.selected(0, &[1.0, 1.0]), vec![0, 1]);
    }

    #[test]
    fn test_coupled_covering_is_vacuous_without_activation() {
        let instance = ProblemInstance::new(&[30], &[40], &[]);
        let mut model = Model::new();
        let rooms = RoomSelection::encode(&mut model, &instance, "y");
        let x = model.new_bool_var("x[0][0]");
        rooms.add_coupled_covering(&mut model, &instance, &[vec![x]]);

        let values_unassigned = [0.0, 0.0];
        let values_without_room = [0.0, 1.0];
        let values_with_room = [1.0, 1.0];
        assert_eq!(model.first_violation(&values_unassigned), None);
        assert!(model.first_violation(&values_without_room).is_some());
        assert_eq!(model.first_violation(&values_with_room), None);
    }
}
