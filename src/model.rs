//! Solver-independent model representation.
//!
//! A [`Model`] is the explicit building context every encoder writes into. It records
//! variables, constraints and the objective in the vocabulary of the solver interface
//! (boolean and bounded integer variables, two-sided linear constraints, all-different
//! and reified implications) and is handed whole to a [`crate::solver::SolverAdapter`].

use itertools::Itertools;
use std::fmt;

const FEASIBILITY_TOLERANCE: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarHandle(usize);

impl VarHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintHandle(usize);

impl ConstraintHandle {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Boolean,
    Integer,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub kind: VarKind,
    pub lower: i64,
    pub upper: i64,
}

/// A boolean variable or its negation, used as the condition of a reified implication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Literal {
    pub var: VarHandle,
    pub negated: bool,
}

impl Literal {
    pub fn positive(var: VarHandle) -> Self {
        Literal { var, negated: false }
    }

    pub fn negative(var: VarHandle) -> Self {
        Literal { var, negated: true }
    }

    fn holds(self, values: &[f64]) -> bool {
        let is_true = values[self.var.0] > 0.5;
        is_true != self.negated
    }
}

impl From<VarHandle> for Literal {
    fn from(var: VarHandle) -> Self {
        Literal::positive(var)
    }
}

/// `lower <= sum(coef * var) <= upper`; either side may be infinite.
#[derive(Debug, Clone, PartialEq)]
pub struct LinearConstraint {
    pub terms: Vec<(VarHandle, f64)>,
    pub lower: f64,
    pub upper: f64,
}

impl LinearConstraint {
    pub fn new(terms: impl IntoIterator<Item = (VarHandle, f64)>, lower: f64, upper: f64) -> Self {
        LinearConstraint {
            terms: terms.into_iter().collect(),
            lower,
            upper,
        }
    }

    pub fn at_most(terms: impl IntoIterator<Item = (VarHandle, f64)>, upper: f64) -> Self {
        Self::new(terms, f64::NEG_INFINITY, upper)
    }

    pub fn at_least(terms: impl IntoIterator<Item = (VarHandle, f64)>, lower: f64) -> Self {
        Self::new(terms, lower, f64::INFINITY)
    }

    pub fn equal(terms: impl IntoIterator<Item = (VarHandle, f64)>, value: f64) -> Self {
        Self::new(terms, value, value)
    }

    pub fn activity(&self, values: &[f64]) -> f64 {
        self.terms.iter().map(|&(var, coef)| coef * values[var.0]).sum()
    }

    pub fn is_satisfied(&self, values: &[f64]) -> bool {
        let activity = self.activity(values);
        activity >= self.lower - FEASIBILITY_TOLERANCE
            && activity <= self.upper + FEASIBILITY_TOLERANCE
    }
}

impl fmt::Display for LinearConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sum = self
            .terms
            .iter()
            .map(|(var, coef)| format!("{coef}*v{}", var.0))
            .join(" + ");
        write!(f, "{} <= {sum} <= {}", self.lower, self.upper)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Linear(LinearConstraint),
    AllDifferent(Vec<VarHandle>),
    ReifiedImplication {
        condition: Literal,
        consequent: LinearConstraint,
    },
}

impl Constraint {
    pub fn is_satisfied(&self, values: &[f64]) -> bool {
        match self {
            Constraint::Linear(linear) => linear.is_satisfied(values),
            Constraint::AllDifferent(vars) => vars
                .iter()
                .map(|var| values[var.0].round() as i64)
                .all_unique(),
            Constraint::ReifiedImplication {
                condition,
                consequent,
            } => !condition.holds(values) || consequent.is_satisfied(values),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sense {
    #[default]
    Minimize,
    Maximize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Objective {
    pub terms: Vec<(VarHandle, f64)>,
    pub sense: Sense,
}

/// Variables, constraints and objective of one formulation.
#[derive(Debug, Clone, Default)]
pub struct Model {
    vars: Vec<VarDef>,
    constraints: Vec<Constraint>,
    objective: Objective,
}

impl Model {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> VarHandle {
        self.push_var(VarDef {
            name: name.into(),
            kind: VarKind::Boolean,
            lower: 0,
            upper: 1,
        })
    }

    pub fn new_int_var(&mut self, lower: i64, upper: i64, name: impl Into<String>) -> VarHandle {
        debug_assert!(lower <= upper, "empty domain [{lower}, {upper}]");
        self.push_var(VarDef {
            name: name.into(),
            kind: VarKind::Integer,
            lower,
            upper,
        })
    }

    fn push_var(&mut self, def: VarDef) -> VarHandle {
        self.vars.push(def);
        VarHandle(self.vars.len() - 1)
    }

    pub fn add_linear_constraint(
        &mut self,
        terms: impl IntoIterator<Item = (VarHandle, f64)>,
        lower: f64,
        upper: f64,
    ) -> ConstraintHandle {
        self.add(Constraint::Linear(LinearConstraint::new(terms, lower, upper)))
    }

    pub fn add_all_different(&mut self, vars: Vec<VarHandle>) -> ConstraintHandle {
        self.add(Constraint::AllDifferent(vars))
    }

    pub fn add_reified_implication(
        &mut self,
        condition: impl Into<Literal>,
        consequent: LinearConstraint,
    ) -> ConstraintHandle {
        self.add(Constraint::ReifiedImplication {
            condition: condition.into(),
            consequent,
        })
    }

    pub fn add(&mut self, constraint: Constraint) -> ConstraintHandle {
        self.constraints.push(constraint);
        ConstraintHandle(self.constraints.len() - 1)
    }

    pub fn set_objective(
        &mut self,
        terms: impl IntoIterator<Item = (VarHandle, f64)>,
        sense: Sense,
    ) {
        self.objective = Objective {
            terms: terms.into_iter().collect(),
            sense,
        };
    }

    pub fn var(&self, handle: VarHandle) -> &VarDef {
        &self.vars[handle.0]
    }

    pub fn vars(&self) -> impl Iterator<Item = (VarHandle, &VarDef)> {
        self.vars.iter().enumerate().map(|(i, def)| (VarHandle(i), def))
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn constraint(&self, handle: ConstraintHandle) -> &Constraint {
        &self.constraints[handle.0]
    }

    pub fn objective(&self) -> &Objective {
        &self.objective
    }

    pub fn num_vars(&self) -> usize {
        self.vars.len()
    }

    pub fn num_constraints(&self) -> usize {
        self.constraints.len()
    }

    /// Smallest and largest value `sum(coef * var)` can take within the variable bounds.
    pub fn activity_range(&self, terms: &[(VarHandle, f64)]) -> (f64, f64) {
        terms.iter().fold((0.0, 0.0), |(min, max), &(var, coef)| {
            let def = &self.vars[var.0];
            let a = coef * def.lower as f64;
            let b = coef * def.upper as f64;
            (min + a.min(b), max + a.max(b))
        })
    }

    pub fn objective_value(&self, values: &[f64]) -> f64 {
        self.objective
            .terms
            .iter()
            .map(|&(var, coef)| coef * values[var.0])
            .sum()
    }

    /// Rounds every value to the nearest integer inside its variable's bounds.
    pub fn round_values(&self, values: &[f64]) -> Vec<f64> {
        self.vars
            .iter()
            .zip(values)
            .map(|(def, v)| v.round().clamp(def.lower as f64, def.upper as f64))
            .collect()
    }

    /// The first constraint the values violate, if any.
    pub fn first_violation(&self, values: &[f64]) -> Option<ConstraintHandle> {
        self.constraints
            .iter()
            .position(|c| !c.is_satisfied(values))
            .map(ConstraintHandle)
    }

    pub fn stats(&self) -> ModelStats {
        let mut stats = ModelStats::default();
        for def in &self.vars {
            match def.kind {
                VarKind::Boolean => stats.boolean_vars += 1,
                VarKind::Integer => stats.integer_vars += 1,
            }
        }
        for constraint in &self.constraints {
            match constraint {
                Constraint::Linear(_) => stats.linear += 1,
                Constraint::AllDifferent(_) => stats.all_different += 1,
                Constraint::ReifiedImplication { .. } => stats.reified += 1,
            }
        }
        stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModelStats {
    pub boolean_vars: usize,
    pub integer_vars: usize,
    pub linear: usize,
    pub all_different: usize,
    pub reified: usize,
}

impl fmt::Display for ModelStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} boolean + {} integer variables, {} linear + {} all-different + {} reified constraints",
            self.boolean_vars, self.integer_vars, self.linear, self.all_different, self.reified
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_sequential() {
        let mut model = Model::new();
        let a = model.new_bool_var("a");
        let b = model.new_int_var(0, 4, "b");
        assert_eq!((a.index(), b.index()), (0, 1));
        assert_eq!(model.var(b).upper, 4);
        let c0 = model.add_linear_constraint([(a, 1.0), (b, 1.0)], 1.0, 3.0);
        let c1 = model.add_all_different(vec![a, b]);
        assert_eq!((c0.index(), c1.index()), (0, 1));
        assert_eq!(model.num_constraints(), 2);
    }

    #[test]
    fn test_activity_range_uses_bounds() {
        let mut model = Model::new();
        let x = model.new_int_var(-2, 5, "x");
        let y = model.new_bool_var("y");
        assert_eq!(model.activity_range(&[(x, 1.0), (y, -3.0)]), (-5.0, 5.0));
    }

    #[test]
    fn test_reified_implication_only_binds_when_condition_holds() {
        let mut model = Model::new();
        let b = model.new_bool_var("b");
        let x = model.new_int_var(0, 3, "x");
        model.add_reified_implication(b, LinearConstraint::equal([(x, 1.0)], 2.0));
        model.add_reified_implication(
            Literal::negative(b),
            LinearConstraint::at_most([(x, 1.0)], 0.0),
        );

        assert_eq!(model.first_violation(&[1.0, 2.0]), None);
        assert_eq!(model.first_violation(&[0.0, 0.0]), None);
        assert_eq!(model.first_violation(&[1.0, 3.0]).map(|c| c.index()), Some(0));
        assert_eq!(model.first_violation(&[0.0, 1.0]).map(|c| c.index()), Some(1));
    }

    #[test]
    fn test_all_different_checks_rounded_values() {
        let constraint = Constraint::AllDifferent(vec![VarHandle(0), VarHandle(1), VarHandle(2)]);
        assert!(constraint.is_satisfied(&[0.0, 1.0, 2.0000001]));
        assert!(!constraint.is_satisfied(&[0.0, 1.0, 0.9999999]));
    }

    #[test]
    fn test_round_values_clamps_to_bounds() {
        let mut model = Model::new();
        model.new_bool_var("a");
        model.new_int_var(0, 2, "b");
        assert_eq!(model.round_values(&[0.9999, 2.3]), vec![1.0, 2.0]);
        assert_eq!(model.round_values(&[-0.0001, -0.4]), vec![0.0, 0.0]);
    }

    #[test]
    fn test_stats_and_objective() {
        let mut model = Model::new();
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        model.add_linear_constraint([(a, 1.0), (b, 1.0)], 1.0, 1.0);
        model.add_reified_implication(a, LinearConstraint::at_least([(b, 1.0)], 0.0));
        model.set_objective([(a, 2.0), (b, 1.0)], Sense::Minimize);

        let stats = model.stats();
        assert_eq!(stats.boolean_vars, 2);
        assert_eq!(stats.linear, 1);
        assert_eq!(stats.reified, 1);
        assert_eq!(model.objective_value(&[1.0, 0.0]), 2.0);
    }
}
