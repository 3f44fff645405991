use good_lp::variable;
use good_lp::{
    Expression, ProblemVariables, ResolutionError, Solution, SolutionStatus, SolverModel,
    Variable, WithTimeLimit, constraint, default_solver,
};
use itertools::Itertools;
use log::{debug, info, trace, warn};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::SolveOptions;
use crate::data::{ProblemInstance, Timetable};
use crate::decode::decode;
use crate::encoding::Encoding;
use crate::error::{Result, TimetableError};
use crate::graph::ConflictGraph;
use crate::model::{Constraint, LinearConstraint, Literal, Model, Sense, VarHandle, VarKind};

#[derive(Debug, Clone, PartialEq)]
pub enum SolveStatus {
    Optimal,
    /// A solution was found but optimality was not proven within the time limit.
    Feasible,
    Infeasible,
    /// The time limit ran out; `values` may still hold the best solution found.
    Timeout,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverOutput {
    pub status: SolveStatus,
    values: Vec<f64>,
}

impl SolverOutput {
    pub fn new(status: SolveStatus, values: Vec<f64>) -> Self {
        SolverOutput { status, values }
    }

    pub fn without_values(status: SolveStatus) -> Self {
        SolverOutput {
            status,
            values: Vec::new(),
        }
    }

    pub fn value_of(&self, var: VarHandle) -> f64 {
        self.values[var.index()]
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn has_values(&self) -> bool {
        !self.values.is_empty()
    }
}

/// The boundary to an external optimisation engine.
pub trait SolverAdapter: Send + Sync {
    fn solve(&self, model: &Model, time_limit: Option<Duration>) -> Result<SolverOutput>;
}

/// Formulates `instance` with the configured encoding, solves it and decodes the result.
pub fn solve(
    instance: &ProblemInstance,
    options: &SolveOptions,
    adapter: &dyn SolverAdapter,
) -> Result<Timetable> {
    let start_time = Instant::now();
    let graph = ConflictGraph::new(instance)?;
    trace!(
        "Conflict graph has {} edges, maximum degree {}.",
        graph.edges().len(),
        graph.max_degree()
    );
    if let Some(subject) = instance
        .subjects
        .iter()
        .find(|s| u64::from(s.demand) > instance.total_capacity())
    {
        warn!(
            "Subject {} needs {} seats but all rooms together hold {}; expect an infeasible model.",
            subject.id,
            subject.demand,
            instance.total_capacity()
        );
    }

    if instance.subjects.is_empty() {
        info!("No subjects to schedule.");
        return Ok(Timetable {
            encoding: options.encoding,
            assignments: Vec::new(),
            slots_used: 0,
            objective: 0.0,
            optimal: true,
        });
    }

    let encoder = options.encoding.encoder(options, &graph);
    let encoded = encoder.encode(&graph);
    info!("Model built: {}", encoded.model.stats());

    let output = adapter.solve(&encoded.model, options.time_limit())?;
    info!(
        "Solver finished with {:?} in {:.2?}",
        output.status,
        start_time.elapsed()
    );

    match &output.status {
        SolveStatus::Optimal | SolveStatus::Feasible => decode(&encoded, instance, &output),
        SolveStatus::Timeout if output.has_values() => decode(&encoded, instance, &output),
        SolveStatus::Timeout => Err(TimetableError::NoSolutionWithinBudget),
        SolveStatus::Infeasible => Err(TimetableError::InfeasibleProblem),
        SolveStatus::Error(message) => Err(TimetableError::SolverError(message.clone())),
    }
}

/// Solves every encoding of the same instance in parallel, one blocking task each.
/// Results come back in [`Encoding::ALL`] order.
pub async fn solve_all_encodings(
    instance: Arc<ProblemInstance>,
    options: SolveOptions,
    adapter: Arc<dyn SolverAdapter>,
) -> Vec<(Encoding, Result<Timetable>)> {
    let handles = Encoding::ALL.map(|encoding| {
        let instance = Arc::clone(&instance);
        let adapter = Arc::clone(&adapter);
        let options = SolveOptions {
            encoding,
            ..options.clone()
        };
        tokio::task::spawn_blocking(move || solve(&instance, &options, adapter.as_ref()))
    });

    let mut results = Vec::with_capacity(handles.len());
    for (encoding, handle) in Encoding::ALL.into_iter().zip(handles) {
        let result = handle.await.unwrap_or_else(|e| {
            Err(TimetableError::SolverError(format!("{encoding} task failed: {e}")))
        });
        results.push((encoding, result));
    }
    results
}

/// Solves models with HiGHS through `good_lp`.
///
/// HiGHS only understands linear rows, so all-different and reified implications are
/// linearised here with big-M coefficients derived from the variable bounds.
#[derive(Debug, Clone)]
pub struct HighsSolver {
    pub threads: i32,
    pub random_seed: i32,
    pub log_to_console: bool,
}

impl Default for HighsSolver {
    fn default() -> Self {
        HighsSolver {
            threads: 1,         // limit to 1 thread for reproducibility
            random_seed: 1234,  // set seed for reproducibility
            log_to_console: false,
        }
    }
}

/// `lower <= sum(coef * var) <= upper` over `good_lp` variables.
struct Row {
    terms: Vec<(Variable, f64)>,
    lower: f64,
    upper: f64,
}

impl Row {
    fn at_most(terms: Vec<(Variable, f64)>, upper: f64) -> Self {
        Row {
            terms,
            lower: f64::NEG_INFINITY,
            upper,
        }
    }

    fn at_least(terms: Vec<(Variable, f64)>, lower: f64) -> Self {
        Row {
            terms,
            lower,
            upper: f64::INFINITY,
        }
    }
}

fn expression(terms: &[(Variable, f64)]) -> Expression {
    terms
        .iter()
        .fold(Expression::from(0.0), |acc, &(var, coef)| acc + coef * var)
}

impl HighsSolver {
    fn linearize(
        model: &Model,
        vars: &[Variable],
        problem: &mut ProblemVariables,
    ) -> Vec<Row> {
        let mut rows = Vec::with_capacity(model.num_constraints());
        let lift = |terms: &[(VarHandle, f64)]| -> Vec<(Variable, f64)> {
            terms.iter().map(|&(v, c)| (vars[v.index()], c)).collect()
        };

        for constraint in model.constraints() {
            match constraint {
                Constraint::Linear(linear) => rows.push(Row {
                    terms: lift(&linear.terms),
                    lower: linear.lower,
                    upper: linear.upper,
                }),
                Constraint::AllDifferent(handles) => {
                    for (&i, &j) in handles.iter().tuple_combinations() {
                        let (di, dj) = (model.var(i), model.var(j));
                        let (xi, xj) = (vars[i.index()], vars[j.index()]);
                        // order = 1 forces x_i < x_j, order = 0 forces x_i > x_j
                        let order = problem.add(variable().binary());
                        let m_less = (di.upper - dj.lower + 1) as f64;
                        let m_greater = (dj.upper - di.lower + 1) as f64;
                        rows.push(Row::at_most(
                            vec![(xi, 1.0), (xj, -1.0), (order, m_less)],
                            m_less - 1.0,
                        ));
                        rows.push(Row::at_least(
                            vec![(xi, 1.0), (xj, -1.0), (order, m_greater)],
                            1.0,
                        ));
                    }
                }
                Constraint::ReifiedImplication {
                    condition,
                    consequent,
                } => rows.extend(Self::reify(model, vars, *condition, consequent)),
            }
        }
        rows
    }

    /// Rows enforcing `condition => consequent`. Each finite side of the consequent is
    /// relaxed by exactly the distance between the bound and the extreme activity, so a
    /// false condition leaves the row vacuous without any unbounded coefficient.
    fn reify(
        model: &Model,
        vars: &[Variable],
        condition: Literal,
        consequent: &LinearConstraint,
    ) -> Vec<Row> {
        let (min_activity, max_activity) = model.activity_range(&consequent.terms);
        let indicator = vars[condition.var.index()];
        let base: Vec<(Variable, f64)> = consequent
            .terms
            .iter()
            .map(|&(v, c)| (vars[v.index()], c))
            .collect();
        let mut rows = Vec::with_capacity(2);

        if consequent.upper.is_finite() && max_activity > consequent.upper {
            let slack = max_activity - consequent.upper;
            let mut terms = base.clone();
            if condition.negated {
                terms.push((indicator, -slack));
                rows.push(Row::at_most(terms, consequent.upper));
            } else {
                terms.push((indicator, slack));
                rows.push(Row::at_most(terms, max_activity));
            }
        }
        if consequent.lower.is_finite() && min_activity < consequent.lower {
            let slack = consequent.lower - min_activity;
            let mut terms = base;
            if condition.negated {
                terms.push((indicator, slack));
                rows.push(Row::at_least(terms, consequent.lower));
            } else {
                terms.push((indicator, -slack));
                rows.push(Row::at_least(terms, min_activity));
            }
        }
        rows
    }
}

fn solved_status(status: SolutionStatus) -> SolveStatus {
    match status {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        SolutionStatus::GapLimit => SolveStatus::Feasible,
        SolutionStatus::TimeLimit => SolveStatus::Timeout,
    }
}

fn failed_status(error: &ResolutionError) -> SolveStatus {
    match error {
        ResolutionError::Infeasible => SolveStatus::Infeasible,
        // HiGHS stopped on a limit before finding any primal solution
        ResolutionError::Other("NoSolutionFound") => SolveStatus::Timeout,
        e => SolveStatus::Error(e.to_string()),
    }
}

impl SolverAdapter for HighsSolver {
    fn solve(&self, model: &Model, time_limit: Option<Duration>) -> Result<SolverOutput> {
        let start_time = Instant::now();
        let mut problem = ProblemVariables::new();

        let vars: Vec<Variable> = model
            .vars()
            .map(|(_, def)| match def.kind {
                VarKind::Boolean => problem.add(variable().binary().name(def.name.clone())),
                VarKind::Integer => problem.add(
                    variable()
                        .integer()
                        .min(def.lower as f64)
                        .max(def.upper as f64)
                        .name(def.name.clone()),
                ),
            })
            .collect();

        let rows = Self::linearize(model, &vars, &mut problem);
        trace!(
            "Linearised {} constraints into {} rows.",
            model.num_constraints(),
            rows.len()
        );

        let objective = expression(
            &model
                .objective()
                .terms
                .iter()
                .map(|&(v, c)| (vars[v.index()], c))
                .collect::<Vec<_>>(),
        );
        let unsolved = match model.objective().sense {
            Sense::Minimize => problem.minimise(objective),
            Sense::Maximize => problem.maximise(objective),
        };
        let mut solver_model = unsolved
            .using(default_solver)
            .set_option("threads", self.threads)
            .set_option("random_seed", self.random_seed)
            .set_option("log_to_console", if self.log_to_console { "true" } else { "false" });
        if let Some(limit) = time_limit {
            solver_model = solver_model.with_time_limit(limit.as_secs_f64());
        }

        for row in rows {
            let expr = expression(&row.terms);
            if row.lower == row.upper {
                solver_model.add_constraint(constraint!(expr == row.lower));
                continue;
            }
            if row.lower.is_finite() {
                solver_model.add_constraint(constraint!(expr.clone() >= row.lower));
            }
            if row.upper.is_finite() {
                solver_model.add_constraint(constraint!(expr <= row.upper));
            }
        }

        info!("Starting HiGHS...");
        let output = match solver_model.solve() {
            Ok(solution) => SolverOutput::new(
                solved_status(solution.status()),
                vars.iter().map(|var| solution.value(*var)).collect(),
            ),
            Err(e) => SolverOutput::without_values(failed_status(&e)),
        };
        debug!("HiGHS returned {:?} after {:.2?}", output.status, start_time.elapsed());
        Ok(output)
    }
}
