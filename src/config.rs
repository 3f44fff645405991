use log::warn;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::encoding::Encoding;
use crate::graph::ConflictGraph;

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const BIND_ENV: &str = "TIMETABLE_BIND";

/// Default size of the Model B session pool, per slot of the slot bound.
pub const SESSIONS_PER_SLOT: usize = 5;

/// Per-solve settings. Every field has a default, so `{}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SolveOptions {
    pub encoding: Encoding,
    /// Slots available to Models A and D. Defaults to the slot count of a first-fit
    /// timetable, or the number of subjects when first-fit finds none.
    pub slot_bound: Option<usize>,
    /// Session pool of Model B. Defaults to [`SESSIONS_PER_SLOT`] times the slot bound.
    pub session_bound: Option<usize>,
    /// Wall-clock limit handed to the solver.
    pub time_limit_secs: Option<f64>,
}

impl SolveOptions {
    pub fn with_encoding(encoding: Encoding) -> Self {
        SolveOptions {
            encoding,
            ..Default::default()
        }
    }

    pub fn slot_bound_for(&self, graph: &ConflictGraph) -> usize {
        self.slot_bound
            .unwrap_or_else(|| {
                graph
                    .first_fit_slot_count()
                    .unwrap_or_else(|| graph.num_subjects())
            })
            .max(1)
    }

    pub fn session_bound_for(&self, graph: &ConflictGraph) -> usize {
        self.session_bound
            .unwrap_or_else(|| SESSIONS_PER_SLOT * self.slot_bound_for(graph))
            .max(1)
    }

    pub fn time_limit(&self) -> Option<Duration> {
        let secs = self.time_limit_secs?;
        match Duration::try_from_secs_f64(secs) {
            Ok(limit) => Some(limit),
            Err(e) => {
                warn!("Ignoring time limit of {secs} seconds: {e}");
                None
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        ServerConfig {
            bind: std::env::var(BIND_ENV).unwrap_or_else(|_| DEFAULT_BIND.to_string()),
        }
    }
}
