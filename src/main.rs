use clap::Parser;
use exam_timetabler::{
    Encoding, HighsSolver, ProblemInstance, ServerConfig, SolveOptions, TimetableError, server,
    solve,
};
use log::error;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Instance file in the text format: a `subjects rooms conflicts` header, the demands,
    /// the capacities, then one conflict pair per line. Without it the HTTP API is served
    /// on the address in `TIMETABLE_BIND`.
    instance_path: Option<PathBuf>,

    /// Formulation to solve: flat-slot-mip, session-indexed-mip or all-different-cp.
    #[arg(short = 'e', long = "encoding", default_value_t = Encoding::default())]
    encoding: Encoding,

    /// Slots available to the flat and all-different models. Defaults to the slot
    /// count of a first-fit timetable.
    #[arg(long = "slot-bound")]
    slot_bound: Option<usize>,

    /// Session pool of the session-indexed model.
    #[arg(long = "session-bound")]
    session_bound: Option<usize>,

    /// The time budget for the solver, given in seconds.
    #[arg(short = 't', long = "time-limit")]
    time_limit: Option<f64>,

    /// The random seed handed to HiGHS.
    #[arg(short = 'r', long = "random-seed", default_value_t = 1234)]
    random_seed: i32,

    /// Enables log output from HiGHS
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn solver(&self) -> HighsSolver {
        HighsSolver {
            random_seed: self.random_seed,
            log_to_console: self.verbose,
            ..Default::default()
        }
    }

    fn options(&self) -> SolveOptions {
        SolveOptions {
            encoding: self.encoding,
            slot_bound: self.slot_bound,
            session_bound: self.session_bound,
            time_limit_secs: self.time_limit,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let result = match &args.instance_path {
        Some(path) => solve_file(path, args.options(), args.solver()).await,
        None => server::run_server(&ServerConfig::from_env(), Arc::new(args.solver()))
            .await
            .map_err(|e| e.to_string()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn solve_file(path: &Path, options: SolveOptions, solver: HighsSolver) -> Result<(), String> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
    let instance: ProblemInstance = text.parse().map_err(|e: TimetableError| e.to_string())?;

    let timetable = tokio::task::spawn_blocking(move || solve(&instance, &options, &solver))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    println!(
        "{}",
        serde_json::to_string_pretty(&timetable).map_err(|e| e.to_string())?
    );
    Ok(())
}
