use LowMachReact::LowMachSolver::time_step::{LowMachError, ReactingLowMachSolver};
use LowMachReact::settings::CaseSettings;
use log::{LevelFilter, SetLoggerError, error, info};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;

const DEFAULT_CASE: &str = "cases/premixed_channel.json";
const LOG_FILE: &str = "low_mach.log";

/// Terminal logger at info level, plus a debug log file when it can be created.
fn init_logging(log_file: &Path) -> Result<(), SetLoggerError> {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        LevelFilter::Info,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    if let Ok(file) = File::create(log_file) {
        loggers.push(WriteLogger::new(LevelFilter::Debug, Config::default(), file));
    }
    CombinedLogger::init(loggers)
}

pub fn main() -> ExitCode {
    let case_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CASE.to_string());
    if let Err(e) = init_logging(Path::new(LOG_FILE)) {
        eprintln!("cannot initialise logging: {}", e);
    }

    info!("case: {}", case_path);
    let result = CaseSettings::load_from_file(&case_path)
        .map_err(LowMachError::from)
        .and_then(|case| ReactingLowMachSolver::from_case(&case))
        .and_then(|mut solver| solver.run());
    match result {
        Ok(reports) => {
            if let Some(last) = reports.last() {
                info!(
                    "finished at t = {:e} s after {} steps, min/max(T) = {:?}",
                    last.time, last.time_index, last.t_range
                );
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
