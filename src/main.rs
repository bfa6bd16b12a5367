// src/main.rs

mod app_logic;
mod core;

use app_logic::Cli;
use clap::Parser;
use simplelog::{
    ColorChoice, CombinedLogger, Config, LevelFilter, SharedLogger, TermLogger, TerminalMode,
    WriteLogger,
};
use std::fs::File;
use std::process::ExitCode;

/*
 * Logs to the terminal at the level chosen with `-v`, and at debug level to a log
 * file in the local configuration directory when that directory is available.
 */
fn init_logging(verbosity: u8) {
    let terminal_level = match verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        terminal_level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];

    let log_path = core::path_utils::get_base_app_config_local_dir(core::path_utils::APP_NAME)
        .map(|dir| dir.join(core::path_utils::LOG_FILENAME));
    if let Some(log_path) = &log_path {
        match File::create(log_path) {
            Ok(file) => loggers.push(WriteLogger::new(
                LevelFilter::Debug.max(terminal_level),
                Config::default(),
                file,
            )),
            Err(e) => eprintln!("Could not create log file {log_path:?}: {e}"),
        }
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Logger initialization failed: {e}");
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    log::debug!("Main: Running {:?}", cli.command);

    match app_logic::run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
