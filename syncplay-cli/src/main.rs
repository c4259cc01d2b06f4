mod args;
mod console;
mod coordinator;
mod engine;

use std::fs::File;
use std::path::PathBuf;

use args::{CliArgs, USAGE};
use engine::DryRunEngine;
use syncplay_core::Config;

fn log_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("syncplay")
        .join("syncplay.log")
}

fn init_logging(verbose: bool) {
    use simplelog::{
        ColorChoice, CombinedLogger, LevelFilter, SharedLogger, TermLogger, TerminalMode,
        WriteLogger,
    };

    let file_level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };
    let term_level = if verbose { LevelFilter::Debug } else { LevelFilter::Warn };

    let mut loggers: Vec<Box<dyn SharedLogger>> = Vec::new();
    loggers.push(TermLogger::new(
        term_level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    ));

    let path = log_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let log_file = File::create(&path)
        .or_else(|_| File::create(std::env::temp_dir().join("syncplay.log")));
    match log_file {
        Ok(file) => loggers.push(WriteLogger::new(file_level, simplelog::Config::default(), file)),
        Err(e) => eprintln!("Cannot create log file: {}", e),
    }

    if let Err(e) = CombinedLogger::init(loggers) {
        eprintln!("Failed to initialize logger: {}", e);
        return;
    }

    log::info!("syncplay starting (log level: {:?})", file_level);
}

fn main() -> std::io::Result<()> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    let cli = match CliArgs::parse(&argv) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}\n\n{}", e, USAGE);
            std::process::exit(2);
        }
    };
    if cli.help {
        println!("{}", USAGE);
        return Ok(());
    }

    let mut config = Config::load();
    init_logging(cli.verbose || config.debug());
    if let Some(path) = &cli.config_path {
        config.merge_file(path);
    }
    cli.apply(&mut config);

    let (mut coordinator, control_tx) = coordinator::build(config, Box::new(DryRunEngine::new()))?;
    console::spawn_reader(control_tx)?;

    let result = coordinator.run();
    drop(coordinator);
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}
