mod config;
mod error;
mod keymap;
mod layout;
mod shortcuts;
mod state;
mod workspace;
mod xconn;

#[cfg(test)]
mod testing;

use config::Config;
use log::Level;
use simplelog::{
    ColorChoice, CombinedLogger, Config as LogConfig, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use state::Manager;
use std::fs::File;
use std::path::Path;
use std::process::ExitCode;
use xconn::X11rbConn;

fn init_logging(level: LevelFilter, path: &Path) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        LogConfig::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )];
    let file_error = match File::create(path) {
        Ok(file) => {
            loggers.push(WriteLogger::new(level, LogConfig::default(), file));
            None
        }
        Err(e) => Some(e),
    };

    if CombinedLogger::init(loggers).is_err() {
        eprintln!("splitwm: logger already initialised");
    }
    match file_error {
        None => log::info!("Logging to {}", path.display()),
        Some(e) => log::warn!("Cannot create log file {}: {}", path.display(), e),
    }
}

/// Read the config overlay. Messages about it are returned rather than
/// logged since the log level itself comes from the file.
fn load_config() -> (Config, Vec<(Level, String)>) {
    let path = Config::path();
    let mut notes = Vec::new();

    let mut config = match Config::read(&path) {
        Ok(Some(config)) => {
            notes.push((Level::Info, format!("Loaded config from {}", path.display())));
            config
        }
        Ok(None) => {
            notes.push((
                Level::Info,
                format!("No config at {}, using defaults", path.display()),
            ));
            Config::default()
        }
        Err(e) => {
            notes.push((Level::Error, format!("{e}, using defaults")));
            Config::default()
        }
    };
    for rejected in config.sanitize() {
        notes.push((Level::Warn, format!("Config: {rejected}")));
    }
    (config, notes)
}

fn run(config: &Config) -> error::Result<()> {
    let (conn, screen) = X11rbConn::connect()?;

    let shortcuts = shortcuts::table(config);
    let mut wm = Manager::new(conn, screen, shortcuts)?;
    wm.init()?;
    wm.run()
}

fn main() -> ExitCode {
    let (config, notes) = load_config();
    init_logging(config.level_filter(), &config.log_path());
    for (level, note) in notes {
        log::log!(level, "{note}");
    }

    match run(&config) {
        Ok(()) => {
            log::info!("Bye");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
