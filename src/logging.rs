// src/logging.rs
use anyhow::{Context, Result};
use log::LevelFilter;
use std::path::Path;

pub fn level_for(verbosity: u8) -> LevelFilter {
    match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the global logger. Goes to `log_file` when given, otherwise stderr.
pub fn init(verbosity: u8, log_file: Option<&Path>) -> Result<()> {
    let dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level_for(verbosity))
        // chatty HTTP internals stay at warn unless tracing
        .level_for("hyper_util", if verbosity >= 3 { LevelFilter::Trace } else { LevelFilter::Warn })
        .level_for("reqwest", if verbosity >= 3 { LevelFilter::Trace } else { LevelFilter::Warn });

    let dispatch = match log_file {
        Some(path) => dispatch.chain(
            fern::log_file(path)
                .with_context(|| format!("opening log file {}", path.display()))?,
        ),
        None => dispatch.chain(std::io::stderr()),
    };

    dispatch.apply().context("installing logger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(level_for(0), LevelFilter::Warn);
        assert_eq!(level_for(1), LevelFilter::Info);
        assert_eq!(level_for(2), LevelFilter::Debug);
        assert_eq!(level_for(7), LevelFilter::Trace);
    }
}
