use std::fs::{create_dir, metadata};

use fern::{Dispatch, DateBased};
use log::LevelFilter;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error(transparent)]
    LogError(#[from] log::SetLoggerError),
    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Installs a `log`-facade logger, chaining stdout and (if `path` is given)
/// a date-rolled log file. Call once at process start; callers embedding
/// this library alongside their own logger can skip it entirely, since
/// every component here logs through the `log` facade rather than any
/// concrete backend.
pub fn init_logger(level: LevelFilter, path: Option<&str>) -> Result<(), LoggerInitError> {
    let mut logger = Dispatch::new()
        .level(level)
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{}] - ({}) - {}",
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(std::io::stdout());

    if let Some(path) = path {
        if metadata(path).is_err() {
            create_dir(path)?;
        }

        logger = logger.chain(DateBased::new(path, "%Y-%m-%d-radiod.log"));
    }

    logger.apply()?;
    Ok(())
}
