//! Logging setup for the fan curve controller

use fern::Dispatch;
use log::LevelFilter;
use std::path::Path;

/// Setup logging with the specified verbosity level.
///
/// With `log_dir`, records are also appended to a per-day file
/// `fan_control_YYYYMMDD.log` in that directory.
pub fn setup(verbosity: u8, log_dir: Option<&Path>) -> Result<(), fern::InitError> {
    let level = match verbosity {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut dispatch = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{} [{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.target(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout());

    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)?;
        let file_name = format!("fan_control_{}.log", chrono::Local::now().format("%Y%m%d"));
        dispatch = dispatch.chain(fern::log_file(dir.join(file_name))?);
    }

    dispatch.apply()?;
    Ok(())
}
