use std::path::Path;

use flexi_logger::{
    opt_format, Cleanup, Criterion, FileSpec, FlexiLoggerError, Logger, LoggerHandle, Naming,
};

/// Start the global logger. `RUST_LOG` wins over `level`. With `log_dir`,
/// output goes to rotating files there instead of stderr.
///
/// Keep the returned handle alive for as long as logs should be written.
pub fn setup_logging(
    level: &str,
    log_dir: Option<&Path>,
) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(level)?.format(opt_format);
    let logger = match log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .rotate(
                Criterion::Size(10 * 1024 * 1024), // Rotate logs after they reach 10 MB
                Naming::Numbers,
                Cleanup::KeepLogFiles(3),
            ),
        None => logger,
    };
    logger.start()
}
