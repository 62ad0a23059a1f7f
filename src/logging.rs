//! Logging configuration for xray-manager
//!
//! Uses log4rs with appenders:
//! 1. ConsoleAppender - stderr output
//! 2. RollingFileAppender - log files with rotation

use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

/// Initialize log4rs with console and rolling file appenders
///
/// # Log File Configuration
/// - File: `{log_dir}/xray-manager.1.log`
/// - Max size: 10 MB per file
/// - Max count: 5 files (rotation)
/// - Pattern: `{timestamp} [{level}] {target} - {message}`
pub fn init_logger(log_dir: &Path, level: LevelFilter) -> anyhow::Result<log4rs::Handle> {
    // Console goes to stderr so command output on stdout stays clean
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(
            "{d(%H:%M:%S)} [{l}] {t} - {m}{n}",
        )))
        .build();

    std::fs::create_dir_all(log_dir)?;

    let log_file = log_dir.join("xray-manager.1.log");
    let log_pattern = log_dir.join("xray-manager.{}.log");
    let log_pattern = log_pattern
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("log directory is not valid UTF-8: {}", log_dir.display()))?;

    // Rolling file appender (10MB per file, 5 files max)
    let roller = FixedWindowRoller::builder().base(1).build(log_pattern, 5)?;
    let trigger = SizeTrigger::new(10 * 1024 * 1024);
    let policy = CompoundPolicy::new(Box::new(trigger), Box::new(roller));

    let logfile = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(
            "{d(%Y-%m-%d %H:%M:%S)} [{l}] {t} - {m}{n}",
        )))
        .build(log_file, Box::new(policy))?;

    let config = Config::builder()
        .appender(Appender::builder().build("console", Box::new(console)))
        .appender(Appender::builder().build("logfile", Box::new(logfile)))
        .build(
            Root::builder()
                .appender("console")
                .appender("logfile")
                .build(level),
        )?;

    Ok(log4rs::init_config(config)?)
}
