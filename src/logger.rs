use log::LevelFilter;
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::append::rolling_file::policy::compound::{
    CompoundPolicy, roll::fixed_window::FixedWindowRoller, trigger::size::SizeTrigger,
};
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

/// Log target for one-line records of every mutating controller call.
pub const AUDIT_TARGET: &str = "docctl::audit";

const PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l}] {t} - {m}{n}";
const ROLL_SIZE: u64 = 10 * 1024 * 1024;

/// Initializes the logging system from `log4rs.yaml` in the working directory, if present.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new("log4rs.yaml");
    if path.exists() {
        init_path(path)?;
    }
    Ok(())
}

/// Initializes the logging system from a specific config file path.
pub fn init_path(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    log4rs::init_file(path, log4rs::config::Deserializers::default())?;
    Ok(())
}

/// Parses `error|warn|info|debug|trace|off`; anything else is `info`.
#[must_use]
pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Logs to stderr only. Used by the CLI.
///
/// # Errors
/// Returns an error if a logger is already installed.
pub fn init_console(level: &str) -> Result<(), Box<dyn std::error::Error>> {
    let stderr = ConsoleAppender::builder()
        .target(log4rs::append::console::Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(parse_level(level)))?;
    log4rs::init_config(config)?;
    Ok(())
}

fn rolling(dir: &Path, file: &str, window: &str, keep: u32) -> Result<RollingFileAppender, Box<dyn std::error::Error>> {
    let roller = FixedWindowRoller::builder().build(&format!("{}", dir.join(window).display()), keep)?;
    let policy = CompoundPolicy::new(Box::new(SizeTrigger::new(ROLL_SIZE)), Box::new(roller));
    Ok(RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build(dir.join(file), Box::new(policy))?)
}

/// Builds the rolling-file configuration behind [`init_for_collection_in`].
///
/// Writes `{base}/{name}_logs/{name}.log` and routes the audit target into
/// `{name}_audit.log`. Returns the log directory.
///
/// # Errors
/// Returns an error if the directory cannot be created or an appender fails to build.
pub fn collection_config(
    base_dir: &Path,
    name: &str,
    level: &str,
    retention: u32,
) -> Result<(Config, PathBuf), Box<dyn std::error::Error>> {
    let mut dir = PathBuf::from(base_dir);
    dir.push(format!("{name}_logs"));
    std::fs::create_dir_all(&dir)?;
    let lvl = parse_level(level);
    let app = rolling(&dir, &format!("{name}.log"), &format!("{name}.{{}}.log"), retention)?;
    let audit = rolling(&dir, &format!("{name}_audit.log"), &format!("{name}.audit.{{}}.log"), retention)?;
    let config = Config::builder()
        .appender(Appender::builder().build("app", Box::new(app)))
        .appender(Appender::builder().build("audit", Box::new(audit)))
        .logger(Logger::builder().appender("audit").additive(false).build(AUDIT_TARGET, LevelFilter::Info))
        .build(Root::builder().appender("app").build(lvl))?;
    Ok((config, dir))
}

/// Initializes logging to `{base}/{name}_logs/`.
///
/// # Errors
/// Returns an error if the directory cannot be created or the logger fails to initialize.
pub fn init_for_collection_in(
    base_dir: &Path,
    name: &str,
    level: &str,
    retention: u32,
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let (config, dir) = collection_config(base_dir, name, level, retention)?;
    log4rs::init_config(config)?;
    Ok(dir)
}

/// Writes one JSON line for a mutating call to the audit target.
pub fn log_audit(op: &str, collection: &str, affected: usize) {
    let line = serde_json::json!({
        "ts": chrono::Utc::now().to_rfc3339(),
        "op": op,
        "collection": collection,
        "affected": affected,
    });
    log::info!(target: AUDIT_TARGET, "{line}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_names() {
        assert_eq!(parse_level("DEBUG"), LevelFilter::Debug);
        assert_eq!(parse_level("off"), LevelFilter::Off);
        assert_eq!(parse_level("nonsense"), LevelFilter::Info);
    }
}
