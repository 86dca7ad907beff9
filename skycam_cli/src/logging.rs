use log::LevelFilter;
use log4rs::{
    append::{
        console::{ConsoleAppender, Target},
        file::FileAppender,
    },
    config::{Appender, Config, Root},
    encode::pattern::PatternEncoder,
    filter::threshold::ThresholdFilter,
};
use simple_eyre::Result;
use std::path::Path;

const CONSOLE_PATTERN: &str = "{h({l})}: {m}{n}";
const FILE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)}: {l} - {m}{n}";

/// Info and above on stderr, everything down to debug in `log_file`
pub fn log_config(log_file: &Path) -> Result<Config> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(CONSOLE_PATTERN)))
        .build();
    let file = FileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(FILE_PATTERN)))
        .build(log_file)?;

    let config = Config::builder()
        .appender(
            Appender::builder()
                .filter(Box::new(ThresholdFilter::new(LevelFilter::Info)))
                .build("stderr", Box::new(stderr)),
        )
        .appender(Appender::builder().build("file", Box::new(file)))
        .build(
            Root::builder()
                .appender("stderr")
                .appender("file")
                .build(LevelFilter::Debug),
        )?;
    Ok(config)
}

/// Installs the global logger. Without a log file `RUST_LOG` controls what is
/// printed, as usual.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    match log_file {
        Some(path) => {
            log4rs::init_config(log_config(path)?)?;
            log::debug!("Logging to {:?}", path);
        }
        None => env_logger::init(),
    }
    Ok(())
}
