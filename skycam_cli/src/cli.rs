use allsky340::BaudRate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::{output::Output, serial::SerialConf};

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,

    /// Also write debug level logs to this file
    #[clap(long, global = true, value_parser, env = "SKYCAM_LOG_FILE", value_hint = clap::ValueHint::FilePath)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Lists connected serial devices
    List,
    /// Checks that the camera is on-line
    Ping(SerialConf),
    /// Get firmware version of the camera
    Firmware(SerialConf),
    /// Shutter control
    Shutter(ShutterCommand),
    /// Abort the exposure in progress
    Abort(SerialConf),
    /// Switch the dew heater
    Heater(SwitchConf),
    /// Switch chopping shutter mode
    Chop(SwitchConf),
    /// Switch the camera and the port to a new baud rate
    BaudRate(SetBaudRateConf),
    /// Take a single exposure and save it
    Expose(ExposeConf),
    /// Continuously take dark-subtracted images until a STOP file appears
    Capture(CaptureConf),
}

#[derive(Args, Debug)]
pub struct ShutterCommand {
    #[clap(subcommand)]
    pub command: ShutterCommands,
}

#[derive(Subcommand, Debug)]
pub enum ShutterCommands {
    /// Open the shutter
    Open(SerialConf),
    /// Close the shutter
    Close(SerialConf),
    /// De-energize the shutter
    Off(SerialConf),
}

#[derive(ValueEnum, Clone, Copy, PartialEq, Eq, Debug)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Switch::On
    }
}

#[derive(Args, Debug)]
pub struct SwitchConf {
    #[clap(value_enum)]
    pub state: Switch,

    #[clap(flatten)]
    pub serial: SerialConf,
}

#[derive(Args, Debug)]
pub struct SetBaudRateConf {
    /// New baud rate
    #[clap(value_parser = parse_baud_rate)]
    pub rate: BaudRate,

    #[clap(flatten)]
    pub serial: SerialConf,
}

pub(crate) fn parse_baud_rate(s: &str) -> Result<BaudRate, String> {
    let rate: u32 = s.parse().map_err(|_| format!("'{}' is not a baud rate", s))?;
    BaudRate::try_from(rate).map_err(|e| e.to_string())
}

#[derive(Args, Debug)]
pub struct ExposeConf {
    /// Exposure time in seconds
    #[clap(value_parser)]
    pub seconds: f64,

    /// Open the shutter during the exposure
    #[clap(long)]
    pub light: bool,

    /// Read out the 512x480 sub-frame instead of the full frame
    #[clap(long)]
    pub cropped: bool,

    #[clap(flatten)]
    pub output: Output,

    #[clap(flatten)]
    pub serial: SerialConf,
}

#[derive(Args, Debug)]
pub struct CaptureConf {
    /// Directory where nightly image folders are created
    #[clap(short, long, value_parser, value_hint = clap::ValueHint::DirPath)]
    pub dir: PathBuf,

    /// Longest exposure time in seconds, also the starting exposure
    #[clap(long, value_parser, default_value_t = 60.0)]
    pub max_exposure: f64,

    /// Read out the 512x480 sub-frame instead of the full frame
    #[clap(long)]
    pub cropped: bool,

    #[clap(flatten)]
    pub serial: SerialConf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn baud_rate_parser() {
        assert_ok_eq!(parse_baud_rate("460800"), BaudRate::Baud460800);
        assert!(assert_err!(parse_baud_rate("921600")).starts_with("Baud rate 921600 "));
        assert_err_eq!(parse_baud_rate("fast"), "'fast' is not a baud rate");
    }

    #[test]
    fn registry_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_expose_command() {
        let cli = Cli::try_parse_from([
            "skycam", "expose", "2.5", "--light", "-o", "/nonexistent/out.fits", "-s", "/dev/ttyUSB0",
        ])
        .unwrap();
        match cli.command {
            Commands::Expose(conf) => {
                assert_eq!(conf.seconds, 2.5);
                assert!(conf.light);
                assert!(!conf.cropped);
                assert_eq!(conf.serial.baud_rate, BaudRate::Baud460800);
            }
            _ => panic!("Parsed into the wrong command"),
        }
    }

    #[test]
    fn log_file_after_subcommand() {
        let cli = Cli::try_parse_from([
            "skycam", "capture", "-d", "/var/www/skycam", "-s", "/dev/ttyUSB0", "--log-file",
            "/tmp/skycam.log",
        ])
        .unwrap();
        assert_eq!(cli.log_file, Some(PathBuf::from("/tmp/skycam.log")));
    }

    #[test]
    fn unknown_verbs_are_rejected() {
        assert_err!(Cli::try_parse_from(["skycam", "getImage", "60"]));
        assert_err!(Cli::try_parse_from(["skycam", "heater", "maybe", "-s", "/dev/ttyUSB0"]));
    }
}
