use allsky340::{BaudRate, Camera, IoAdapter, SerialAdapter};
use clap::Args;
use simple_eyre::{eyre::WrapErr, Result};
use std::time::Duration;

use crate::cli::parse_baud_rate;

#[derive(Args, Debug)]
pub struct SerialConf {
    /// Name of serial port that should be used
    #[clap(short, long, value_parser, env = "SKYCAM_SERIAL")]
    pub serial: String,

    /// Baud rate the camera currently listens at
    #[clap(long, value_parser = parse_baud_rate, default_value = "460800", env = "SKYCAM_BAUD")]
    pub baud_rate: BaudRate,

    /// How long a single read may wait for data, in milliseconds
    #[clap(long, value_parser, default_value_t = 100, env = "SKYCAM_TIMEOUT_MS")]
    pub timeout_ms: u64,
}

pub type SerialCamera = Camera<SerialAdapter>;

impl SerialConf {
    pub fn open_camera(&self) -> Result<SerialCamera> {
        let adapter = SerialAdapter::open(
            &self.serial,
            self.baud_rate,
            Duration::from_millis(self.timeout_ms),
        )
        .wrap_err_with(|| format!("Could not open serial port {}", self.serial))?;
        Ok(adapter.open_camera())
    }
}
