use crate::flags::BaudRate;
use core::result::Result as CoreResult;
use core::time::Duration;
use thiserror::Error;

pub type Result<T> = CoreResult<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Baud rate {0} is not in range of accepted values: {}", BaudRate::accepted_values())]
    InvalidBaudRate(u32),
    #[error("Camera did not accept baud rate {requested}, link restored to {restored}")]
    BaudNegotiationFailed {
        requested: BaudRate,
        restored: BaudRate,
    },
    #[error("No complete response to {command}: expected {expected} bytes, got {received}")]
    CommunicationTimeout {
        command: &'static str,
        expected: usize,
        received: usize,
    },
    #[error("Exposure time of {0} s cannot be encoded")]
    InvalidExposure(f64),
    #[error("Camera did not signal end of exposure within {0:?}")]
    ExposureTimedOut(Duration),
    #[error("Operation was cancelled")]
    Cancelled,
    #[error("Expected {expected} bytes of raw image data, got {received}")]
    InvalidImageLength { expected: usize, received: usize },
    #[error("Image shapes differ: {0:?} and {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),

    #[error("{0}")]
    IOError(#[from] std::io::Error),
    #[cfg(feature = "serial")]
    #[error("{0}")]
    Serial(#[from] serialport::Error),
}
