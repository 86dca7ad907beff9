//! Driver for the serial protocol of the SBIG AllSky-340 sky camera.
//!
//! Only the monochrome model at 1x1 binning is supported, with either the full
//! 640x480 frame or the 512x480 cropped frame.

mod camera;
mod cancel;
mod checksum;
mod command;
pub mod error;
mod exposure;
mod firmware;
mod flags;
mod image;
mod io_adapter;
mod transfer;

pub use camera::Camera;
pub use cancel::CancelToken;
pub use checksum::{checksum, lrc};
pub use command::Command;
pub use error::{Error, Result};
pub use exposure::{ExposureSpec, EXPOSURE_RESOLUTION};
pub use firmware::{FirmwareKind, FirmwareVersion};
pub use flags::{BaudRate, Crop, FrameType};
pub use image::{Image, U16_FROM_PLANES, U16_TO_PLANES};
#[cfg(feature = "serial")]
pub use io_adapter::serial::SerialAdapter;
pub use io_adapter::IoAdapter;
pub use transfer::{BlockFault, BlockOutcome, BLOCK_BYTES, BLOCK_PIXELS, MAX_BLOCK_RETRIES};
