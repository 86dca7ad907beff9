use crate::error::Error;
use core::{
    fmt,
    fmt::{Debug, Display},
};
use num_derive::{FromPrimitive, ToPrimitive};
use num_traits::FromPrimitive;
use strum::{EnumIter, IntoEnumIterator};

/// Serial link speeds the camera can be switched to
#[derive(ToPrimitive, FromPrimitive, EnumIter, Debug, PartialEq, Eq, Clone, Copy, Default)]
pub enum BaudRate {
    #[default]
    Baud9600 = 9600,
    Baud19200 = 19200,
    Baud38400 = 38400,
    Baud57600 = 57600,
    Baud115200 = 115200,
    Baud230400 = 230400,
    Baud460800 = 460800,
}

impl BaudRate {
    /// Two character payload of the "switch baud rate" command
    pub(crate) fn to_code(self) -> [u8; 2] {
        use BaudRate::*;
        let idx = match self {
            Baud9600 => b'0',
            Baud19200 => b'1',
            Baud38400 => b'2',
            Baud57600 => b'3',
            Baud115200 => b'4',
            Baud230400 => b'5',
            Baud460800 => b'6',
        };
        [b'B', idx]
    }

    pub fn as_u32(self) -> u32 {
        self as u32
    }

    pub(crate) fn accepted_values() -> String {
        BaudRate::iter()
            .map(|b| b.to_string())
            .collect::<Vec<String>>()
            .join(", ")
    }
}

impl TryFrom<u32> for BaudRate {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        BaudRate::from_u32(value).ok_or(Error::InvalidBaudRate(value))
    }
}

impl Display for BaudRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_fmt(format_args!("{}", *self as u32))
    }
}

/// Whether the shutter is opened during an exposure
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum FrameType {
    #[default]
    Dark,
    Light,
}

impl FrameType {
    pub(crate) fn to_code(self) -> [u8; 2] {
        match self {
            FrameType::Dark => [0x00, 0x00],
            FrameType::Light => [0x00, 0x01],
        }
    }
}

impl Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FrameType::Dark => "dark",
            FrameType::Light => "light",
        })
    }
}

/// Read-out area, both at 1x1 binning
#[derive(PartialEq, Eq, Debug, Clone, Copy, Default)]
pub enum Crop {
    /// 640x480
    #[default]
    Full,
    /// 512x480
    Cropped,
}

impl Crop {
    pub const ROWS: usize = 480;

    pub fn cols(self) -> usize {
        match self {
            Crop::Full => 640,
            Crop::Cropped => 512,
        }
    }

    pub fn pixel_count(self) -> usize {
        Self::ROWS * self.cols()
    }
}

impl Display for Crop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Crop::Full => "full",
            Crop::Cropped => "cropped",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn baud_rate_from_number() {
        assert_ok_eq!(BaudRate::try_from(460800), BaudRate::Baud460800);
        assert_ok_eq!(BaudRate::try_from(9600), BaudRate::Baud9600);
        assert_matches!(BaudRate::try_from(921600), Err(Error::InvalidBaudRate(921600)));
    }

    #[test]
    fn baud_rate_codes() {
        assert_eq!(&BaudRate::Baud9600.to_code(), b"B0");
        assert_eq!(&BaudRate::Baud115200.to_code(), b"B4");
        assert_eq!(&BaudRate::Baud460800.to_code(), b"B6");
    }

    #[test]
    fn invalid_baud_rate_lists_accepted_values() {
        let msg = Error::InvalidBaudRate(1).to_string();
        assert!(msg.ends_with("9600, 19200, 38400, 57600, 115200, 230400, 460800"));
    }

    #[test]
    fn crop_dimensions() {
        assert_eq!(Crop::Full.pixel_count(), 307_200);
        assert_eq!(Crop::Cropped.pixel_count(), 245_760);
    }
}
