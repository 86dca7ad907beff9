use core::{fmt, fmt::Display};

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum FirmwareKind {
    T,
    V,
}

/// Firmware revision as reported by the camera
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct FirmwareVersion {
    pub kind: FirmwareKind,
    pub major: u8,
    pub minor: u8,
}

impl FirmwareVersion {
    /// Major numbers of 8 and above flag a "T" firmware
    pub fn from_response(major: u8, minor: u8) -> Self {
        if major >= 8 {
            FirmwareVersion {
                kind: FirmwareKind::T,
                major: major - 8,
                minor,
            }
        } else {
            FirmwareVersion {
                kind: FirmwareKind::V,
                major,
                minor,
            }
        }
    }
}

impl Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            FirmwareKind::T => 'T',
            FirmwareKind::V => 'V',
        };
        f.write_fmt(format_args!("{}{}.{}", kind, self.major, self.minor))
    }
}
