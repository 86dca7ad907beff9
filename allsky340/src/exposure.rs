use crate::{
    error::{Error, Result},
    flags::{Crop, FrameType},
};
use core::time::Duration;

/// Exposure time resolution of the camera, in seconds
pub const EXPOSURE_RESOLUTION: f64 = 1.0e-4;
/// Exposure time is sent as a 24 bit counter of [`EXPOSURE_RESOLUTION`] ticks
const MAX_TICKS: u32 = 0x00FF_FFFF;

/// Everything the camera needs to know to take and read out one image
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub struct ExposureSpec {
    ticks: u32,
    pub frame: FrameType,
    pub crop: Crop,
}

impl ExposureSpec {
    pub fn new(seconds: f64, frame: FrameType, crop: Crop) -> Result<Self> {
        let ticks = (seconds / EXPOSURE_RESOLUTION).round();
        if !ticks.is_finite() || ticks < 0.0 || ticks > MAX_TICKS as f64 {
            return Err(Error::InvalidExposure(seconds));
        }
        Ok(ExposureSpec {
            ticks: ticks as u32,
            frame,
            crop,
        })
    }

    pub fn light(seconds: f64) -> Result<Self> {
        Self::new(seconds, FrameType::Light, Crop::Full)
    }

    pub fn dark(seconds: f64) -> Result<Self> {
        Self::new(seconds, FrameType::Dark, Crop::Full)
    }

    pub fn cropped(self) -> Self {
        ExposureSpec {
            crop: Crop::Cropped,
            ..self
        }
    }

    pub fn seconds(&self) -> f64 {
        self.ticks as f64 * EXPOSURE_RESOLUTION
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.seconds())
    }

    /// 3 byte big-endian tick count followed by the 2 byte frame type
    pub(crate) fn encode(&self) -> [u8; 5] {
        let [_, t1, t2, t3] = self.ticks.to_be_bytes();
        let [f1, f2] = self.frame.to_code();
        [t1, t2, t3, f1, f2]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::*;

    #[test]
    fn encode_light_exposure() {
        // 60 s = 600000 ticks = 0x0927C0
        let spec = ExposureSpec::light(60.0).unwrap();
        assert_eq!(spec.encode(), [0x09, 0x27, 0xC0, 0x00, 0x01]);
    }

    #[test]
    fn encode_dark_exposure() {
        let spec = ExposureSpec::dark(0.0001).unwrap();
        assert_eq!(spec.encode(), [0x00, 0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn rounds_to_nearest_tick() {
        let spec = ExposureSpec::dark(0.00016).unwrap();
        assert_eq!(spec.encode()[..3], [0x00, 0x00, 0x02]);
    }

    #[test]
    fn longest_representable_exposure() {
        let spec = assert_ok!(ExposureSpec::light(1677.7215));
        assert_eq!(spec.encode()[..3], [0xFF, 0xFF, 0xFF]);
        assert_err!(ExposureSpec::light(1677.73));
    }

    #[test]
    fn rejects_invalid_durations() {
        assert_matches!(ExposureSpec::light(-1.0), Err(Error::InvalidExposure(_)));
        assert_err!(ExposureSpec::light(f64::NAN));
        assert_err!(ExposureSpec::light(f64::INFINITY));
    }

    #[test]
    fn cropped_keeps_exposure() {
        let spec = ExposureSpec::light(2.5).unwrap().cropped();
        assert_eq!(spec.crop, Crop::Cropped);
        assert_eq!(spec.frame, FrameType::Light);
        assert!((spec.seconds() - 2.5).abs() < EXPOSURE_RESOLUTION);
    }
}
