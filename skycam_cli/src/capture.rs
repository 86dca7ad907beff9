use allsky340::{
    Camera, CancelToken, Crop, ExposureSpec, FrameType, Image, IoAdapter, EXPOSURE_RESOLUTION,
};
use simple_eyre::{eyre::eyre, Result};
use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
    thread,
    time::Duration,
};
use tempfile::NamedTempFile;
use time::{macros::format_description, OffsetDateTime};

use crate::{
    cli::CaptureConf,
    output::{save_fits, save_preview, Observation},
};

/// Median above which the exposure time is halved
const BRIGHT_MEDIAN: f64 = 15000.0;
/// Median below which the exposure time is doubled
const FAINT_MEDIAN: f64 = 4000.0;
/// Light frames taken with one dark frame
const DARK_REFRESH: usize = 10;
const STOP_FILE: &str = "STOP";
/// Copies of the newest image, kept in the capture root
const LATEST_FITS: &str = "latest.fits";
const LATEST_PREVIEW: &str = "latest.png";
const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Adjustment {
    Halved,
    Doubled,
    Unchanged,
}

/// Keeps the sky background in a useful range by scaling the exposure time
#[derive(Debug, Clone)]
pub struct ExposurePolicy {
    exposure: f64,
    max_exposure: f64,
}

impl ExposurePolicy {
    pub fn new(max_exposure: f64) -> Self {
        ExposurePolicy {
            exposure: max_exposure,
            max_exposure,
        }
    }

    pub fn exposure(&self) -> f64 {
        self.exposure
    }

    pub fn adapt(&mut self, median: f64) -> Adjustment {
        if median > BRIGHT_MEDIAN {
            self.exposure = (self.exposure / 2.0).max(EXPOSURE_RESOLUTION);
            Adjustment::Halved
        } else if median < FAINT_MEDIAN && self.exposure < self.max_exposure {
            self.exposure = (self.exposure * 2.0).min(self.max_exposure);
            Adjustment::Doubled
        } else {
            Adjustment::Unchanged
        }
    }
}

/// Tracks whether the stored dark frame still matches the light frames
#[derive(Debug, Clone)]
pub struct DarkSchedule {
    lights_since_dark: Option<usize>,
}

impl DarkSchedule {
    pub fn new() -> Self {
        DarkSchedule {
            lights_since_dark: None,
        }
    }

    pub fn needs_dark(&self) -> bool {
        match self.lights_since_dark {
            None => true,
            Some(n) => n >= DARK_REFRESH,
        }
    }

    pub fn dark_taken(&mut self) {
        self.lights_since_dark = Some(0);
    }

    pub fn light_taken(&mut self) {
        if let Some(n) = self.lights_since_dark.as_mut() {
            *n += 1;
        }
    }

    /// Exposure time changed, the stored dark is useless
    pub fn invalidate(&mut self) {
        self.lights_since_dark = None;
    }
}

impl Default for DarkSchedule {
    fn default() -> Self {
        Self::new()
    }
}

/// Night folder for `now`: images after midnight belong to the previous date
pub fn observation_dir(root: &Path, now: OffsetDateTime) -> Result<PathBuf> {
    let night = now - time::Duration::hours(12);
    let year = night.format(format_description!("[year]"))?;
    let day = night.format(format_description!("[month][day]"))?;
    Ok(root.join(year).join(day))
}

fn image_stem(now: OffsetDateTime) -> Result<String> {
    let stamp = now.format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    Ok(format!("AllSky_{}", stamp))
}

fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

/// Replaces `root/name` with a copy of `src`, readers never see a partial file
fn publish_latest(root: &Path, src: &Path, name: &str) -> Result<()> {
    let mut tmp = NamedTempFile::new_in(root)?;
    io::copy(&mut File::open(src)?, tmp.as_file_mut())?;
    tmp.persist(root.join(name))?;
    Ok(())
}

/// Removes the stop file if present and reports whether it was there
fn stop_requested(dir: &Path) -> Result<bool> {
    let stop = dir.join(STOP_FILE);
    if stop.try_exists()? {
        fs::remove_file(&stop)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

pub struct CaptureLoop<IO: IoAdapter> {
    camera: Camera<IO>,
    crop: Crop,
    policy: ExposurePolicy,
    darks: DarkSchedule,
    dark: Option<Image>,
    cancel: CancelToken,
}

impl<IO: IoAdapter> CaptureLoop<IO> {
    pub fn new(camera: Camera<IO>, conf: &CaptureConf) -> Self {
        CaptureLoop {
            camera,
            crop: if conf.cropped { Crop::Cropped } else { Crop::Full },
            policy: ExposurePolicy::new(conf.max_exposure),
            darks: DarkSchedule::new(),
            dark: None,
            cancel: CancelToken::new(),
        }
    }

    fn take(&mut self, frame: FrameType) -> Result<Image> {
        let spec = ExposureSpec::new(self.policy.exposure(), frame, self.crop)?;
        let image = self.camera.capture(&spec, &self.cancel)?;
        if !image.substituted_blocks().is_empty() {
            log::warn!(
                "{} frame has zero-filled blocks {:?}",
                frame,
                image.substituted_blocks()
            );
        }
        Ok(image)
    }

    /// Takes a dark if needed and one light frame, returns the dark-subtracted
    /// light frame
    pub fn cycle(&mut self) -> Result<Image> {
        if self.dark.is_none() || self.darks.needs_dark() {
            log::info!("Taking {} s dark frame", self.policy.exposure());
            self.dark = Some(self.take(FrameType::Dark)?);
            self.darks.dark_taken();
        }
        let light = self.take(FrameType::Light)?;
        self.darks.light_taken();
        let dark = self
            .dark
            .as_ref()
            .ok_or_else(|| eyre!("No dark frame available"))?;
        Ok(light.subtract_dark(dark)?)
    }

    /// Changes the exposure for the next cycle based on `image`
    pub fn adapt(&mut self, image: &Image) -> Adjustment {
        let median = image.median();
        let adjustment = self.policy.adapt(median);
        if adjustment != Adjustment::Unchanged {
            log::info!(
                "Median of {} -> exposure {:?} to {} s",
                median,
                adjustment,
                self.policy.exposure()
            );
            self.darks.invalidate();
        }
        adjustment
    }

    fn save(&self, root: &Path, image: &Image, taken_at: OffsetDateTime) -> Result<()> {
        let dir = observation_dir(root, taken_at)?;
        fs::create_dir_all(&dir)?;
        let stem = image_stem(taken_at)?;
        let obs = Observation {
            exposure: self.policy.exposure(),
            frame: FrameType::Light,
            taken_at,
        };
        let fits = dir.join(format!("{}.fits", stem));
        let preview = dir.join(format!("{}.png", stem));
        save_fits(&fits, image, &obs)?;
        save_preview(&preview, image, &obs)?;
        log::info!("Saved {} in {:?}", stem, dir);

        publish_latest(root, &fits, LATEST_FITS)?;
        publish_latest(root, &preview, LATEST_PREVIEW)?;
        log::debug!("Updated latest images in {:?}", root);
        Ok(())
    }

    /// Runs until a stop file appears in `root`
    pub fn run(&mut self, root: &Path) -> Result<()> {
        log::info!("Image acquisition starting up");
        while !stop_requested(root)? {
            let result = self.cycle().and_then(|image| {
                let taken_at = now();
                self.save(root, &image, taken_at)?;
                self.adapt(&image);
                Ok(())
            });
            if let Err(e) = result {
                log::error!("Capture cycle failed: {:?}", e);
                thread::sleep(RETRY_DELAY);
            }
        }
        log::info!("Image acquisition shutting down");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serial::SerialConf;
    use allsky340::BaudRate;
    use pretty_assertions::assert_eq;
    use time::macros::datetime;
    use utilities::{scan_pixels, FakeCamera};

    #[test]
    fn bright_sky_halves_exposure() {
        let mut policy = ExposurePolicy::new(60.0);
        assert_eq!(policy.adapt(20_000.0), Adjustment::Halved);
        assert_eq!(policy.exposure(), 30.0);
        assert_eq!(policy.adapt(20_000.0), Adjustment::Halved);
        assert_eq!(policy.exposure(), 15.0);
    }

    #[test]
    fn faint_sky_doubles_up_to_cap() {
        let mut policy = ExposurePolicy::new(60.0);
        assert_eq!(policy.adapt(1000.0), Adjustment::Unchanged);
        policy.adapt(16_000.0);
        policy.adapt(16_000.0);
        policy.adapt(16_000.0);
        assert_eq!(policy.exposure(), 7.5);
        assert_eq!(policy.adapt(1000.0), Adjustment::Doubled);
        assert_eq!(policy.adapt(1000.0), Adjustment::Doubled);
        assert_eq!(policy.adapt(1000.0), Adjustment::Doubled);
        assert_eq!(policy.exposure(), 60.0);
        assert_eq!(policy.adapt(1000.0), Adjustment::Unchanged);
        assert_eq!(policy.adapt(8000.0), Adjustment::Unchanged);
    }

    #[test]
    fn exposure_never_reaches_zero() {
        let mut policy = ExposurePolicy::new(60.0);
        for _ in 0..40 {
            policy.adapt(60_000.0);
        }
        assert_eq!(policy.exposure(), EXPOSURE_RESOLUTION);
    }

    #[test]
    fn dark_refresh_cadence() {
        let mut darks = DarkSchedule::new();
        assert!(darks.needs_dark());
        darks.dark_taken();
        for _ in 0..DARK_REFRESH {
            assert!(!darks.needs_dark());
            darks.light_taken();
        }
        assert!(darks.needs_dark());
        darks.dark_taken();
        darks.light_taken();
        darks.invalidate();
        assert!(darks.needs_dark());
    }

    #[test]
    fn night_folder() {
        let root = Path::new("/var/www/skycam");
        let evening = datetime!(2013-01-14 21:30:00 UTC);
        let morning = datetime!(2013-01-15 03:10:00 UTC);
        let expected = root.join("2013").join("0114");
        assert_eq!(observation_dir(root, evening).unwrap(), expected);
        assert_eq!(observation_dir(root, morning).unwrap(), expected);
        assert_eq!(image_stem(morning).unwrap(), "AllSky_20130115_031000");
    }

    #[test]
    fn stop_file_is_consumed() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!stop_requested(dir.path()).unwrap());
        fs::write(dir.path().join(STOP_FILE), b"").unwrap();
        assert!(stop_requested(dir.path()).unwrap());
        assert!(!dir.path().join(STOP_FILE).exists());
    }

    #[test]
    fn latest_image_is_replaced() {
        let root = tempfile::tempdir().unwrap();
        let night = root.path().join("2013").join("0114");
        fs::create_dir_all(&night).unwrap();
        let first = night.join("AllSky_20130114_213000.fits");
        let second = night.join("AllSky_20130114_213130.fits");
        fs::write(&first, b"first").unwrap();
        fs::write(&second, b"second").unwrap();

        publish_latest(root.path(), &first, LATEST_FITS).unwrap();
        let latest = root.path().join(LATEST_FITS);
        assert_eq!(fs::read(&latest).unwrap(), b"first");
        publish_latest(root.path(), &second, LATEST_FITS).unwrap();
        assert_eq!(fs::read(&latest).unwrap(), b"second");

        // Nothing but the night folder and the latest copy is left behind
        let mut entries: Vec<_> = fs::read_dir(root.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["2013", LATEST_FITS]);
        // The dated image is kept
        assert_eq!(fs::read(&first).unwrap(), b"first");
    }

    #[test]
    fn first_cycle_takes_dark_then_light() {
        let conf = CaptureConf {
            dir: PathBuf::from("."),
            max_exposure: 1.0,
            cropped: true,
            serial: SerialConf {
                serial: "fake".to_string(),
                baud_rate: BaudRate::Baud460800,
                timeout_ms: 1,
            },
        };
        let camera = FakeCamera::new(BaudRate::Baud460800)
            .with_pixels(&scan_pixels(Crop::Cropped))
            .open_camera();
        let mut capture = CaptureLoop::new(camera, &conf);

        let image = capture.cycle().unwrap();
        assert_eq!(image.shape(), (480, 512));
        assert!(image.pixels().iter().all(|p| *p == 0));
        assert_eq!(capture.adapt(&image), Adjustment::Unchanged);
        capture.cycle().unwrap();

        let fake = capture.camera.into_inner();
        let frame_types: Vec<u8> = fake
            .commands()
            .iter()
            .filter(|c| c[0] == b'T')
            .map(|c| c[5])
            .collect();
        assert_eq!(frame_types, vec![0, 1, 1]);
    }
}
