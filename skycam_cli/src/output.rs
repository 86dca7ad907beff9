use allsky340::{FrameType, Image};
use clap::{Args, ValueEnum};
use plotters::prelude::*;
use simple_eyre::{eyre::eyre, Result};
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use time::{format_description::FormatItem, macros::format_description, OffsetDateTime};

use crate::fits::{card, write_fits, Value};

#[derive(Args, Debug)]
pub struct Output {
    /// Path to a file where the image should be stored
    #[clap(short, long, value_parser = unique_path_parser, value_hint = clap::ValueHint::FilePath)]
    pub output: PathBuf,

    /// File format for image output
    #[clap(long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

fn unique_path_parser(p: &str) -> Result<PathBuf> {
    let p = Path::new(p);
    if p.try_exists()? {
        Err(eyre!("Path {p:?} already exists"))
    } else {
        Ok(p.to_path_buf())
    }
}

#[derive(ValueEnum, Clone, Default, Debug)]
pub enum OutputFormat {
    #[default]
    Fits,
    Preview,
    Csv,
}

/// What is known about an image besides its pixels
pub struct Observation {
    pub exposure: f64,
    pub frame: FrameType,
    pub taken_at: OffsetDateTime,
}

const DATE_FORMAT: &[FormatItem<'static>] = format_description!("[year]/[month]/[day]");
const TIME_FORMAT: &[FormatItem<'static>] = format_description!("[hour]:[minute]:[second]");

impl Observation {
    fn date(&self) -> Result<String> {
        Ok(self.taken_at.format(DATE_FORMAT)?)
    }

    fn time(&self) -> Result<String> {
        Ok(self.taken_at.format(TIME_FORMAT)?)
    }

    fn fits_cards(&self) -> Result<Vec<String>> {
        Ok(vec![
            card("DATE-OBS", Value::Str(&self.date()?), "Date of observation"),
            card("TIME-OBS", Value::Str(&self.time()?), "Time of observation"),
            card("EXPTIME", Value::Float(self.exposure), "Exposure time (s)"),
            card("IMAGETYP", Value::Str(&self.frame.to_string()), "Type of exposure"),
        ])
    }
}

pub fn save_fits(path: &Path, image: &Image, obs: &Observation) -> Result<()> {
    log::debug!("Saving FITS image to {:?}", path);
    let mut out = BufWriter::new(File::create(path)?);
    write_fits(&mut out, image, &obs.fits_cards()?)?;
    out.flush()?;
    Ok(())
}

pub fn save_csv(path: &Path, image: &Image) -> Result<()> {
    log::debug!("Saving image as CSV to {:?}", path);
    let mut out = File::create(path)?;
    out.write_all(image_to_csv(image).as_bytes())?;
    Ok(())
}

fn image_to_csv(image: &Image) -> String {
    log::trace!("Formatting image as CSV");
    (0..image.rows())
        .map(|r| {
            image
                .row(r)
                .iter()
                .map(|pixel| pixel.to_string())
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Grey level of `value` after stretching `lo..hi` over the full range
fn stretch(value: u16, lo: f64, hi: f64) -> u8 {
    let span = (hi - lo).max(1.0);
    (((value as f64 - lo) / span).clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Renders a labelled greyscale preview, first scanned line on top
pub fn save_preview(path: &Path, image: &Image, obs: &Observation) -> Result<()> {
    log::debug!("Rendering preview to {:?}", path);
    let (rows, cols) = image.shape();
    let root = BitMapBackend::new(path, (cols as u32, rows as u32)).into_drawing_area();
    root.fill(&BLACK)?;

    let lo = image.percentile(1.0) as f64;
    let hi = image.percentile(99.5) as f64;
    log::trace!("Stretching preview between {} and {}", lo, hi);
    for r in 0..rows {
        for (c, pixel) in image.row(r).iter().enumerate() {
            let level = stretch(*pixel, lo, hi);
            root.draw_pixel(
                (c as i32, (rows - 1 - r) as i32),
                &RGBColor(level, level, level),
            )?;
        }
    }

    let style = ("sans-serif", 14).into_font().color(&WHITE);
    root.draw_text(&obs.date()?, &style, (10, 5))?;
    root.draw_text(&obs.time()?, &style, (cols as i32 - 70, 5))?;
    root.draw_text(
        &format!("{:.2} sec", obs.exposure),
        &style,
        (10, rows as i32 - 20),
    )?;

    log::trace!("Pushing preview to rendering backend");
    root.present()?;
    Ok(())
}

impl Output {
    pub fn write_image(&self, image: &Image, obs: &Observation) -> Result<()> {
        match self.format {
            OutputFormat::Fits => save_fits(&self.output, image, obs),
            OutputFormat::Preview => save_preview(&self.output, image, obs),
            OutputFormat::Csv => save_csv(&self.output, image),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allsky340::Crop;

    fn test_image() -> Image {
        let raw: Vec<u8> = (0..Crop::Cropped.pixel_count())
            .flat_map(|i| ((i % 512) as u16).to_le_bytes())
            .collect();
        Image::decode(&raw, Crop::Cropped).unwrap()
    }

    #[test]
    fn convert_image_to_csv() {
        let csv = image_to_csv(&test_image());
        let lines: Vec<_> = csv.split('\n').collect();
        assert_eq!(lines.len(), 480);
        let fields: Vec<_> = lines[0].split(',').collect();
        assert_eq!(fields.len(), 512);
        assert_eq!(fields[0], "0");
        assert_eq!(fields[511], "511");
    }

    #[test]
    fn stretch_levels() {
        assert_eq!(stretch(0, 100.0, 200.0), 0);
        assert_eq!(stretch(150, 100.0, 200.0), 128);
        assert_eq!(stretch(60_000, 100.0, 200.0), 255);
        // Flat images do not divide by zero
        assert_eq!(stretch(5, 5.0, 5.0), 0);
    }

    #[test]
    fn save_fits_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.fits");
        let obs = Observation {
            exposure: 2.5,
            frame: FrameType::Light,
            taken_at: OffsetDateTime::UNIX_EPOCH,
        };
        save_fits(&path, &test_image(), &obs).unwrap();

        let data = std::fs::read(&path).unwrap();
        assert_eq!(data.len() % 2880, 0);
        let header = String::from_utf8_lossy(&data[..2880]);
        assert!(header.contains("DATE-OBS= '1970/01/01'"));
        assert!(header.contains("IMAGETYP= 'light   '"));
    }
}
