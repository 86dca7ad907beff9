use crate::{
    error::{Error, Result},
    flags::Crop,
};

pub enum Endianness {
    LittleEndian,
    BigEndian,
}

/// Byte order of a pixel on the wire: the even byte of each pair is the low
/// byte. Matches frames captured from the AllSky-340 on x86 hosts.
const PLANE_ORDER: Endianness = Endianness::LittleEndian;
pub const U16_FROM_PLANES: fn([u8; 2]) -> u16 = match PLANE_ORDER {
    Endianness::LittleEndian => u16::from_le_bytes,
    Endianness::BigEndian => u16::from_be_bytes,
};
pub const U16_TO_PLANES: fn(u16) -> [u8; 2] = match PLANE_ORDER {
    Endianness::LittleEndian => u16::to_le_bytes,
    Endianness::BigEndian => u16::to_be_bytes,
};

/// Read-out image, row 0 is the last line scanned by the sensor
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Image {
    rows: usize,
    cols: usize,
    pixels: Vec<u16>,
    substituted_blocks: Vec<usize>,
}

impl Image {
    /// Rebuilds an image from the raw transfer stream.
    ///
    /// Even and odd bytes form two planes, each pair becomes one pixel. Pixels
    /// arrive in scan order, which is flipped vertically here.
    pub fn decode(raw: &[u8], crop: Crop) -> Result<Self> {
        let expected = crop.pixel_count() * 2;
        if raw.len() != expected {
            return Err(Error::InvalidImageLength {
                expected,
                received: raw.len(),
            });
        }
        let cols = crop.cols();
        let pixels = raw
            .chunks_exact(cols * 2)
            .rev()
            .flat_map(|line| {
                line.chunks_exact(2)
                    .map(|pair| U16_FROM_PLANES([pair[0], pair[1]]))
            })
            .collect();
        Ok(Image {
            rows: Crop::ROWS,
            cols,
            pixels,
            substituted_blocks: Vec::new(),
        })
    }

    pub(crate) fn with_substituted_blocks(mut self, blocks: Vec<usize>) -> Self {
        self.substituted_blocks = blocks;
        self
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Pixels in row-major order
    pub fn pixels(&self) -> &[u16] {
        &self.pixels
    }

    /// Pixels of row `r`, left to right.
    ///
    /// # Panics
    ///
    /// Panics if `r` is not below [`Self::rows`], use [`Self::get`] for a
    /// checked lookup of single pixels.
    pub fn row(&self, r: usize) -> &[u16] {
        &self.pixels[r * self.cols..(r + 1) * self.cols]
    }

    pub fn get(&self, r: usize, c: usize) -> Option<u16> {
        if r < self.rows && c < self.cols {
            Some(self.pixels[r * self.cols + c])
        } else {
            None
        }
    }

    /// Indices of blocks that could not be transferred and were zero-filled
    pub fn substituted_blocks(&self) -> &[usize] {
        &self.substituted_blocks
    }

    /// Value below which `p` percent of pixels fall, nearest rank
    pub fn percentile(&self, p: f64) -> u16 {
        let mut sorted = self.pixels.clone();
        let last = sorted.len() - 1;
        let rank = ((p.clamp(0.0, 100.0) / 100.0) * last as f64).round() as usize;
        *sorted.select_nth_unstable(rank).1
    }

    pub fn median(&self) -> f64 {
        let mut sorted = self.pixels.clone();
        sorted.sort_unstable();
        let mid = sorted.len() / 2;
        if sorted.len() % 2 == 0 {
            (sorted[mid - 1] as f64 + sorted[mid] as f64) / 2.0
        } else {
            sorted[mid] as f64
        }
    }

    /// Pixel-wise difference, clamped at zero
    pub fn subtract_dark(&self, dark: &Image) -> Result<Image> {
        if self.shape() != dark.shape() {
            return Err(Error::ShapeMismatch(self.shape(), dark.shape()));
        }
        let pixels = self
            .pixels
            .iter()
            .zip(dark.pixels.iter())
            .map(|(light, dark)| light.saturating_sub(*dark))
            .collect();
        Ok(Image {
            pixels,
            substituted_blocks: self.substituted_blocks.clone(),
            ..*self
        })
    }
}
