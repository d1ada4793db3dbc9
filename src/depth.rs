//! Normalized depth maps and ROI statistics.

use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};
use serde::ser::{Serialize, SerializeSeq, Serializer};

/// Guards min-max normalization of flat maps.
const NORMALIZE_EPSILON: f32 = 1e-8;

/// Raw estimator output at the model's native resolution.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthPrediction {
    pub width: u32,
    pub height: u32,
    /// Row-major, `width × height` values, arbitrary scale.
    pub values: Vec<f32>,
}

impl DepthPrediction {
    pub fn new(width: u32, height: u32, values: Vec<f32>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("depth dimensions overflow"))?;
        if width == 0 || height == 0 {
            return Err(anyhow!("depth prediction must not be empty"));
        }
        if values.len() != expected {
            return Err(anyhow!(
                "expected {} depth values for {}x{}, received {}",
                expected,
                width,
                height,
                values.len()
            ));
        }
        Ok(Self {
            width,
            height,
            values,
        })
    }
}

/// Per-pixel relative depth, nominally in [0, 1].
///
/// Serializes as a list of rows.
#[derive(Clone, Debug, PartialEq)]
pub struct DepthMap {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl DepthMap {
    /// Wrap row-major values without normalizing them.
    pub fn from_values(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let prediction = DepthPrediction::new(width, height, data)?;
        Ok(Self {
            width: prediction.width,
            height: prediction.height,
            data: prediction.values,
        })
    }

    /// Build from a rectangular grid of rows.
    pub fn from_rows(rows: Vec<Vec<f32>>) -> Result<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|row| row.len() != width) {
            return Err(anyhow!("depth grid rows must all have the same length"));
        }
        let data = rows.into_iter().flatten().collect();
        Self::from_values(width as u32, height as u32, data)
    }

    pub fn filled(width: u32, height: u32, value: f32) -> Result<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .ok_or_else(|| anyhow!("depth dimensions overflow"))?;
        Self::from_values(width, height, vec![value; len])
    }

    /// Normalize a native prediction and resample it to `width × height` with a
    /// bicubic (Catmull-Rom) filter.
    ///
    /// The map is normalized before resampling, since the float resampler clamps
    /// to [0, 1], and again afterwards to absorb cubic overshoot.
    pub fn from_prediction(prediction: &DepthPrediction, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("target depth size must not be empty"));
        }
        let native = Self::from_values(
            prediction.width,
            prediction.height,
            prediction.values.clone(),
        )?
        .normalized();
        if native.width == width && native.height == height {
            return Ok(native);
        }

        let buffer: ImageBuffer<Luma<f32>, Vec<f32>> =
            ImageBuffer::from_raw(native.width, native.height, native.data)
                .ok_or_else(|| anyhow!("depth buffer does not match its dimensions"))?;
        let resized = imageops::resize(&buffer, width, height, FilterType::CatmullRom);
        Ok(Self::from_values(width, height, resized.into_raw())?.normalized())
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn values(&self) -> &[f32] {
        &self.data
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// True when at least one value is finite.
    pub fn has_finite_values(&self) -> bool {
        self.data.iter().any(|v| v.is_finite())
    }

    /// Min-max normalize into [0, 1]; non-finite values are left untouched and
    /// ignored when computing the range.
    pub fn normalized(mut self) -> Self {
        let (min, max) = self
            .data
            .iter()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            return self;
        }
        let scale = max - min + NORMALIZE_EPSILON;
        for v in self.data.iter_mut().filter(|v| v.is_finite()) {
            *v = (*v - min) / scale;
        }
        self
    }

    /// Values inside `[x1, x2) × [y1, y2)`, clipped to the map.
    ///
    /// Returns an empty vector when the clipped region is empty.
    pub fn roi(&self, x1: i64, y1: i64, x2: i64, y2: i64) -> Vec<f32> {
        let x1 = x1.max(0);
        let y1 = y1.max(0);
        let x2 = x2.min(self.width as i64);
        let y2 = y2.min(self.height as i64);
        if x2 <= x1 || y2 <= y1 {
            return Vec::new();
        }

        let row_len = self.width as usize;
        let mut out = Vec::with_capacity(((x2 - x1) * (y2 - y1)) as usize);
        for y in y1 as usize..y2 as usize {
            let start = y * row_len;
            out.extend_from_slice(&self.data[start + x1 as usize..start + x2 as usize]);
        }
        out
    }

    /// Rows of the map, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks(self.width as usize)
    }
}

impl Serialize for DepthMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.height as usize))?;
        for row in self.rows() {
            seq.serialize_element(row)?;
        }
        seq.end()
    }
}

/// Median and mean of `values`; `None` when empty.
pub fn median_and_mean(values: &[f32]) -> Option<(f32, f32)> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f32::total_cmp);
    let mid = sorted.len() / 2;
    let median = if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    };
    let mean = (sorted.iter().map(|&v| v as f64).sum::<f64>() / sorted.len() as f64) as f32;
    Some((median, mean))
}
