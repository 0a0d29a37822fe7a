//! Runtime configuration for the spatial transformer and the output shape it implies.

use crate::border::BorderMode;
use crate::error::Error;
use crate::util::expect_rank;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serialization")]
use std::fs::File;
#[cfg(feature = "serialization")]
use std::io::{BufReader, BufWriter};
#[cfg(feature = "serialization")]
use std::path::Path;

/// Output scale factors and border policy for one transformer.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
pub struct TransformerConfig {
    pub scale_height: f64,
    pub scale_width: f64,
    pub border_mode: BorderMode,
}

impl Default for TransformerConfig {
    fn default() -> Self {
        Self {
            scale_height: 1.0,
            scale_width: 1.0,
            border_mode: BorderMode::Nearest,
        }
    }
}

impl TransformerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scale(mut self, scale_height: f64, scale_width: f64) -> Self {
        self.scale_height = scale_height;
        self.scale_width = scale_width;
        self
    }

    pub fn with_border_mode(mut self, border_mode: BorderMode) -> Self {
        self.border_mode = border_mode;
        self
    }

    /// Checks that both scale factors are finite and strictly positive.
    pub fn validate(&self) -> Result<(), Error> {
        for (name, scale) in [
            ("scale_height", self.scale_height),
            ("scale_width", self.scale_width),
        ] {
            if !scale.is_finite() || scale <= 0.0 {
                return Err(Error::InvalidOperation(format!(
                    "{} must be finite and positive, got {}",
                    name, scale
                )));
            }
        }
        Ok(())
    }

    /// Writes the configuration to `path` as JSON.
    #[cfg(feature = "serialization")]
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let file = File::create(path)
            .map_err(|e| Error::IoErrorString(format!("Failed to create file: {}", e)))?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)
            .map_err(|e| Error::SerializationError(format!("Failed to serialize config: {}", e)))
    }

    /// Loads and validates a configuration written by [`TransformerConfig::save_to_file`].
    #[cfg(feature = "serialization")]
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let file = File::open(path)
            .map_err(|e| Error::IoErrorString(format!("Failed to open file: {}", e)))?;
        let reader = BufReader::new(file);
        let config: Self = serde_json::from_reader(reader).map_err(|e| {
            Error::DeserializationError(format!("Failed to deserialize config: {}", e))
        })?;
        config.validate()?;
        Ok(config)
    }
}

/// `floor(scale * extent)`, rejecting results that do not fit a `usize`.
fn scaled_extent(axis: &str, scale: f64, extent: usize) -> Result<usize, Error> {
    let scaled = (scale * extent as f64).floor();
    // usize::MAX as f64 rounds up to 2^64, which is itself out of range
    if !scaled.is_finite() || scaled >= usize::MAX as f64 {
        return Err(Error::InvalidOperation(format!(
            "Output {} {} (scale {} x {}) does not fit in usize",
            axis, scaled, scale, extent
        )));
    }
    Ok(scaled as usize)
}

/// Shape of a transformer output: `(batch, channels, height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OutputDims {
    pub batch: usize,
    pub channels: usize,
    pub height: usize,
    pub width: usize,
}

impl OutputDims {
    pub fn new(batch: usize, channels: usize, height: usize, width: usize) -> Self {
        Self {
            batch,
            channels,
            height,
            width,
        }
    }

    /// Derives the output shape of an NCHW input under `config`:
    /// `(N, C, floor(scale_height * H), floor(scale_width * W))`.
    pub fn from_input(input_shape: &[usize], config: &TransformerConfig) -> Result<Self, Error> {
        expect_rank(input_shape, 4)?;
        config.validate()?;
        let (n, c, h, w) = (input_shape[0], input_shape[1], input_shape[2], input_shape[3]);
        let height = scaled_extent("height", config.scale_height, h)?;
        let width = scaled_extent("width", config.scale_width, w)?;
        let dims = Self::new(n, c, height, width);
        dims.checked_len()?;
        Ok(dims)
    }

    /// Number of sampling locations per batch entry.
    ///
    /// Only meaningful for dimensions that passed [`OutputDims::checked_len`].
    pub fn spatial_size(&self) -> usize {
        self.height * self.width
    }

    /// Element count of the larger of the output image `(N, C, H, W)` and the
    /// grid `(2, N, H, W)`.
    ///
    /// Fails with `InvalidOperation` if either count overflows `usize`.
    pub fn checked_len(&self) -> Result<usize, Error> {
        let count = |dims: &[usize]| {
            dims.iter()
                .try_fold(1usize, |acc, &x| acc.checked_mul(x))
                .ok_or_else(|| {
                    Error::InvalidOperation(format!(
                        "Output dimensions {:?} multiply to overflow usize",
                        dims
                    ))
                })
        };
        let image = count(self.to_vec().as_slice())?;
        let grid = count(self.grid_shape().as_slice())?;
        Ok(image.max(grid))
    }

    pub fn to_vec(&self) -> Vec<usize> {
        vec![self.batch, self.channels, self.height, self.width]
    }

    /// Shape of the sampling grid for these dimensions: `(2, batch, height, width)`.
    pub fn grid_shape(&self) -> Vec<usize> {
        vec![2, self.batch, self.height, self.width]
    }
}
