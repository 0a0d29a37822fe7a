//! Policies for mapping out-of-range sample coordinates back onto valid pixels.

use crate::error::Error;
use ndarray::NdFloat;
use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serialization")]
use serde::{Deserialize, Serialize};

/// How a neighbour coordinate outside `[0, extent - 1]` is turned into a pixel index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialization", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serialization", serde(rename_all = "lowercase"))]
pub enum BorderMode {
    /// Clamp to the closest edge pixel.
    #[default]
    Nearest,
    /// Reflect about the edges with period `2 * (extent - 1)`.
    Mirror,
    /// Tile the image with period `extent`.
    Wrap,
}

impl BorderMode {
    pub const ALL: [BorderMode; 3] = [BorderMode::Nearest, BorderMode::Mirror, BorderMode::Wrap];

    pub fn as_str(self) -> &'static str {
        match self {
            BorderMode::Nearest => "nearest",
            BorderMode::Mirror => "mirror",
            BorderMode::Wrap => "wrap",
        }
    }

    /// Maps an integral float coordinate (a floor or floor + 1 neighbour) onto
    /// `[0, extent - 1]`.
    ///
    /// `extent` is the axis length as a float. The result is still a float so the
    /// caller decides when to cast; it is always integral and non-negative for
    /// finite input.
    ///
    /// Under `Mirror`, an axis of length 1 has a zero period and every coordinate
    /// resolves to 0.
    pub fn resolve<F: NdFloat>(self, coord: F, extent: F) -> F {
        let zero = F::zero();
        let one = F::one();
        match self {
            BorderMode::Nearest => coord.max(zero).min(extent - one),
            BorderMode::Mirror => {
                let period = (extent - one) * (one + one);
                if period <= zero {
                    return zero;
                }
                floored_mod(coord, period).min(floored_mod(-coord, period))
            }
            BorderMode::Wrap => floored_mod(coord, extent),
        }
    }
}

/// Modulo whose result takes the sign of the divisor, e.g. `-1 mod 6 == 5`.
fn floored_mod<F: NdFloat>(value: F, modulus: F) -> F {
    let rem = value % modulus;
    if rem < F::zero() {
        rem + modulus
    } else {
        rem
    }
}

impl fmt::Display for BorderMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BorderMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "nearest" => Ok(BorderMode::Nearest),
            "mirror" => Ok(BorderMode::Mirror),
            "wrap" => Ok(BorderMode::Wrap),
            other => Err(Error::InvalidBorderMode(other.to_string())),
        }
    }
}
