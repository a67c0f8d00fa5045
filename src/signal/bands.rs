//! Logarithmic (third-)octave band tables and spectrum-to-band aggregation.

use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Preferred numbers (R10) used to label base-10 bands.
const R10: [f64; 10] = [1.0, 1.25, 1.6, 2.0, 2.5, 3.15, 4.0, 5.0, 6.3, 8.0];

/// Width constant of the fractional band shape.
const FRACTIONAL_BANDWIDTH: f64 = 1.507;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OctaveBase {
    #[default]
    B10,
    B2,
}

impl OctaveBase {
    /// Octave ratio `g`.
    pub fn ratio(self) -> f64 {
        match self {
            OctaveBase::B10 => 10f64.powf(3.0 / 10.0),
            OctaveBase::B2 => 2.0,
        }
    }
}

/// How spectrum bins are attributed to bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OctaveWindow {
    /// Every bin inside `[min, max)` counts fully, the others not at all.
    Rectangular,
    /// Every bin counts, weighted by a 6th-order band-pass shape.
    #[default]
    Fractional,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FrequencyBand {
    pub min_frequency: f64,
    pub mid_frequency: f64,
    pub max_frequency: f64,
    pub spl: f64,
}

impl FrequencyBand {
    /// Band number `index` (0 is centred on 1 kHz).
    pub fn from_index(index: i32, base: OctaveBase, band_division: f64) -> Self {
        let g = base.ratio();
        // edges computed the same way on both sides so neighbours share them exactly
        let edge = |half_steps: i32| g.powf(half_steps as f64 / (2.0 * band_division)) * 1000.0;
        Self {
            min_frequency: edge(2 * index - 1),
            mid_frequency: edge(2 * index),
            max_frequency: edge(2 * index + 1),
            spl: 0.0,
        }
    }

    /// Index of the band whose `[min, max)` holds `target`, found by stepping
    /// outward from band 0.
    pub fn band_index(target: f64, base: OctaveBase, band_division: f64) -> EngineResult<i32> {
        if !target.is_finite() || target <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "band frequency must be positive, got {target}"
            )));
        }
        if !band_division.is_finite() || band_division <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "band division must be positive, got {band_division}"
            )));
        }
        let mut index = 0;
        loop {
            let band = Self::from_index(index, base, band_division);
            if target < band.min_frequency {
                index -= 1;
            } else if target >= band.max_frequency {
                index += 1;
            } else {
                return Ok(index);
            }
        }
    }

    /// Bands from the one containing `first` up to, but not including, the
    /// one containing `last`. `spl` starts at zero.
    pub fn empty_bands(
        first: f64,
        last: f64,
        base: OctaveBase,
        band_division: f64,
    ) -> EngineResult<Vec<FrequencyBand>> {
        let first_index = Self::band_index(first, base, band_division)?;
        let last_index = Self::band_index(last, base, band_division)?;
        Ok((first_index..last_index)
            .map(|index| Self::from_index(index, base, band_division))
            .collect())
    }

    pub fn nominal_frequency(&self, base: OctaveBase) -> f64 {
        nominal_frequency(self.mid_frequency, base)
    }
}

/// Conventional label of a band centre: the R10 preferred number for base-10
/// bands, three significant digits otherwise.
pub fn nominal_frequency(mid_frequency: f64, base: OctaveBase) -> f64 {
    match base {
        OctaveBase::B10 => {
            let k = (10.0 * mid_frequency.log10()).round() as i32;
            R10[k.rem_euclid(10) as usize] * 10f64.powi(k.div_euclid(10))
        }
        OctaveBase::B2 => {
            let scale = 10f64.powi(2 - mid_frequency.log10().floor() as i32);
            (mid_frequency * scale).round() / scale
        }
    }
}

/// Fills `bands[..].spl` from a dB spectrum of `spectrum.len()` bins covering
/// `0..sample_rate / 2`. Non-finite bin contributions are skipped; a band that
/// received nothing ends at `-inf`.
pub fn aggregate_bands(
    spectrum: &[f64],
    sample_rate: u32,
    bands: &mut [FrequencyBand],
    band_division: f64,
    window: OctaveWindow,
) {
    let freq_by_cell = spectrum.len() as f64 * 2.0 / sample_rate as f64;
    for band in bands.iter_mut() {
        let mut power = 0.0;
        for (cell, level) in spectrum.iter().enumerate() {
            let f = cell as f64 / freq_by_cell;
            let gain = match window {
                OctaveWindow::Rectangular => {
                    if f < band.min_frequency || f >= band.max_frequency {
                        continue;
                    }
                    1.0
                }
                OctaveWindow::Fractional => {
                    let division = (f / band.mid_frequency - band.mid_frequency / f)
                        * FRACTIONAL_BANDWIDTH
                        * band_division;
                    (1.0 / (1.0 + division.powi(6))).sqrt()
                }
            };
            let contribution = 10f64.powf(level / 10.0) * gain;
            if contribution.is_finite() {
                power += contribution;
            }
        }
        band.spl = 10.0 * power.log10();
    }
}
