use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::errors::ForecastError;
use crate::price_history::{series_of, PriceField, PriceRecord};
use crate::utils;

const MIN_SCALE : f32 = 1e-12;

#[derive(Debug, PartialEq, Eq, Clone, Copy, EnumString, Deserialize, Serialize)]
#[strum(serialize_all = "kebab_case")]
pub enum NormalizationMethod {
    MinMax,
    ZScore
}

impl Default for NormalizationMethod {
    fn default() -> Self {
        NormalizationMethod::MinMax
    }
}

#[derive(Debug, PartialEq, Clone, Copy, Deserialize, Serialize)]
pub struct FieldScale {
    pub offset : f32,
    pub scale : f32
}

impl FieldScale {
    fn from_range(offset : f32, scale : f32) -> FieldScale {
        // Constant columns would divide by zero, keep them centered instead
        let scale = if scale.abs() < MIN_SCALE { 1.0 } else { scale };
        FieldScale { offset, scale }
    }
}

/// Per-field affine scaling, fitted once on the training partition and
/// applied unchanged to every other partition.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct Normalizer {
    pub method : NormalizationMethod,
    pub scales : [FieldScale; 5]
}

impl Normalizer {
    pub fn fit(history : &[PriceRecord], method : NormalizationMethod) -> Result<Normalizer, ForecastError> {
        if history.is_empty() {
            return Err(ForecastError::Training(String::from("Cannot fit normalization on an empty partition")));
        }

        let scales = PriceField::ALL.map(|field| {
            let series = series_of(history, field);
            match method {
                NormalizationMethod::MinMax => {
                    let (min_value, max_value) = utils::find_value_range(&series);
                    FieldScale::from_range(min_value, max_value - min_value)
                },
                NormalizationMethod::ZScore => {
                    let (mean, deviation) = utils::find_mean_and_deviation(&series);
                    FieldScale::from_range(mean, deviation)
                }
            }
        });

        Ok(Normalizer { method, scales })
    }

    pub fn identity() -> Normalizer {
        Normalizer { method : NormalizationMethod::MinMax, scales : [FieldScale { offset : 0.0, scale : 1.0 }; 5] }
    }

    pub fn normalize(&self, field : PriceField, value : f32) -> f32 {
        let FieldScale { offset, scale } = self.scales[field.index()];
        (value - offset) / scale
    }

    pub fn denormalize(&self, field : PriceField, value : f32) -> f32 {
        let FieldScale { offset, scale } = self.scales[field.index()];
        value * scale + offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::tests::*;
    use std::str::FromStr;

    #[test]
    fn min_max_maps_training_range_to_unit_interval() -> anyhow::Result<()> {
        let history = build_history(11);
        let normalizer = Normalizer::fit(&history, NormalizationMethod::MinMax)?;

        assert_eq!(normalizer.normalize(PriceField::Close, 2.0), 0.0);
        assert_eq!(normalizer.normalize(PriceField::Close, 12.0), 1.0);
        assert_eq!(normalizer.normalize(PriceField::Volume, 600.0), 0.5);
        Ok(())
    }

    #[test]
    fn z_score_centers_training_partition() -> anyhow::Result<()> {
        let history = build_history(9);
        let normalizer = Normalizer::fit(&history, NormalizationMethod::ZScore)?;

        let normalized : Vec<f32> = history.iter()
            .map(|r| normalizer.normalize(PriceField::Open, r.open))
            .collect();
        let mean = normalized.iter().sum::<f32>() / normalized.len() as f32;
        assert!(mean.abs() < 1e-5);
        Ok(())
    }

    #[test]
    fn held_out_values_round_trip() -> anyhow::Result<()> {
        let history = build_linear_trend(100, 50.0, 0.5);
        let (training, held_out) = history.split_at(80);

        for method in &[NormalizationMethod::MinMax, NormalizationMethod::ZScore] {
            let normalizer = Normalizer::fit(training, *method)?;
            for record in held_out {
                for field in &PriceField::ALL {
                    let value = field.value_of(record);
                    let restored = normalizer.denormalize(*field, normalizer.normalize(*field, value));
                    assert!((restored - value).abs() <= 1e-4 * value.abs().max(1.0),
                        "{:?} {:?}: {} != {}", method, field, restored, value);
                }
            }
        }
        Ok(())
    }

    #[test]
    fn constant_column_keeps_unit_scale() -> anyhow::Result<()> {
        let mut history = build_history(4);
        for record in history.iter_mut() {
            record.volume = 42.0;
        }

        let normalizer = Normalizer::fit(&history, NormalizationMethod::MinMax)?;

        assert_eq!(normalizer.scales[PriceField::Volume.index()].scale, 1.0);
        assert_eq!(normalizer.normalize(PriceField::Volume, 42.0), 0.0);
        Ok(())
    }

    #[test]
    fn fit_on_empty_partition_fails() {
        let result = Normalizer::fit(&[], NormalizationMethod::MinMax);
        assert!(matches!(result, Err(ForecastError::Training(_))));
    }

    #[test]
    fn parse_methods() {
        assert_eq!(NormalizationMethod::from_str("min-max").unwrap(), NormalizationMethod::MinMax);
        assert_eq!(NormalizationMethod::from_str("z-score").unwrap(), NormalizationMethod::ZScore);
    }
}
