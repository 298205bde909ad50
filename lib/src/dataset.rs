use getset::Setters;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::ForecastError;
use crate::normalization::{NormalizationMethod, Normalizer};
use crate::price_history::PriceRecord;
use crate::windowing::{extract_windows, Window, WindowConfig};

#[derive(Debug, Clone, Setters)]
#[getset(set = "pub")]
pub struct DatasetOptions {
    pub window : WindowConfig,
    pub train_ratio : f32,
    pub normalization : NormalizationMethod
}

impl Default for DatasetOptions {
    fn default() -> Self {
        DatasetOptions { window : WindowConfig::default(), train_ratio : 0.8, normalization : NormalizationMethod::MinMax }
    }
}

/// Everything needed to turn raw records into model inputs again later.
#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct Preprocessing {
    pub window : WindowConfig,
    pub normalizer : Normalizer
}

#[derive(Debug, PartialEq, Clone)]
pub struct Dataset {
    pub training : Vec<Window>,
    pub validation : Vec<Window>,
    pub preprocessing : Preprocessing
}

/// Splits the windows chronologically and normalizes them with statistics of the
/// training partition only.
pub fn prepare_dataset(history : &[PriceRecord], options : &DatasetOptions) -> Result<Dataset, ForecastError> {
    if !(options.train_ratio > 0.0 && options.train_ratio < 1.0) {
        return Err(ForecastError::Config(format!("Train ratio {} must be between 0 and 1", options.train_ratio)));
    }

    let lookback = options.window.lookback;
    options.window.validate()?;
    if lookback >= history.len() {
        return Err(ForecastError::Config(format!("History size {} is not big enough for lookback {}",
            history.len(), lookback)));
    }

    // A ratio below 1 always leaves at least one validation window
    let window_count = history.len() - lookback;
    let training_count = (window_count as f64 * options.train_ratio as f64).floor() as usize;
    if training_count == 0 {
        return Err(ForecastError::Training(format!("Training partition is empty ({} windows, train ratio {})",
            window_count, options.train_ratio)));
    }

    // Records up to the last training target, nothing the validation targets add
    let normalizer = Normalizer::fit(&history[..training_count + lookback], options.normalization)?;

    let mut windows = extract_windows(history, &options.window, &normalizer)?;
    let training : Vec<Window> = windows.by_ref().take(training_count).collect();
    let validation : Vec<Window> = windows.collect();
    debug!(training = training.len(), validation = validation.len(), "split windows");

    Ok(Dataset { training, validation, preprocessing : Preprocessing { window : options.window.clone(), normalizer } })
}
