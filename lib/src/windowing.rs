use serde::{Deserialize, Serialize};

use crate::errors::ForecastError;
use crate::normalization::Normalizer;
use crate::price_history::{PriceField, PriceRecord};

#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct WindowConfig {
    pub lookback : usize,
    pub features : Vec<PriceField>,
    pub target : PriceField
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig { lookback : 20, features : PriceField::ALL.to_vec(), target : PriceField::Close }
    }
}

impl WindowConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.lookback == 0 {
            return Err(ForecastError::Config(String::from("Lookback must be a positive number of steps")));
        }
        if self.features.is_empty() {
            return Err(ForecastError::Config(String::from("At least one input feature is required")));
        }

        Ok(())
    }
}

/// Normalized model input: `lookback` steps of feature values, plus the target
/// field's value at the last step.
#[derive(Debug, PartialEq, Clone)]
pub struct WindowInput {
    pub steps : Vec<Vec<f32>>,
    pub anchor : f32
}

#[derive(Debug, PartialEq, Clone)]
pub struct Window {
    pub input : WindowInput,
    pub target : f32
}

/// Lazily slides the lookback frame over the history, one window per start offset.
pub struct Windows<'a> {
    history : &'a [PriceRecord],
    config : &'a WindowConfig,
    normalizer : &'a Normalizer,
    offset : usize,
    end : usize
}

impl<'a> Iterator for Windows<'a> {
    type Item = Window;

    fn next(&mut self) -> Option<Window> {
        if self.offset >= self.end {
            return None;
        }

        let input_end = self.offset + self.config.lookback;
        let input = build_input(&self.history[self.offset..input_end], self.config, self.normalizer);
        let target = self.normalizer.normalize(self.config.target, self.config.target.value_of(&self.history[input_end]));
        self.offset += 1;

        Some(Window { input, target })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.offset.min(self.end);
        (remaining, Some(remaining))
    }
}

impl<'a> ExactSizeIterator for Windows<'a> {
}

pub fn extract_windows<'a>(history : &'a [PriceRecord], config : &'a WindowConfig, normalizer : &'a Normalizer)
                           -> Result<Windows<'a>, ForecastError> {
    config.validate()?;
    if config.lookback >= history.len() {
        return Err(ForecastError::Config(format!("History size {} is not big enough for lookback {}",
            history.len(), config.lookback)));
    }

    Ok(Windows { history, config, normalizer, offset : 0, end : history.len() - config.lookback })
}

/// Input built from the most recent `lookback` records, for forecasting the step after them.
pub fn latest_input(history : &[PriceRecord], config : &WindowConfig, normalizer : &Normalizer)
                    -> Result<WindowInput, ForecastError> {
    config.validate()?;
    if config.lookback > history.len() {
        return Err(ForecastError::Config(format!("History size {} is smaller than lookback {}",
            history.len(), config.lookback)));
    }

    Ok(build_input(&history[history.len() - config.lookback..], config, normalizer))
}

fn build_input(input_steps : &[PriceRecord], config : &WindowConfig, normalizer : &Normalizer) -> WindowInput {
    let steps = input_steps.iter()
        .map(|r| config.features.iter().map(|f| normalizer.normalize(*f, f.value_of(r))).collect())
        .collect();
    let last_step = &input_steps[input_steps.len() - 1];
    let anchor = normalizer.normalize(config.target, config.target.value_of(last_step));

    WindowInput { steps, anchor }
}
