use serde::{Deserialize, Serialize};

use crate::dataset::Preprocessing;
use crate::errors::ForecastError;
use crate::forecast_model::ForecastModel;
use crate::metrics;
use crate::windowing::Window;

#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct EvaluationReport {
    pub samples : usize,
    /// Mean squared error on normalized targets, the quantity training minimizes.
    pub validation_loss : f32,
    pub rmse : f32,
    pub mae : f32,
    /// Error of repeating the last observed target value.
    pub baseline_rmse : f32
}

impl EvaluationReport {
    pub fn beats_baseline(&self) -> bool {
        self.rmse < self.baseline_rmse
    }
}

/// Per-window values in price units.
#[derive(Debug, PartialEq, Clone, Default)]
pub struct EvaluationSeries {
    pub predictions : Vec<f32>,
    pub expectations : Vec<f32>,
    pub baseline : Vec<f32>
}

pub fn evaluate_windows(model : &impl ForecastModel, windows : &[Window], preprocessing : &Preprocessing)
                        -> anyhow::Result<(EvaluationReport, EvaluationSeries)> {
    if windows.is_empty() {
        return Err(ForecastError::Config(String::from("There are no windows to evaluate")).into());
    }

    let target = preprocessing.window.target;
    let normalizer = &preprocessing.normalizer;

    let mut normalized_predictions = Vec::with_capacity(windows.len());
    let mut normalized_expectations = Vec::with_capacity(windows.len());
    let mut series = EvaluationSeries::default();
    for window in windows {
        let prediction = model.predict(&window.input)?;
        if !prediction.is_finite() {
            return Err(ForecastError::Training(format!("Model predicted a non-finite value {}", prediction)).into());
        }

        normalized_predictions.push(prediction);
        normalized_expectations.push(window.target);
        series.predictions.push(normalizer.denormalize(target, prediction));
        series.expectations.push(normalizer.denormalize(target, window.target));
        series.baseline.push(normalizer.denormalize(target, window.input.anchor));
    }

    let report = EvaluationReport {
        samples : windows.len(),
        validation_loss : metrics::mean_squared_error(&normalized_predictions, &normalized_expectations),
        rmse : metrics::root_mean_squared_error(&series.predictions, &series.expectations),
        mae : metrics::mean_absolute_error(&series.predictions, &series.expectations),
        baseline_rmse : metrics::root_mean_squared_error(&series.baseline, &series.expectations)
    };
    if !(report.validation_loss.is_finite() && report.rmse.is_finite() && report.mae.is_finite()) {
        return Err(ForecastError::Training(format!("Evaluation produced non-finite errors: rmse {}, mae {}",
            report.rmse, report.mae)).into());
    }

    Ok((report, series))
}
