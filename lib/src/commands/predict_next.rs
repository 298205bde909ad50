use crate::forecast_model::*;
use crate::storage::*;
use crate::windowing::latest_input;
use anyhow::{anyhow, Context};
use chrono::NaiveDate;

#[derive(Debug, PartialEq, Clone)]
pub struct Forecast {
    pub last_date : NaiveDate,
    pub last_value : f32,
    pub predicted_value : f32
}

/// Forecasts the target value of the step following the last record of the history.
pub fn predict_next(model : &mut impl ForecastModel,
                    storage : &mut impl Storage,
                    model_name : &str,
                    input_name : &str) -> anyhow::Result<Forecast> {
    let preprocessing = model.load(model_name)
        .with_context(|| format!("Could not load model '{}'", model_name))?;

    let history = storage.load_price_history(input_name)
        .with_context(|| format!("Could not load price history '{}'", input_name))?;
    let last_record = history.last().ok_or_else(|| anyhow!("Price history '{}' is empty", input_name))?;

    let input = latest_input(&history, &preprocessing.window, &preprocessing.normalizer)?;
    let prediction = model.predict(&input)?;

    let target = preprocessing.window.target;
    Ok(Forecast {
        last_date : last_record.date,
        last_value : target.value_of(last_record),
        predicted_value : preprocessing.normalizer.denormalize(target, prediction)
    })
}
