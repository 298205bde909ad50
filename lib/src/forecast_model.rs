use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Preprocessing};
use crate::windowing::WindowInput;

#[cfg(test)]
use mockall::{automock};

#[derive(Debug, PartialEq, Clone, Default, Deserialize, Serialize)]
pub struct TrainingSummary {
    pub epochs : usize,
    pub final_training_loss : f32,
    pub final_validation_loss : Option<f32>,
    pub loss_history : Vec<f32>
}

/// A sequence regression model working on normalized windows.
///
/// `train` keeps the dataset's preprocessing so that `save` can persist it next to
/// the weights, and `load` hands it back for preparing new inputs.
#[cfg_attr(test, automock(type TrainingParams = u32;))]
pub trait ForecastModel {
    type TrainingParams;

    fn train(&mut self, dataset : &Dataset, params : &Self::TrainingParams) -> anyhow::Result<TrainingSummary>;
    fn predict(&self, input : &WindowInput) -> anyhow::Result<f32>;

    fn save(&self, path : &str) -> anyhow::Result<()>;
    fn load(&mut self, path : &str) -> anyhow::Result<Preprocessing>;
}
