use anyhow::{anyhow, Context};
use tracing::{info, warn};

use crate::dataset::{prepare_dataset, Dataset, DatasetOptions};
use crate::evaluation::{evaluate_windows, EvaluationReport};
use crate::forecast_model::{ForecastModel, TrainingSummary};
use crate::price_history::PriceRecord;
use crate::storage::Storage;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PipelineStage {
    Idle,
    DataLoaded,
    WindowsPrepared,
    Training,
    Evaluated,
    Saved,
    Failed
}

/// One training run, advanced one stage per call:
/// `Idle -> DataLoaded -> WindowsPrepared -> Training -> Evaluated -> Saved`.
///
/// A call made in the wrong stage is refused and leaves the run untouched. Any
/// failing stage moves the run to `Failed`, which like `Saved` is terminal.
pub struct Pipeline {
    stage : PipelineStage,
    history : Vec<PriceRecord>,
    dataset : Option<Dataset>,
    summary : Option<TrainingSummary>,
    report : Option<EvaluationReport>
}

impl Default for Pipeline {
    fn default() -> Self {
        Pipeline::new()
    }
}

impl Pipeline {
    pub fn new() -> Pipeline {
        Pipeline { stage : PipelineStage::Idle, history : Vec::new(), dataset : None, summary : None, report : None }
    }

    pub fn stage(&self) -> PipelineStage {
        self.stage
    }

    pub fn dataset(&self) -> Option<&Dataset> {
        self.dataset.as_ref()
    }

    pub fn summary(&self) -> Option<&TrainingSummary> {
        self.summary.as_ref()
    }

    pub fn report(&self) -> Option<&EvaluationReport> {
        self.report.as_ref()
    }

    pub fn load_data(&mut self, storage : &mut impl Storage, input_name : &str) -> anyhow::Result<usize> {
        self.expect_stage(PipelineStage::Idle)?;

        let result = storage.load_price_history(input_name)
            .with_context(|| format!("Could not load price history '{}'", input_name));
        let history = self.track(result)?;
        info!(records = history.len(), input = input_name, "loaded price history");

        self.history = history;
        self.stage = PipelineStage::DataLoaded;
        Ok(self.history.len())
    }

    /// Returns the sizes of the training and validation partitions.
    pub fn prepare_windows(&mut self, options : &DatasetOptions) -> anyhow::Result<(usize, usize)> {
        self.expect_stage(PipelineStage::DataLoaded)?;

        let result = prepare_dataset(&self.history, options).context("Could not prepare windows");
        let dataset = self.track(result)?;
        let sizes = (dataset.training.len(), dataset.validation.len());
        info!(lookback = options.window.lookback, training = sizes.0, validation = sizes.1, "prepared windows");

        self.dataset = Some(dataset);
        self.stage = PipelineStage::WindowsPrepared;
        Ok(sizes)
    }

    pub fn train<T : ForecastModel>(&mut self, model : &mut T, params : &T::TrainingParams) -> anyhow::Result<TrainingSummary> {
        self.expect_stage(PipelineStage::WindowsPrepared)?;
        self.stage = PipelineStage::Training;

        let dataset = self.dataset.as_ref().ok_or_else(|| anyhow!("Windows have not been prepared"))?;
        let result = model.train(dataset, params).context("Could not train model");
        let summary = self.track(result)?;
        info!(epochs = summary.epochs, training_loss = summary.final_training_loss, "trained model");

        self.summary = Some(summary.clone());
        Ok(summary)
    }

    pub fn evaluate(&mut self, model : &impl ForecastModel) -> anyhow::Result<EvaluationReport> {
        self.expect_stage(PipelineStage::Training)?;

        let dataset = self.dataset.as_ref().ok_or_else(|| anyhow!("Windows have not been prepared"))?;
        let result = evaluate_windows(model, &dataset.validation, &dataset.preprocessing)
            .context("Could not evaluate model");
        let (report, _series) = self.track(result)?;
        info!(rmse = report.rmse, baseline_rmse = report.baseline_rmse, samples = report.samples, "evaluated model");
        if !report.beats_baseline() {
            warn!("Model does not beat the last value baseline on the validation partition");
        }

        self.report = Some(report.clone());
        self.stage = PipelineStage::Evaluated;
        Ok(report)
    }

    pub fn save(&mut self, model : &impl ForecastModel, output_name : &str) -> anyhow::Result<()> {
        self.expect_stage(PipelineStage::Evaluated)?;

        let result = model.save(output_name)
            .with_context(|| format!("Could not save model to '{}'", output_name));
        self.track(result)?;
        info!(output = output_name, "saved model");

        self.stage = PipelineStage::Saved;
        Ok(())
    }

    fn expect_stage(&self, expected : PipelineStage) -> anyhow::Result<()> {
        if self.stage != expected {
            return Err(anyhow!("Pipeline is {:?} but this step needs it to be {:?}", self.stage, expected));
        }

        Ok(())
    }

    fn track<R>(&mut self, result : anyhow::Result<R>) -> anyhow::Result<R> {
        if result.is_err() {
            self.stage = PipelineStage::Failed;
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{find_forecast_error, ForecastError};
    use crate::forecast_model::MockForecastModel;
    use crate::price_history::PriceField;
    use crate::storage::MockStorage;
    use crate::utils::tests::*;
    use crate::windowing::WindowConfig;
    use mockall::{Sequence, predicate::*};

    fn options(lookback : usize) -> DatasetOptions {
        let mut options = DatasetOptions::default();
        options.set_window(WindowConfig { lookback, features : vec!(PriceField::Close), target : PriceField::Close });
        options
    }

    fn storage_with_history(num_steps : u32) -> MockStorage {
        let mut storage = MockStorage::new();
        storage.expect_load_price_history()
            .with(eq("SBUX.csv"))
            .times(1)
            .return_once(move |_| Ok(build_history(num_steps)));
        storage
    }

    #[test]
    fn full_run_reaches_saved() -> anyhow::Result<()> {
        let mut storage = storage_with_history(30);
        let mut model = MockForecastModel::new();

        let mut seq = Sequence::new();
        model.expect_train()
            .withf(|dataset, params| dataset.training.len() == 20 && dataset.validation.len() == 5 && *params == 7)
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_, _| Ok(TrainingSummary { epochs : 7, ..TrainingSummary::default() }));
        model.expect_predict()
            .times(5)
            .in_sequence(&mut seq)
            .returning(|input| Ok(input.anchor + 0.04));
        model.expect_save()
            .with(eq("model.json"))
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_| Ok(()));

        let mut pipeline = Pipeline::new();
        assert!(pipeline.dataset().is_none());
        assert_eq!(pipeline.load_data(&mut storage, "SBUX.csv")?, 30);
        assert_eq!(pipeline.stage(), PipelineStage::DataLoaded);
        assert_eq!(pipeline.prepare_windows(&options(5))?, (20, 5));
        assert_eq!(pipeline.stage(), PipelineStage::WindowsPrepared);
        assert_eq!(pipeline.dataset().map(|d| d.preprocessing.window.lookback), Some(5));
        assert!(pipeline.summary().is_none());
        assert_eq!(pipeline.train(&mut model, &7)?.epochs, 7);
        assert_eq!(pipeline.stage(), PipelineStage::Training);
        assert_eq!(pipeline.summary().map(|s| s.epochs), Some(7));
        assert!(pipeline.report().is_none());
        let report = pipeline.evaluate(&model)?;
        assert_eq!(pipeline.stage(), PipelineStage::Evaluated);
        assert_eq!(pipeline.report(), Some(&report));
        assert_eq!(report.samples, 5);
        assert!(report.beats_baseline());
        pipeline.save(&model, "model.json")?;
        assert_eq!(pipeline.stage(), PipelineStage::Saved);
        Ok(())
    }

    #[test]
    fn steps_out_of_order_are_refused() -> anyhow::Result<()> {
        let mut model = MockForecastModel::new();
        let mut pipeline = Pipeline::new();

        assert!(pipeline.prepare_windows(&options(5)).is_err());
        assert!(pipeline.train(&mut model, &1).is_err());
        assert!(pipeline.evaluate(&model).is_err());
        assert!(pipeline.save(&model, "model.json").is_err());
        assert_eq!(pipeline.stage(), PipelineStage::Idle);

        let mut storage = storage_with_history(30);
        pipeline.load_data(&mut storage, "SBUX.csv")?;
        assert!(pipeline.load_data(&mut storage, "SBUX.csv").is_err());
        assert_eq!(pipeline.stage(), PipelineStage::DataLoaded);
        Ok(())
    }

    #[test]
    fn data_error_fails_the_run() {
        let mut storage = MockStorage::new();
        storage.expect_load_price_history()
            .return_once(|_| Err(ForecastError::Data(String::from("missing Volume column")).into()));

        let mut pipeline = Pipeline::new();
        let error = pipeline.load_data(&mut storage, "SBUX.csv").unwrap_err();

        assert_eq!(pipeline.stage(), PipelineStage::Failed);
        assert!(matches!(find_forecast_error(&error), Some(ForecastError::Data(_))));
    }

    #[test]
    fn config_error_fails_before_training() -> anyhow::Result<()> {
        let mut storage = storage_with_history(5);
        let mut model = MockForecastModel::new();
        model.expect_train().times(0);

        let mut pipeline = Pipeline::new();
        pipeline.load_data(&mut storage, "SBUX.csv")?;
        let error = pipeline.prepare_windows(&options(5)).unwrap_err();

        assert_eq!(pipeline.stage(), PipelineStage::Failed);
        assert!(matches!(find_forecast_error(&error), Some(ForecastError::Config(_))));
        assert!(pipeline.train(&mut model, &1).is_err());
        Ok(())
    }

    #[test]
    fn training_error_never_saves() -> anyhow::Result<()> {
        let mut storage = storage_with_history(30);
        let mut model = MockForecastModel::new();
        model.expect_train()
            .return_once(|_, _| Err(ForecastError::Training(String::from("loss is NaN at epoch 3")).into()));
        model.expect_save().times(0);

        let mut pipeline = Pipeline::new();
        pipeline.load_data(&mut storage, "SBUX.csv")?;
        pipeline.prepare_windows(&options(5))?;
        let error = pipeline.train(&mut model, &1).unwrap_err();

        assert_eq!(pipeline.stage(), PipelineStage::Failed);
        assert!(matches!(find_forecast_error(&error), Some(ForecastError::Training(_))));
        assert!(pipeline.summary().is_none());
        assert!(pipeline.evaluate(&model).is_err());
        assert!(pipeline.report().is_none());
        assert!(pipeline.save(&model, "model.json").is_err());
        Ok(())
    }
}
