use crate::dataset::DatasetOptions;
use crate::evaluation::EvaluationReport;
use crate::forecast_model::*;
use crate::pipeline::Pipeline;
use crate::storage::*;

/// Runs a whole training pass: load, window, train, evaluate on the held-out
/// windows, then save. Nothing is written when an earlier stage fails.
pub fn train_model<T : ForecastModel>(model : &mut T,
                   storage : &mut impl Storage,
                   input_name : &str,
                   dataset_options : &DatasetOptions,
                   training_params : &T::TrainingParams,
                   output_name : &str) -> anyhow::Result<EvaluationReport> {
    let mut pipeline = Pipeline::new();
    pipeline.load_data(storage, input_name)?;
    pipeline.prepare_windows(dataset_options)?;
    pipeline.train(model, training_params)?;
    let report = pipeline.evaluate(&*model)?;
    pipeline.save(&*model, output_name)?;

    Ok(report)
}
