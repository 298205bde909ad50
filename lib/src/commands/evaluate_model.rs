use crate::forecast_model::*;
use crate::storage::*;
use crate::plotter::*;
use crate::evaluation::{evaluate_windows, EvaluationReport};
use crate::windowing::{extract_windows, Window};
use getset::{Setters};
use anyhow::Context;
use tracing::info;

#[derive(Debug, Default, Setters)]
#[getset(set = "pub")]
pub struct EvaluationOptions {
    /// Stem of the plot files; derived from the model name when absent.
    pub plot_name : Option<String>
}

/// Scores a saved model on a price history, which need not be the one it was
/// trained on, against the last value baseline.
pub fn evaluate_model(model : &mut impl ForecastModel,
                      plotter : &mut impl Plotter,
                      storage : &mut impl Storage,
                      model_name : &str,
                      input_name : &str,
                      eval_options : EvaluationOptions) -> anyhow::Result<EvaluationReport> {
    let preprocessing = model.load(model_name)
        .with_context(|| format!("Could not load model '{}'", model_name))?;

    let history = storage.load_price_history(input_name)
        .with_context(|| format!("Could not load price history '{}'", input_name))?;

    let windows : Vec<Window> = extract_windows(&history, &preprocessing.window, &preprocessing.normalizer)?.collect();
    let (report, series) = evaluate_windows(&*model, &windows, &preprocessing)?;
    info!(rmse = report.rmse, baseline_rmse = report.baseline_rmse, samples = report.samples, "evaluated model");

    let plot_name = eval_options.plot_name.unwrap_or_else(|| format!("{}_evaluation", model_name));
    let target_name = preprocessing.window.target.column_name();
    let delta = series.expectations.iter().zip(&series.predictions).map(|(e, p)| e - p).collect();

    plotter.plot_lines(&vec!((String::from("Predicted"), series.predictions),
                             (String::from("Actual"), series.expectations),
                             (String::from("Last value"), series.baseline)),
                       &format!("Predicted vs Actual {} price", target_name), &plot_name)?;
    plotter.plot_lines(&vec!((String::from("Delta"), delta)),
                       &format!("Actual {} price - Predicted {} price", target_name, target_name),
                       &format!("{}_delta", plot_name))?;

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Preprocessing;
    use crate::errors::{find_forecast_error, ForecastError};
    use crate::normalization::Normalizer;
    use crate::price_history::PriceField;
    use crate::utils::tests::*;
    use crate::windowing::WindowConfig;
    use mockall::{Sequence, predicate::*};

    fn preprocessing(lookback : usize) -> Preprocessing {
        Preprocessing {
            window : WindowConfig { lookback, features : vec!(PriceField::Close), target : PriceField::Close },
            normalizer : Normalizer::identity()
        }
    }

    #[test]
    fn evaluate_model_with_history_smaller_than_lookback() {
        let mut model = MockForecastModel::new();
        let mut plotter = MockPlotter::new();
        let mut storage = MockStorage::new();

        model.expect_load()
            .with(eq("modelA"))
            .times(1)
            .return_once(|_| Ok(preprocessing(8)));
        storage.expect_load_price_history()
            .with(eq("SBUX.csv"))
            .times(1)
            .return_once(|_| Ok(build_history(8)));
        model.expect_predict().times(0);
        plotter.expect_plot_lines().times(0);

        let result = evaluate_model(&mut model, &mut plotter, &mut storage,
                                    "modelA", "SBUX.csv", EvaluationOptions::default());

        let error = result.unwrap_err();
        assert!(matches!(find_forecast_error(&error), Some(ForecastError::Config(_))));
    }

    #[test]
    fn evaluate_model_predicts_every_window() -> anyhow::Result<()> {
        let mut model = MockForecastModel::new();
        let mut plotter = MockPlotter::new();
        let mut storage = MockStorage::new();

        let mut seq = Sequence::new();
        model.expect_load()
            .with(eq("modelA"))
            .times(1)
            .in_sequence(&mut seq)
            .return_once(|_| Ok(preprocessing(3)));
        storage.expect_load_price_history()
            .times(1)
            .return_once(|_| Ok(build_history(6)));

        // Closes are 2..7, so windows end at 4, 5 and 6
        model.expect_predict()
            .withf(|input| input.anchor == 4.0)
            .times(1)
            .return_once(|_| Ok(5.0));
        model.expect_predict()
            .withf(|input| input.anchor == 5.0)
            .times(1)
            .return_once(|_| Ok(5.5));
        model.expect_predict()
            .withf(|input| input.anchor == 6.0)
            .times(1)
            .return_once(|_| Ok(7.5));

        plotter.expect_plot_lines()
            .withf(|lines, _title, filename| filename == "sbux_run" &&
                lines == &vec!((String::from("Predicted"), vec!(5.0, 5.5, 7.5)),
                               (String::from("Actual"), vec!(5.0, 6.0, 7.0)),
                               (String::from("Last value"), vec!(4.0, 5.0, 6.0))))
            .times(1)
            .returning(|_, _, _| Ok(()));
        plotter.expect_plot_lines()
            .withf(|lines, _title, filename| filename == "sbux_run_delta" &&
                lines == &vec!((String::from("Delta"), vec!(0.0, 0.5, -0.5))))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut options = EvaluationOptions::default();
        options.set_plot_name(Some(String::from("sbux_run")));
        let report = evaluate_model(&mut model, &mut plotter, &mut storage, "modelA", "SBUX.csv", options)?;

        assert_eq!(report.samples, 3);
        assert_eq!(report.baseline_rmse, 1.0);
        assert_eq!(report.mae, 1.0 / 3.0);
        assert!(report.beats_baseline());
        Ok(())
    }

    #[test]
    fn missing_model_is_reported() {
        let mut model = MockForecastModel::new();
        let mut plotter = MockPlotter::new();
        let mut storage = MockStorage::new();

        model.expect_load()
            .return_once(|_| Err(anyhow::anyhow!("No such file or directory")));
        storage.expect_load_price_history().times(0);

        let result = evaluate_model(&mut model, &mut plotter, &mut storage,
                                    "missing.json", "SBUX.csv", EvaluationOptions::default());

        assert!(format!("{:#}", result.unwrap_err()).starts_with("Could not load model 'missing.json'"));
    }
}
