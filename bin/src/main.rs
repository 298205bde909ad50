mod csv_storage;
mod lstm;
mod plotters_plotter;

use forecast_lib::commands::evaluate_model::{evaluate_model, EvaluationOptions};
use forecast_lib::commands::predict_next::predict_next;
use forecast_lib::commands::preview_history::{preview_history, PreviewOptions};
use forecast_lib::commands::train_model::train_model;
use forecast_lib::{find_forecast_error, DatasetOptions, EvaluationReport, NormalizationMethod, PriceField, WindowConfig};
use clap::AppSettings;
use structopt::StructOpt;
use tracing::Level;

use csv_storage::CsvStorage;
use lstm::{LstmModel, LstmTrainingParams};
use plotters_plotter::PlottersPlotter;

#[derive(Debug, StructOpt)]
#[structopt(name = "stock-forecast", about = "LSTM forecaster for daily stock prices")]
#[structopt(setting = AppSettings::ColoredHelp)]
struct Cli {
    /// Logs at debug level, or trace level when repeated
    #[structopt(short, long, parse(from_occurrences))]
    verbose : u8,

    #[structopt(subcommand)]
    command : Command
}

#[derive(Debug, StructOpt)]
enum Command {
    /// Prints the first rows of a price history and plots one of its columns
    Preview {
        #[structopt(long, default_value = "data/SBUX.csv")]
        input : String,
        #[structopt(long, default_value = "5")]
        rows : usize,
        #[structopt(long, default_value = "volume")]
        column : PriceField,
        /// Plot file name without the .png extension
        #[structopt(long, default_value = "history")]
        plot : String
    },
    /// Trains a model, scores it on the held-out windows and saves it
    Train(TrainArgs),
    /// Scores a saved model on a price history against the last value baseline
    Evaluate {
        #[structopt(long, default_value = "model.json")]
        model : String,
        #[structopt(long, default_value = "data/SBUX.csv")]
        input : String,
        /// Plot file name without the .png extension [default: <model>_evaluation]
        #[structopt(long)]
        plot : Option<String>
    },
    /// Forecasts the target value following the last record of a price history
    Predict {
        #[structopt(long, default_value = "model.json")]
        model : String,
        #[structopt(long, default_value = "data/SBUX.csv")]
        input : String
    }
}

#[derive(Debug, StructOpt)]
struct TrainArgs {
    #[structopt(long, default_value = "data/SBUX.csv")]
    input : String,
    #[structopt(long, default_value = "model.json")]
    output : String,
    #[structopt(long, default_value = "20")]
    lookback : usize,
    #[structopt(long, use_delimiter = true, default_value = "open,high,low,close,volume")]
    features : Vec<PriceField>,
    #[structopt(long, default_value = "close")]
    target : PriceField,
    #[structopt(long, default_value = "0.8")]
    train_ratio : f32,
    /// min-max or z-score
    #[structopt(long, default_value = "min-max")]
    normalization : NormalizationMethod,
    #[structopt(long, default_value = "32")]
    hidden_size : usize,
    #[structopt(long, default_value = "1")]
    num_layers : usize,
    #[structopt(long, default_value = "100")]
    epochs : usize,
    #[structopt(long, default_value = "0.001")]
    learning_rate : f64,
    #[structopt(long, default_value = "32")]
    batch_size : usize,
    /// Maximum global gradient norm
    #[structopt(long, default_value = "1.0")]
    gradient_clip : f64,
    #[structopt(long)]
    no_gradient_clip : bool,
    #[structopt(long, default_value = "1138")]
    seed : u64
}

impl TrainArgs {
    fn dataset_options(&self) -> DatasetOptions {
        let mut options = DatasetOptions::default();
        options.set_window(WindowConfig { lookback : self.lookback, features : self.features.clone(), target : self.target })
            .set_train_ratio(self.train_ratio)
            .set_normalization(self.normalization);
        options
    }

    fn training_params(&self) -> LstmTrainingParams {
        let mut params = LstmTrainingParams::default();
        params.set_hidden_size(self.hidden_size)
            .set_num_layers(self.num_layers)
            .set_epochs(self.epochs)
            .set_learning_rate(self.learning_rate)
            .set_batch_size(self.batch_size)
            .set_gradient_clip(if self.no_gradient_clip { None } else { Some(self.gradient_clip) })
            .set_seed(self.seed);
        params
    }
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Command::Preview { .. } => "preview",
            Command::Train(_) => "train",
            Command::Evaluate { .. } => "evaluate",
            Command::Predict { .. } => "predict"
        }
    }
}

fn print_report(report : &EvaluationReport) {
    println!("Validation samples : {}", report.samples);
    println!("Validation loss    : {:.6}", report.validation_loss);
    println!("RMSE               : {:.4}", report.rmse);
    println!("MAE                : {:.4}", report.mae);
    println!("Last value RMSE    : {:.4}", report.baseline_rmse);
    println!("Beats last value   : {}", if report.beats_baseline() { "yes" } else { "no" });
}

fn run(command : Command) -> anyhow::Result<()> {
    let mut storage = CsvStorage::create()?;

    match command {
        Command::Preview { input, rows, column, plot } => {
            let mut plotter = PlottersPlotter::create()?;
            let mut options = PreviewOptions::default();
            options.set_rows(rows)
                .set_column(column)
                .set_title(format!("Stock {}", column.column_name()))
                .set_plot_name(plot);
            let count = preview_history(&mut storage, &mut plotter, &input, &options)?;
            println!("{} records", count);
        },
        Command::Train(args) => {
            let mut model = LstmModel::new();
            let report = train_model(&mut model, &mut storage, &args.input, &args.dataset_options(),
                                     &args.training_params(), &args.output)?;
            if let Some(summary) = model.summary() {
                println!("Epochs             : {}", summary.epochs);
                println!("Training loss      : {:.6}", summary.final_training_loss);
            }
            print_report(&report);
            println!("Saved model to '{}'", args.output);
        },
        Command::Evaluate { model, input, plot } => {
            let mut plotter = PlottersPlotter::create()?;
            let mut options = EvaluationOptions::default();
            options.set_plot_name(plot);
            let report = evaluate_model(&mut LstmModel::new(), &mut plotter, &mut storage, &model, &input, options)?;
            print_report(&report);
        },
        Command::Predict { model, input } => {
            let forecast = predict_next(&mut LstmModel::new(), &mut storage, &model, &input)?;
            println!("Last date       : {}", forecast.last_date);
            println!("Last value      : {:.4}", forecast.last_value);
            println!("Next prediction : {:.4}", forecast.predicted_value);
        }
    }

    Ok(())
}

fn main() {
    let cli = Cli::from_args();

    let level = match cli.verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let command_name = cli.command.name();
    if let Err(error) = run(cli.command) {
        let (stage, exit_code) = match find_forecast_error(&error) {
            Some(forecast_error) => (forecast_error.stage(), forecast_error.exit_code()),
            None => (command_name, 1)
        };
        eprintln!("{} failed: {:#}", stage, error);
        std::process::exit(exit_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_defaults_match_library_defaults() {
        let cli = Cli::from_iter(vec!("stock-forecast", "train"));

        match cli.command {
            Command::Train(args) => {
                let options = args.dataset_options();
                assert_eq!(options.window, WindowConfig::default());
                assert_eq!(options.train_ratio, DatasetOptions::default().train_ratio);
                assert_eq!(options.normalization, NormalizationMethod::MinMax);
                assert_eq!(args.training_params(), LstmTrainingParams::default());
                assert_eq!(args.output, "model.json");
            },
            command => panic!("Unexpected command {:?}", command)
        }
    }

    #[test]
    fn train_flags_are_mapped() {
        let cli = Cli::from_iter(vec!("stock-forecast", "-vv", "train", "--features", "close,volume", "--target", "open",
            "--normalization", "z-score", "--lookback", "5", "--no-gradient-clip", "--seed", "7"));

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Train(args) => {
                let options = args.dataset_options();
                assert_eq!(options.window.features, vec!(PriceField::Close, PriceField::Volume));
                assert_eq!(options.window.target, PriceField::Open);
                assert_eq!(options.window.lookback, 5);
                assert_eq!(options.normalization, NormalizationMethod::ZScore);
                let params = args.training_params();
                assert_eq!(params.gradient_clip, None);
                assert_eq!(params.seed, 7);
            },
            command => panic!("Unexpected command {:?}", command)
        }
    }

    #[test]
    fn unknown_feature_is_rejected() {
        let result = Cli::from_iter_safe(vec!("stock-forecast", "train", "--features", "close,dividend"));

        assert!(result.is_err());
    }
}
