mod adam;
mod network;

use forecast_lib::{Dataset, ForecastError, ForecastModel, Preprocessing, TrainingSummary, Window, WindowInput};
use anyhow::{anyhow, Context};
use getset::Setters;
use ndarray::Array1;
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use adam::Adam;
use network::{LstmArchitecture, LstmWeights};

pub const ARTIFACT_FORMAT_VERSION : u32 = 1;

#[derive(Debug, PartialEq, Clone, Setters, Deserialize, Serialize)]
#[getset(set = "pub")]
pub struct LstmTrainingParams {
    pub hidden_size : usize,
    pub num_layers : usize,
    pub epochs : usize,
    pub learning_rate : f64,
    pub batch_size : usize,
    pub gradient_clip : Option<f64>,
    pub seed : u64
}

impl Default for LstmTrainingParams {
    fn default() -> Self {
        LstmTrainingParams { hidden_size : 32, num_layers : 1, epochs : 100, learning_rate : 0.001,
            batch_size : 32, gradient_clip : Some(1.0), seed : 1138 }
    }
}

impl LstmTrainingParams {
    fn validate(&self) -> Result<(), ForecastError> {
        if self.hidden_size == 0 || self.num_layers == 0 {
            return Err(ForecastError::Config(format!("Model needs at least one layer of one unit, got {} x {}",
                self.num_layers, self.hidden_size)));
        }
        if self.epochs == 0 || self.batch_size == 0 {
            return Err(ForecastError::Config(String::from("Epochs and batch size must be positive")));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(ForecastError::Config(format!("Learning rate {} must be positive", self.learning_rate)));
        }
        if let Some(clip) = self.gradient_clip {
            if !(clip.is_finite() && clip > 0.0) {
                return Err(ForecastError::Config(format!("Gradient clip {} must be positive", clip)));
            }
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
struct ModelArtifact {
    format_version : u32,
    architecture : LstmArchitecture,
    lookback : usize,
    preprocessing : Preprocessing,
    seed : u64,
    summary : TrainingSummary,
    weights : LstmWeights
}

struct Sample {
    steps : Vec<Array1<f64>>,
    anchor : f64,
    target : f64
}

impl Sample {
    fn from_window(window : &Window) -> Sample {
        Sample { steps : to_steps(&window.input), anchor : window.input.anchor as f64, target : window.target as f64 }
    }
}

fn to_steps(input : &WindowInput) -> Vec<Array1<f64>> {
    input.steps.iter().map(|step| step.iter().map(|v| *v as f64).collect()).collect()
}

fn mean_squared_error(weights : &LstmWeights, samples : &[Sample]) -> f64 {
    let total : f64 = samples.iter()
        .map(|s| (weights.forward(&s.steps, s.anchor).output - s.target).powi(2))
        .sum();
    total / samples.len() as f64
}

/// Stacked LSTM regressor trained with Adam through backpropagation through time.
pub struct LstmModel {
    artifact : Option<ModelArtifact>
}

impl LstmModel {
    pub fn new() -> LstmModel {
        LstmModel { artifact : None }
    }

    pub fn summary(&self) -> Option<&TrainingSummary> {
        self.artifact.as_ref().map(|a| &a.summary)
    }
}

impl ForecastModel for LstmModel {
    type TrainingParams = LstmTrainingParams;

    fn train(&mut self, dataset : &Dataset, params : &LstmTrainingParams) -> anyhow::Result<TrainingSummary> {
        self.artifact = None;
        params.validate()?;
        if dataset.training.is_empty() {
            return Err(ForecastError::Training(String::from("Training partition is empty")).into());
        }

        let preprocessing = &dataset.preprocessing;
        let architecture = LstmArchitecture { input_size : preprocessing.window.features.len(),
            hidden_size : params.hidden_size, num_layers : params.num_layers };

        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut weights = LstmWeights::init(&architecture, &mut rng);
        let mut optimizer = Adam::new(params.learning_rate, &weights);

        let training : Vec<Sample> = dataset.training.iter().map(Sample::from_window).collect();
        let validation : Vec<Sample> = dataset.validation.iter().map(Sample::from_window).collect();

        let mut order : Vec<usize> = (0..training.len()).collect();
        let mut loss_history = Vec::with_capacity(params.epochs);
        let mut validation_loss = None;
        for epoch in 1..=params.epochs {
            order.shuffle(&mut rng);

            let mut epoch_loss = 0.0;
            for batch in order.chunks(params.batch_size) {
                let mut gradients = weights.zeros_like();
                for &index in batch {
                    let sample = &training[index];
                    let pass = weights.forward(&sample.steps, sample.anchor);
                    let error = pass.output - sample.target;
                    epoch_loss += error * error;
                    weights.backward(&pass, 2.0 * error / batch.len() as f64, &mut gradients);
                }

                if let Some(clip) = params.gradient_clip {
                    let norm = gradients.norm();
                    if norm > clip {
                        gradients.scale(clip / norm);
                    }
                }
                optimizer.step(&mut weights, &gradients);
            }

            // Losses are recorded as f32, so anything past f32::MAX counts as diverged too
            let training_loss = (epoch_loss / training.len() as f64) as f32;
            validation_loss = if validation.is_empty() { None } else {
                Some(mean_squared_error(&weights, &validation) as f32)
            };
            let diverged = !training_loss.is_finite() || !weights.is_finite() ||
                validation_loss.map_or(false, |loss| !loss.is_finite());
            if diverged {
                return Err(ForecastError::Training(format!("Loss became non-finite at epoch {}", epoch)).into());
            }

            debug!(epoch, training_loss, validation_loss = ?validation_loss, "finished epoch");
            loss_history.push(training_loss);
        }

        let summary = TrainingSummary {
            epochs : params.epochs,
            final_training_loss : loss_history.last().copied().unwrap_or(0.0),
            final_validation_loss : validation_loss,
            loss_history
        };
        info!(epochs = summary.epochs, training_loss = summary.final_training_loss,
              validation_loss = ?summary.final_validation_loss, "finished training");

        self.artifact = Some(ModelArtifact {
            format_version : ARTIFACT_FORMAT_VERSION,
            architecture,
            lookback : preprocessing.window.lookback,
            preprocessing : preprocessing.clone(),
            seed : params.seed,
            summary : summary.clone(),
            weights
        });

        Ok(summary)
    }

    fn predict(&self, input : &WindowInput) -> anyhow::Result<f32> {
        let artifact = self.artifact.as_ref().ok_or(anyhow!("Model has not been trained yet"))?;

        if input.steps.len() != artifact.lookback {
            return Err(anyhow!("Passed window has {} steps but the model needs exactly {}",
                input.steps.len(), artifact.lookback));
        }
        if input.steps.iter().any(|step| step.len() != artifact.architecture.input_size) {
            return Err(anyhow!("Every step should have {} features", artifact.architecture.input_size));
        }

        let output = artifact.weights.forward(&to_steps(input), input.anchor as f64).output;
        Ok(output as f32)
    }

    fn save(&self, output_name : &str) -> anyhow::Result<()> {
        let artifact = self.artifact.as_ref().ok_or(anyhow!("Model has not been trained yet"))?;

        // Encode before touching the file
        let encoded = serde_json::to_vec_pretty(artifact)?;
        if let Some(parent) = std::path::Path::new(output_name).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(output_name, encoded)
            .with_context(|| format!("Could not write '{}'", output_name))?;
        Ok(())
    }

    fn load(&mut self, name : &str) -> anyhow::Result<Preprocessing> {
        let file = std::fs::File::open(name)?;
        let artifact : ModelArtifact = ::serde_json::from_reader(std::io::BufReader::new(file))?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(anyhow!("Unsupported model format version {}, expected {}",
                artifact.format_version, ARTIFACT_FORMAT_VERSION));
        }
        let architecture = artifact.weights.architecture();
        if architecture != artifact.architecture ||
            architecture.input_size != artifact.preprocessing.window.features.len() ||
            artifact.lookback != artifact.preprocessing.window.lookback {
            return Err(anyhow!("Model file '{}' has inconsistent architecture {:?}", name, artifact.architecture));
        }

        let preprocessing = artifact.preprocessing.clone();
        self.artifact = Some(artifact);
        Ok(preprocessing)
    }
}
