/// Fatal error kinds of a forecasting run. Each one aborts the run; the kind tells
/// the caller which stage failed.
#[derive(Debug, PartialEq, Clone)]
pub enum ForecastError {
    Data(String),
    Config(String),
    Training(String)
}

impl ForecastError {
    pub fn stage(&self) -> &'static str {
        match self {
            ForecastError::Data(_) => "loading data",
            ForecastError::Config(_) => "configuration",
            ForecastError::Training(_) => "training"
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            ForecastError::Data(_) => 2,
            ForecastError::Config(_) => 3,
            ForecastError::Training(_) => 4
        }
    }
}

impl std::fmt::Display for ForecastError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::result::Result<(), std::fmt::Error> {
        match self {
            ForecastError::Data(text) => write!(f, "data error: {}", text),
            ForecastError::Config(text) => write!(f, "config error: {}", text),
            ForecastError::Training(text) => write!(f, "training error: {}", text)
        }
    }
}

impl std::error::Error for ForecastError {
}

/// Finds the `ForecastError` behind an `anyhow::Error`, looking through any added context.
pub fn find_forecast_error(error : &anyhow::Error) -> Option<&ForecastError> {
    error.chain().find_map(|cause| cause.downcast_ref::<ForecastError>())
}
