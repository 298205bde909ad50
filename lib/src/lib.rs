mod errors;
mod price_history;
mod normalization;
mod windowing;
mod dataset;
mod forecast_model;
mod evaluation;
mod pipeline;
mod storage;
mod plotter;
pub mod metrics;
pub mod utils;

pub mod commands {
    pub mod train_model;
    pub mod evaluate_model;
    pub mod preview_history;
    pub mod predict_next;
}

pub use crate::errors::*;
pub use crate::price_history::*;
pub use crate::normalization::*;
pub use crate::windowing::*;
pub use crate::dataset::*;
pub use crate::forecast_model::*;
pub use crate::evaluation::*;
pub use crate::pipeline::*;
pub use crate::storage::*;
pub use crate::plotter::*;
