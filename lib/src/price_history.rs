use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::errors::ForecastError;

#[derive(Debug, PartialEq, Clone, Deserialize, Serialize)]
pub struct PriceRecord {
    pub date : NaiveDate,
    pub open : f32,
    pub high : f32,
    pub low : f32,
    pub close : f32,
    pub volume : f32
}

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, EnumString, Deserialize, Serialize)]
#[strum(serialize_all = "snake_case")]
pub enum PriceField {
    Open,
    High,
    Low,
    Close,
    Volume
}

impl PriceField {
    pub const ALL : [PriceField; 5] = [PriceField::Open, PriceField::High, PriceField::Low,
        PriceField::Close, PriceField::Volume];

    pub fn index(&self) -> usize {
        match self {
            PriceField::Open => 0,
            PriceField::High => 1,
            PriceField::Low => 2,
            PriceField::Close => 3,
            PriceField::Volume => 4
        }
    }

    pub fn value_of(&self, record : &PriceRecord) -> f32 {
        match self {
            PriceField::Open => record.open,
            PriceField::High => record.high,
            PriceField::Low => record.low,
            PriceField::Close => record.close,
            PriceField::Volume => record.volume
        }
    }

    /// Column header used by daily price exports.
    pub fn column_name(&self) -> &'static str {
        match self {
            PriceField::Open => "Open",
            PriceField::High => "High",
            PriceField::Low => "Low",
            PriceField::Close => "Close",
            PriceField::Volume => "Volume"
        }
    }
}

/// Sorts records by date ascending and rejects histories with repeated dates.
pub fn sort_history(mut history : Vec<PriceRecord>) -> Result<Vec<PriceRecord>, ForecastError> {
    history.sort_by_key(|r| r.date);

    if let Some(pair) = history.windows(2).find(|pair| pair[0].date == pair[1].date) {
        return Err(ForecastError::Data(format!("Date {} appears more than once", pair[0].date)));
    }

    Ok(history)
}

pub fn series_of(history : &[PriceRecord], field : PriceField) -> Vec<f32> {
    history.iter().map(|r| field.value_of(r)).collect()
}
