use crate::price_history::PriceRecord;

#[cfg(test)]
use mockall::{automock};

/// Source of daily price history. Implementations hand out records sorted by date
/// with no duplicate dates.
#[cfg_attr(test, automock)]
pub trait Storage {
    fn load_price_history(&mut self, name : &str) -> anyhow::Result<Vec<PriceRecord>>;
}
