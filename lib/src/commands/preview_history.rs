use crate::price_history::{series_of, PriceField, PriceRecord};
use crate::plotter::*;
use crate::storage::*;
use getset::{Setters};
use anyhow::Context;

#[derive(Debug, Setters)]
#[getset(set = "pub")]
pub struct PreviewOptions {
    pub rows : usize,
    pub column : PriceField,
    pub title : String,
    pub plot_name : String
}

impl Default for PreviewOptions {
    fn default() -> Self {
        PreviewOptions { rows : 5, column : PriceField::Volume, title : String::from("Stock Volume"),
            plot_name : String::from("history") }
    }
}

/// Prints the first rows of a price history and plots one of its columns.
/// Returns the number of records loaded.
pub fn preview_history(storage : &mut impl Storage,
                       plotter : &mut impl Plotter,
                       input_name : &str,
                       options : &PreviewOptions) -> anyhow::Result<usize> {
    let history = storage.load_price_history(input_name)
        .with_context(|| format!("Could not load price history '{}'", input_name))?;

    for line in format_preview(&history, options.rows) {
        println!("{}", line);
    }

    let column = options.column.column_name();
    plotter.plot_lines(&vec!((String::from(column), series_of(&history, options.column))),
                       &options.title, &options.plot_name)?;

    Ok(history.len())
}

pub fn format_preview(history : &[PriceRecord], rows : usize) -> Vec<String> {
    let mut lines = vec!(format!("{:<10} {:>12} {:>12} {:>12} {:>12} {:>14}",
        "Date", "Open", "High", "Low", "Close", "Volume"));
    for r in history.iter().take(rows) {
        lines.push(format!("{:<10} {:>12.4} {:>12.4} {:>12.4} {:>12.4} {:>14.0}",
            r.date.format("%Y-%m-%d"), r.open, r.high, r.low, r.close, r.volume));
    }

    lines
}
