use forecast_lib::{sort_history, ForecastError, PriceField, PriceRecord};
use chrono::NaiveDate;
use tracing::debug;

const DATE_FORMATS : [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d"];

/// Reads daily price exports (`Date,Open,High,Low,Close,Adj Close,Volume`).
/// Names are file paths.
pub struct CsvStorage{}

impl CsvStorage {
    pub fn create() -> anyhow::Result<CsvStorage> {
        Ok(CsvStorage{})
    }
}

struct ColumnIndices {
    date : usize,
    fields : [usize; 5]
}

impl ColumnIndices {
    fn locate(headers : &csv::StringRecord) -> Result<ColumnIndices, ForecastError> {
        let find = |name : &str| headers.iter()
            .position(|header| header.eq_ignore_ascii_case(name))
            .ok_or_else(|| ForecastError::Data(format!("Missing column '{}'", name)));

        let date = find("Date")?;
        let mut fields = [0; 5];
        for field in PriceField::ALL.iter() {
            fields[field.index()] = find(field.column_name())?;
        }

        Ok(ColumnIndices { date, fields })
    }
}

fn parse_date(text : &str) -> Option<NaiveDate> {
    DATE_FORMATS.iter().find_map(|format| NaiveDate::parse_from_str(text, format).ok())
}

fn parse_record(row : &csv::StringRecord, columns : &ColumnIndices, row_number : usize) -> Result<PriceRecord, ForecastError> {
    let cell = |index : usize| row.get(index).unwrap_or("");

    let date_text = cell(columns.date);
    let date = parse_date(date_text)
        .ok_or_else(|| ForecastError::Data(format!("Row {}: could not parse date '{}'", row_number, date_text)))?;

    let mut values = [0.0f32; 5];
    for field in PriceField::ALL.iter() {
        let text = cell(columns.fields[field.index()]);
        let value = text.parse::<f32>().ok().filter(|v| v.is_finite())
            .ok_or_else(|| ForecastError::Data(format!("Row {}: invalid {} value '{}'",
                row_number, field.column_name(), text)))?;
        values[field.index()] = value;
    }

    Ok(PriceRecord { date, open : values[0], high : values[1], low : values[2], close : values[3], volume : values[4] })
}

impl forecast_lib::Storage for CsvStorage {
    fn load_price_history(&mut self, name : &str) -> anyhow::Result<Vec<PriceRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(name)
            .map_err(|e| ForecastError::Data(format!("Could not open '{}': {}", name, e)))?;

        let headers = reader.headers()
            .map_err(|e| ForecastError::Data(format!("Could not read header of '{}': {}", name, e)))?
            .clone();
        let columns = ColumnIndices::locate(&headers)?;

        let mut history = Vec::new();
        for (i, row) in reader.records().enumerate() {
            // Header is line 1
            let row_number = i + 2;
            let row = row.map_err(|e| ForecastError::Data(format!("Row {}: {}", row_number, e)))?;
            history.push(parse_record(&row, &columns, row_number)?);
        }

        if history.is_empty() {
            return Err(ForecastError::Data(format!("'{}' has no data rows", name)).into());
        }

        let history = sort_history(history)?;
        debug!(records = history.len(), first = %history[0].date, last = %history[history.len() - 1].date,
               "loaded price history");
        Ok(history)
    }
}
