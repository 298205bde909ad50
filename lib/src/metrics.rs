pub fn mean_squared_error(predictions : &[f32], expectations : &[f32]) -> f32 {
    if predictions.is_empty() {
        return 0.0;
    }

    let total : f64 = predictions.iter().zip(expectations)
        .map(|(p, e)| (*p as f64 - *e as f64).powi(2))
        .sum();
    (total / predictions.len() as f64) as f32
}

pub fn root_mean_squared_error(predictions : &[f32], expectations : &[f32]) -> f32 {
    mean_squared_error(predictions, expectations).sqrt()
}

pub fn mean_absolute_error(predictions : &[f32], expectations : &[f32]) -> f32 {
    if predictions.is_empty() {
        return 0.0;
    }

    let total : f64 = predictions.iter().zip(expectations)
        .map(|(p, e)| (*p as f64 - *e as f64).abs())
        .sum();
    (total / predictions.len() as f64) as f32
}
