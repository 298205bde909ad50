pub fn find_value_range(values : &[f32]) -> (f32, f32) {
    let mut min_value = f32::INFINITY;
    let mut max_value = f32::NEG_INFINITY;
    for v in values {
        min_value = min_value.min(*v);
        max_value = max_value.max(*v);
    }

    (min_value, max_value)
}

/// Mean and population standard deviation, accumulated in f64.
pub fn find_mean_and_deviation(values : &[f32]) -> (f32, f32) {
    if values.is_empty() {
        return (0.0, 0.0);
    }

    let count = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / count;
    let variance = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / count;

    (mean as f32, variance.sqrt() as f32)
}
