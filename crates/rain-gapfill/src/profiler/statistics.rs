//! Statistical helpers over series with missing values.

/// Mean of the present values, `None` when there are none.
pub(crate) fn mean(values: &[Option<f64>]) -> Option<f64> {
    let (sum, n) = values
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));

    if n == 0 { None } else { Some(sum / n as f64) }
}

/// Sample standard deviation (n - 1 denominator) of the present values.
///
/// `None` with fewer than two values.
pub(crate) fn sample_std(values: &[Option<f64>]) -> Option<f64> {
    let present: Vec<f64> = values.iter().flatten().copied().collect();
    if present.len() < 2 {
        return None;
    }

    let n = present.len() as f64;
    let mean = present.iter().sum::<f64>() / n;
    // A constant series must yield exactly zero, not rounding noise.
    if present.iter().all(|v| *v == present[0]) {
        return Some(0.0);
    }

    let variance = present.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt())
}

/// Pearson correlation over the timestamps where both series are present.
///
/// `None` with fewer than two joint observations or when either side is
/// constant over the joint subset.
pub(crate) fn pairwise_pearson(a: &[Option<f64>], b: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let (x0, y0) = pairs[0];
    if pairs.iter().all(|(x, _)| *x == x0) || pairs.iter().all(|(_, y)| *y == y0) {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    let denom = (sxx * syy).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }

    Some((sxy / denom).clamp(-1.0, 1.0))
}
