//! Small numeric helpers shared by the analysis stages.

/// Arithmetic mean, `None` for an empty slice.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1 denominator), `None` below two values.
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let sum_sq: f64 = values.iter().map(|x| (x - m).powi(2)).sum();
    Some((sum_sq / (values.len() - 1) as f64).sqrt())
}

/// Quantile with linear interpolation between closest ranks.
///
/// `sorted` must be in ascending order.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let fraction = position - lower as f64;
    Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
}

/// Round half away from zero to two decimals.
///
/// Exact halves go away from zero (`0.125` gives `0.13`). Round-half-to-even,
/// the other common convention, would give `0.12`.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Ordinary least squares line through `(x, y)` points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn at(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit `y ≈ slope·x + intercept`. Needs at least two distinct x values.
///
/// Uses the centered form so that exact inputs give exact slopes.
pub fn fit_line(points: &[(f64, f64)]) -> Option<LinearFit> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let x_mean = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let y_mean = points.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    for (x, y) in points {
        let dx = x - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    if sxx == 0.0 {
        return None;
    }

    let slope = sxy / sxx;
    Some(LinearFit {
        slope,
        intercept: y_mean - slope * x_mean,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_std() {
        let values = [-5.0, 0.0, 5.0];
        assert_eq!(mean(&values), Some(0.0));
        assert_eq!(sample_std(&values), Some(5.0));
    }

    #[test]
    fn test_std_needs_two_values() {
        assert_eq!(sample_std(&[3.0]), None);
        assert_eq!(mean(&[]), None);
    }

    #[test]
    fn test_quantile_sorted() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(quantile_sorted(&values, 0.0), Some(1.0));
        assert_eq!(quantile_sorted(&values, 0.5), Some(2.5));
        assert_eq!(quantile_sorted(&values, 1.0), Some(4.0));
        assert_eq!(quantile_sorted(&[], 0.5), None);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.23456), 1.23);
        assert_eq!(round2(-7.0711), -7.07);
        assert_eq!(round2(11.0), 11.0);
        assert_eq!(round2(0.125), 0.13);
        assert_eq!(round2(-0.125), -0.13);
    }

    #[test]
    fn test_fit_line_exact() {
        let fit = fit_line(&[(2000.0, 10.0), (2001.0, 11.0), (2002.0, 12.0)]).unwrap();
        assert_eq!(fit.slope, 1.0);
        assert_eq!(fit.at(2003.0), 13.0);
    }

    #[test]
    fn test_fit_line_degenerate() {
        assert!(fit_line(&[(2000.0, 1.0)]).is_none());
        assert!(fit_line(&[(2000.0, 1.0), (2000.0, 2.0)]).is_none());
    }
}
