//! NaN-aware numeric helpers
//!
//! All aggregation in this crate ignores non-finite values: a participant
//! with no valid value contributes nothing, not a zero.

/// Mean over the finite values, `None` if there are none
pub fn nan_mean(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    Some(finite.iter().sum::<f64>() / finite.len() as f64)
}

/// Population standard deviation over the finite values
pub fn nan_std(values: &[f64]) -> Option<f64> {
    let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    let mean = finite.iter().sum::<f64>() / finite.len() as f64;
    let var = finite.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / finite.len() as f64;
    Some(var.sqrt())
}

/// Median over the finite values
pub fn nan_median(values: &[f64]) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let mid = finite.len() / 2;
    if finite.len() % 2 == 1 {
        Some(finite[mid])
    } else {
        Some((finite[mid - 1] + finite[mid]) / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nan_mean_ignores_nan() {
        assert_eq!(nan_mean(&[2.0, 4.0, f64::NAN]), Some(3.0));
        assert_eq!(nan_mean(&[f64::NAN]), None);
        assert_eq!(nan_mean(&[]), None);
    }

    #[test]
    fn test_nan_std_population() {
        // population std of [2, 4] is 1.0
        assert_eq!(nan_std(&[2.0, 4.0, f64::NAN]), Some(1.0));
        assert_eq!(nan_std(&[5.0]), Some(0.0));
        assert_eq!(nan_std(&[]), None);
    }

    #[test]
    fn test_nan_median() {
        assert_eq!(nan_median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(nan_median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(nan_median(&[f64::NAN, 7.0]), Some(7.0));
        assert_eq!(nan_median(&[]), None);
    }
}
