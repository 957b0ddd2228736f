//! Holdout accuracy scores recorded alongside trained artifacts.

use serde::{Deserialize, Serialize};

/// Error of predictions against the chronological holdout slice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HoldoutScore {
    pub rmse: f64,
    pub mae: f64,
    /// Mean absolute percentage error, in percent. Rows with a zero actual
    /// are left out; `None` if every actual is zero.
    pub mape: Option<f64>,
    pub observations: usize,
}

impl HoldoutScore {
    /// `None` when the slices are empty or of different length.
    pub fn compute(actual: &[f64], predicted: &[f64]) -> Option<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            return None;
        }
        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();
        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let pct: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| **a != 0.0)
            .map(|(a, e)| (e / a).abs())
            .collect();
        let mape = (!pct.is_empty()).then(|| 100.0 * pct.iter().sum::<f64>() / pct.len() as f64);
        Some(Self {
            rmse,
            mae,
            mape,
            observations: actual.len(),
        })
    }
}

/// Index splitting `len` rows into a `ratio` training prefix and holdout suffix.
pub fn split_index(len: usize, ratio: f64) -> usize {
    ((len as f64) * ratio).floor() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores_simple_errors() {
        let s = HoldoutScore::compute(&[100.0, 200.0], &[110.0, 190.0]).unwrap();
        assert!((s.rmse - 10.0).abs() < 1e-12);
        assert!((s.mae - 10.0).abs() < 1e-12);
        assert!((s.mape.unwrap() - 7.5).abs() < 1e-12);
        assert_eq!(s.observations, 2);
    }

    #[test]
    fn mismatched_lengths_yield_none() {
        assert!(HoldoutScore::compute(&[1.0], &[]).is_none());
        assert!(HoldoutScore::compute(&[], &[]).is_none());
    }

    #[test]
    fn split_truncates() {
        assert_eq!(split_index(10, 0.8), 8);
        assert_eq!(split_index(7, 0.8), 5);
    }
}
