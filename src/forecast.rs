//! Linear sales trend
//!
//! Fits `sales = intercept + slope * t` by ordinary least squares, where `t`
//! is the 0-based index of each monthly bucket, and extends the line over the
//! following months.

use crate::aggregate::{month_end, Bucket};
use crate::error::ForecastError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fitted OLS line over a sequential index
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearTrend {
    pub intercept: f64,
    /// Sales change per month
    pub slope: f64,
    pub r_squared: f64,
    pub n_observations: usize,
}

impl LinearTrend {
    /// Fit the line to `values[i]` at index `i`
    pub fn fit(values: &[f64]) -> Result<Self, ForecastError> {
        if values.len() < 2 {
            return Err(ForecastError::InsufficientData {
                required: 2,
                actual: values.len(),
            });
        }

        let n = values.len() as f64;
        let sum_t: f64 = (0..values.len()).map(|i| i as f64).sum();
        let sum_y: f64 = values.iter().sum();
        let sum_t2: f64 = (0..values.len()).map(|i| (i * i) as f64).sum();
        let sum_ty: f64 = values.iter().enumerate().map(|(i, &y)| i as f64 * y).sum();

        let denominator = n * sum_t2 - sum_t * sum_t;
        if denominator.abs() < 1e-10 {
            return Err(ForecastError::Numerical(
                "zero variance in the month index".to_string(),
            ));
        }

        let slope = (n * sum_ty - sum_t * sum_y) / denominator;
        let intercept = (sum_y - slope * sum_t) / n;

        let mean_y = sum_y / n;
        let ss_tot: f64 = values.iter().map(|&y| (y - mean_y).powi(2)).sum();
        let ss_res: f64 = values
            .iter()
            .enumerate()
            .map(|(i, &y)| (y - (intercept + slope * i as f64)).powi(2))
            .sum();
        let r_squared = if ss_tot > 1e-10 { 1.0 - ss_res / ss_tot } else { 1.0 };

        Ok(LinearTrend {
            intercept,
            slope,
            r_squared,
            n_observations: values.len(),
        })
    }

    pub fn predict_at(&self, t: f64) -> f64 {
        self.intercept + self.slope * t
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub month_end: NaiveDate,
    pub predicted_sales: f64,
}

/// Projection of the monthly sales series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub trend: LinearTrend,
    /// Monthly totals the line was fitted to
    pub actual: Vec<Bucket>,
    pub predictions: Vec<ForecastPoint>,
}

impl Forecast {
    /// The "next month" figure shown on the dashboard
    pub fn next_month(&self) -> Option<&ForecastPoint> {
        self.predictions.first()
    }
}

/// Fit the monthly totals and project `horizon` further months
///
/// Predictions are labelled with the month-ends following the last bucket.
pub fn forecast_months(monthly: &[Bucket], horizon: usize) -> Result<Forecast, ForecastError> {
    let values: Vec<f64> = monthly.iter().map(|b| b.sales).collect();
    let trend = LinearTrend::fit(&values)?;

    let mut predictions = Vec::with_capacity(horizon);
    let mut label = monthly
        .last()
        .map(|b| b.period_end)
        .ok_or(ForecastError::InsufficientData {
            required: 2,
            actual: 0,
        })?;

    for step in 0..horizon {
        label = label
            .succ_opt()
            .map(month_end)
            .ok_or_else(|| ForecastError::Numerical(format!("no month follows {}", label)))?;
        predictions.push(ForecastPoint {
            month_end: label,
            predicted_sales: trend.predict_at((monthly.len() + step) as f64),
        });
    }

    Ok(Forecast {
        trend,
        actual: monthly.to_vec(),
        predictions,
    })
}
