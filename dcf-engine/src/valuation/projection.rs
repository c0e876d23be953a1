//! Explicit-period cash flow projection.

use serde::{Deserialize, Serialize};

use crate::error::{Result, ValuationError};

/// Shortest explicit forecast window.
pub const MIN_FORECAST_YEARS: u32 = 3;
/// Longest explicit forecast window.
pub const MAX_FORECAST_YEARS: u32 = 10;

/// Growth path across the explicit window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthSchedule {
    /// Same growth every year
    #[default]
    Constant,
    /// Linear fade from the starting growth (year 1) to `target` (final year)
    LinearFade { target: f64 },
}

impl GrowthSchedule {
    /// Growth applied in `year` (1-based) of a `years`-long window.
    pub fn growth_for_year(&self, start: f64, year: u32, years: u32) -> f64 {
        match *self {
            Self::Constant => start,
            Self::LinearFade { target } => {
                if years <= 1 {
                    return start;
                }
                let t = f64::from(year - 1) / f64::from(years - 1);
                start + (target - start) * t
            }
        }
    }
}

/// One projected year.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastYear {
    /// 1-based year index
    pub year: u32,
    /// Growth applied to reach this year's cash flow
    pub growth: f64,
    /// Projected free cash flow
    pub fcf: f64,
    /// `1 / (1 + wacc)^year`
    pub discount_factor: f64,
    /// `fcf * discount_factor`
    pub present_value: f64,
}

/// Ordered explicit forecast window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub wacc: f64,
    pub years: Vec<ForecastYear>,
}

impl ForecastPeriod {
    /// Sum of discounted explicit cash flows.
    pub fn pv_sum(&self) -> f64 {
        self.years.iter().map(|y| y.present_value).sum()
    }

    /// Cash flow in the last explicit year.
    pub fn final_fcf(&self) -> f64 {
        self.years.last().map_or(0.0, |y| y.fcf)
    }

    /// Discount factor of the last explicit year.
    pub fn final_discount_factor(&self) -> f64 {
        self.years.last().map_or(1.0, |y| y.discount_factor)
    }

    pub fn len(&self) -> usize {
        self.years.len()
    }

    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }
}

/// Projects free cash flow over the explicit window.
#[derive(Debug, Clone, Copy, Default)]
pub struct CashFlowProjector {
    schedule: GrowthSchedule,
}

impl CashFlowProjector {
    pub fn new(schedule: GrowthSchedule) -> Self {
        Self { schedule }
    }

    pub fn schedule(&self) -> GrowthSchedule {
        self.schedule
    }

    /// Project `years` of cash flow from `fcf0` and discount at `wacc`.
    pub fn project(&self, fcf0: f64, growth: f64, years: u32, wacc: f64) -> Result<ForecastPeriod> {
        if !(MIN_FORECAST_YEARS..=MAX_FORECAST_YEARS).contains(&years) {
            return Err(ValuationError::configuration(format!(
                "forecast window must be {}-{} years, got {}",
                MIN_FORECAST_YEARS, MAX_FORECAST_YEARS, years
            )));
        }
        if !(wacc.is_finite() && wacc > 0.0) {
            return Err(ValuationError::configuration(format!(
                "discount rate must be positive, got {}",
                wacc
            )));
        }
        if !fcf0.is_finite() || !growth.is_finite() {
            return Err(ValuationError::computation(
                "non-finite cash flow or growth in projection",
            ));
        }

        let mut fcf = fcf0;
        let mut discount_factor = 1.0;
        let projected = (1..=years)
            .map(|year| {
                let g = self.schedule.growth_for_year(growth, year, years);
                fcf *= 1.0 + g;
                discount_factor /= 1.0 + wacc;
                ForecastYear {
                    year,
                    growth: g,
                    fcf,
                    discount_factor,
                    present_value: fcf * discount_factor,
                }
            })
            .collect();

        Ok(ForecastPeriod {
            wacc,
            years: projected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_growth_projection() {
        let projector = CashFlowProjector::default();
        let period = projector.project(10_000.0, 0.10, 5, 0.09).unwrap();

        assert_eq!(period.len(), 5);
        assert_eq!(period.years[0].year, 1);
        assert!((period.years[0].fcf - 11_000.0).abs() < 1e-9);
        assert!((period.final_fcf() - 10_000.0 * 1.1f64.powi(5)).abs() < 1e-6);

        for y in &period.years {
            let expected = y.fcf / 1.09f64.powi(y.year as i32);
            assert!((y.present_value - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn test_pv_sum() {
        let projector = CashFlowProjector::default();
        let period = projector.project(10_000.0, 0.10, 5, 0.09).unwrap();
        let expected: f64 = (1..=5)
            .map(|t| 10_000.0 * 1.1f64.powi(t) / 1.09f64.powi(t))
            .sum();
        assert!((period.pv_sum() - expected).abs() < 1e-6);
    }

    #[test]
    fn test_linear_fade() {
        let projector = CashFlowProjector::new(GrowthSchedule::LinearFade { target: 0.04 });
        let period = projector.project(1_000.0, 0.20, 5, 0.10).unwrap();
        assert!((period.years[0].growth - 0.20).abs() < 1e-12);
        assert!((period.years[2].growth - 0.12).abs() < 1e-12);
        assert!((period.years[4].growth - 0.04).abs() < 1e-12);
    }

    #[test]
    fn test_window_bounds() {
        let projector = CashFlowProjector::default();
        assert!(projector.project(100.0, 0.05, 2, 0.09).is_err());
        assert!(projector.project(100.0, 0.05, 11, 0.09).is_err());
        assert!(projector.project(100.0, 0.05, 10, 0.09).is_ok());
    }

    #[test]
    fn test_non_positive_wacc_rejected() {
        let projector = CashFlowProjector::default();
        let err = projector.project(100.0, 0.05, 5, 0.0).unwrap_err();
        assert!(err.is_configuration());
    }
}
