//! Terminal value and the dominance cap.
//!
//! With `S` the discounted explicit cash flows and `T` the discounted raw
//! terminal value, a terminal share `T / (S + T)` above the cap is
//! rebalanced by substituting `T' = S * cap / (1 - cap)`. Growth and the
//! discount rate are never re-solved.

use serde::{Deserialize, Serialize};

use super::projection::ForecastPeriod;
use super::TerminalMethod;
use crate::error::{Result, ValuationError};

/// Default maximum terminal share of enterprise value.
pub const DEFAULT_TERMINAL_CAP: f64 = 0.65;

/// Terminal value before and after the dominance cap.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TerminalValue {
    pub method: TerminalMethod,
    /// Undiscounted terminal value at the end of the window
    pub raw_value: f64,
    /// Undiscounted value after the cap
    pub capped_value: f64,
    /// Discounted raw value
    pub raw_present_value: f64,
    /// Discounted value used in enterprise value
    pub present_value: f64,
    /// Share of enterprise value after the cap (0-1)
    pub pct_of_ev: f64,
    /// Share of enterprise value before the cap (0-1)
    pub raw_pct_of_ev: f64,
    /// Whether the cap rebalanced the value
    pub capped: bool,
}

/// Terminal value model.
#[derive(Debug, Clone, Copy)]
pub struct TerminalValueModel {
    cap: f64,
}

impl Default for TerminalValueModel {
    fn default() -> Self {
        Self {
            cap: DEFAULT_TERMINAL_CAP,
        }
    }
}

impl TerminalValueModel {
    /// Create a model with a custom dominance cap.
    pub fn new(cap: f64) -> Result<Self> {
        if !(cap > 0.0 && cap < 1.0) {
            return Err(ValuationError::configuration(format!(
                "terminal cap must be in (0, 1), got {}",
                cap
            )));
        }
        Ok(Self { cap })
    }

    pub fn cap(&self) -> f64 {
        self.cap
    }

    /// Undiscounted terminal value at the end of the explicit window.
    pub fn terminal_value(
        &self,
        method: TerminalMethod,
        final_year_fcf: f64,
        terminal_growth: f64,
        wacc: f64,
        exit_multiple: f64,
    ) -> Result<f64> {
        let value = match method {
            TerminalMethod::Perpetuity => {
                if !(wacc > terminal_growth) {
                    return Err(ValuationError::configuration(format!(
                        "wacc ({:.4}) must exceed terminal growth ({:.4})",
                        wacc, terminal_growth
                    )));
                }
                final_year_fcf * (1.0 + terminal_growth) / (wacc - terminal_growth)
            }
            TerminalMethod::ExitMultiple => {
                if !(exit_multiple.is_finite() && exit_multiple > 0.0) {
                    return Err(ValuationError::configuration(format!(
                        "exit multiple must be positive, got {}",
                        exit_multiple
                    )));
                }
                final_year_fcf * exit_multiple
            }
        };

        if !value.is_finite() {
            return Err(ValuationError::computation("terminal value is not finite"));
        }
        Ok(value)
    }

    /// Value the tail of a projected window and apply the dominance cap.
    pub fn evaluate(
        &self,
        method: TerminalMethod,
        forecast: &ForecastPeriod,
        terminal_growth: f64,
        exit_multiple: f64,
    ) -> Result<TerminalValue> {
        let raw_value = self.terminal_value(
            method,
            forecast.final_fcf(),
            terminal_growth,
            forecast.wacc,
            exit_multiple,
        )?;
        let discount_factor = forecast.final_discount_factor();
        let explicit = forecast.pv_sum();
        let raw_pv = raw_value * discount_factor;

        let total = explicit + raw_pv;
        if !(total.is_finite() && total > 0.0) {
            return Err(ValuationError::computation(format!(
                "enterprise value is not positive ({})",
                total
            )));
        }

        let raw_pct = raw_pv / total;
        if raw_pct > self.cap {
            let present_value = explicit * self.cap / (1.0 - self.cap);
            Ok(TerminalValue {
                method,
                raw_value,
                capped_value: present_value / discount_factor,
                raw_present_value: raw_pv,
                present_value,
                pct_of_ev: self.cap,
                raw_pct_of_ev: raw_pct,
                capped: true,
            })
        } else {
            Ok(TerminalValue {
                method,
                raw_value,
                capped_value: raw_value,
                raw_present_value: raw_pv,
                present_value: raw_pv,
                pct_of_ev: raw_pct,
                raw_pct_of_ev: raw_pct,
                capped: false,
            })
        }
    }
}
