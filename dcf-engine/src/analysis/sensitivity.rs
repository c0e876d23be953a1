//! WACC × growth sensitivity grid.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::valuation::{DcfModel, DcfParameters, TerminalMethod};

/// Offsets applied to each axis by default (±2 points in 1 point steps).
pub const DEFAULT_STEPS: [f64; 5] = [-0.02, -0.01, 0.0, 0.01, 0.02];

/// Which growth rate the grid varies against WACC.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensitivityAxis {
    /// Explicit-period growth
    #[default]
    Growth,
    /// Perpetual growth after the window
    TerminalGrowth,
}

/// Fair value per share over a grid of discount rates and growth rates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityGrid {
    pub axis: SensitivityAxis,
    pub base_fair_value: f64,
    /// Row labels
    pub wacc_values: Vec<f64>,
    /// Column labels
    pub growth_values: Vec<f64>,
    /// `cells[row][col]`; `None` where the valuation is undefined
    pub cells: Vec<Vec<Option<f64>>>,
}

impl SensitivityGrid {
    pub fn cell(&self, row: usize, col: usize) -> Option<f64> {
        self.cells.get(row).and_then(|r| r.get(col)).copied().flatten()
    }

    /// Lowest and highest defined cell.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.cells
            .iter()
            .flatten()
            .flatten()
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Value every (WACC, growth) pair around `base`.
///
/// Steps are absolute offsets. Cells where the discount rate does not
/// exceed terminal growth under the perpetuity method are `None` and are
/// never computed.
pub fn sensitivity_grid(
    model: &DcfModel,
    base: &DcfParameters,
    axis: SensitivityAxis,
    wacc_steps: &[f64],
    growth_steps: &[f64],
) -> Result<SensitivityGrid> {
    let base_fair_value = model.value(base)?.fair_value_per_share;

    let wacc_values: Vec<f64> = wacc_steps.iter().map(|s| base.wacc + s).collect();
    let growth_values: Vec<f64> = growth_steps
        .iter()
        .map(|s| match axis {
            SensitivityAxis::Growth => base.growth + s,
            SensitivityAxis::TerminalGrowth => base.terminal_growth + s,
        })
        .collect();

    let cells = wacc_values
        .iter()
        .map(|&wacc| {
            growth_values
                .iter()
                .map(|&g| {
                    let params = match axis {
                        SensitivityAxis::Growth => DcfParameters {
                            wacc,
                            growth: g,
                            ..*base
                        },
                        SensitivityAxis::TerminalGrowth => DcfParameters {
                            wacc,
                            terminal_growth: g,
                            ..*base
                        },
                    };
                    if wacc <= 0.0
                        || (params.method == TerminalMethod::Perpetuity
                            && wacc <= params.terminal_growth)
                    {
                        return None;
                    }
                    model.value(&params).ok().map(|v| v.fair_value_per_share)
                })
                .collect()
        })
        .collect();

    Ok(SensitivityGrid {
        axis,
        base_fair_value,
        wacc_values,
        growth_values,
        cells,
    })
}
