//! Per-period state of a subsector.
//!
//! Every quantity which varies by simulation period lives in one [`PeriodState`] record, so all
//! per-period data has the same length by construction.
use crate::subsector::DEFAULT_SUBSECTOR_LOGIT_EXPONENT;
use crate::summary::Summary;
use crate::technology::Technology;
use crate::units::{Dimensionless, Energy, Money, MoneyPerEnergy};
use anyhow::{Result, ensure};
use std::fmt;

/// The stages a subsector passes through while a period is being solved.
///
/// Stages are ordered; the owning sector may return to [`PeriodStage::SharesComputed`] any number
/// of times before the period reaches [`PeriodStage::SummaryUpdated`], which is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum PeriodStage {
    /// Nothing has been computed for this period
    #[default]
    Uninitialized,
    /// Raw and/or normalised shares have been computed
    SharesComputed,
    /// Capacity limits have been applied across sibling subsectors
    CapacityClipped,
    /// Share weights have been adjusted to match calibration data
    CalibrationReconciled,
    /// Output has been allocated to technologies
    TechAllocated,
    /// Emissions have been computed from technology results
    EmissionsComputed,
    /// The reporting summary has been updated
    SummaryUpdated,
}

impl fmt::Display for PeriodStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::SharesComputed => "shares_computed",
            Self::CapacityClipped => "capacity_clipped",
            Self::CalibrationReconciled => "calibration_reconciled",
            Self::TechAllocated => "tech_allocated",
            Self::EmissionsComputed => "emissions_computed",
            Self::SummaryUpdated => "summary_updated",
        };
        write!(f, "{name}")
    }
}

impl PeriodStage {
    /// Check that the current stage is one of `allowed`, for the named operation
    pub fn check(self, operation: &str, allowed: &[PeriodStage]) -> Result<()> {
        ensure!(
            allowed.contains(&self),
            "Cannot {operation} while period is in stage {self}"
        );

        Ok(())
    }

    /// Check that the period has not been finalised
    pub fn check_not_terminal(self, operation: &str) -> Result<()> {
        ensure!(
            self != Self::SummaryUpdated,
            "Cannot {operation}: period has already been finalised"
        );

        Ok(())
    }
}

/// The state of a subsector for a single simulation period
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodState {
    /// Maximum share of sector output the subsector may supply
    pub capacity_limit: Dimensionless,
    /// Whether the capacity limit is binding
    pub cap_limited: bool,
    /// Share of sector output which is fixed
    pub fixed_share: Dimensionless,
    /// Logit share weight
    pub share_weight: Dimensionless,
    /// Whether the share weight was given in the input data
    pub share_weight_from_input: bool,
    /// Logit exponent (<= 0)
    pub logit_exponent: f64,
    /// Share before normalisation across sibling subsectors
    pub raw_share: Dimensionless,
    /// Share of sector output
    pub share: Dimensionless,
    /// Fuel input
    pub input: Energy,
    /// Primary energy consumption
    pub primary_energy_consumption: Energy,
    /// Subsector price
    pub price: MoneyPerEnergy,
    /// Fuel component of the subsector price
    pub fuel_price: MoneyPerEnergy,
    /// Output
    pub output: Energy,
    /// Greenhouse gas taxes paid
    pub carbon_tax_paid: Money,
    /// Elasticity of share with respect to GNP per capita
    pub fuel_pref_elasticity: f64,
    /// Whether calibration data was given for this period
    pub do_calibration: bool,
    /// The calibration output value, if any
    pub calibration_output: Option<Energy>,
    /// Whether the subsector is calibrated in this period
    pub calibration_status: bool,
    /// Number of share passes made in the current solve
    pub iterations: u32,
    /// Pipeline stage
    pub stage: PeriodStage,
    /// Technologies in this period
    pub technologies: Vec<Technology>,
    /// Reporting snapshot
    pub summary: Summary,
}

impl Default for PeriodState {
    fn default() -> Self {
        Self {
            capacity_limit: Dimensionless(1.0),
            cap_limited: false,
            fixed_share: Dimensionless(0.0),
            share_weight: Dimensionless(1.0),
            share_weight_from_input: false,
            logit_exponent: DEFAULT_SUBSECTOR_LOGIT_EXPONENT,
            raw_share: Dimensionless(0.0),
            share: Dimensionless(0.0),
            input: Energy(0.0),
            primary_energy_consumption: Energy(0.0),
            price: MoneyPerEnergy(0.0),
            fuel_price: MoneyPerEnergy(0.0),
            output: Energy(0.0),
            carbon_tax_paid: Money(0.0),
            fuel_pref_elasticity: 0.0,
            do_calibration: false,
            calibration_output: None,
            calibration_status: false,
            iterations: 0,
            stage: PeriodStage::Uninitialized,
            technologies: Vec::new(),
            summary: Summary::default(),
        }
    }
}
