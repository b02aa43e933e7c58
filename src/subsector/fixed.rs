//! Exogenously fixed supply.
//!
//! Technologies may have a fixed output, which is served before any output is shared out by the
//! logit. When all of a subsector's output is fixed, the sector sets its share directly.
use super::Subsector;
use crate::input::check_proportion;
use crate::units::{Dimensionless, Energy};
use anyhow::{Context, Result};

impl Subsector {
    /// Total fixed output of the subsector's technologies
    pub fn get_fixed_supply(&self, period: usize) -> Result<Energy> {
        Ok(self
            .period_state(period)?
            .technologies
            .iter()
            .map(|tech| tech.fixed_output())
            .sum())
    }

    /// Total fixed supply, measured in the units of sector demand
    pub fn exog_supply(&self, period: usize) -> Result<Energy> {
        Ok(self.kind.service_for_output(self.get_fixed_supply(period)?))
    }

    /// Scale the fixed output of every technology by `ratio`
    pub fn scale_fixed_supply(&mut self, ratio: Dimensionless, period: usize) -> Result<()> {
        for technology in &mut self.period_state_mut(period)?.technologies {
            technology.scale_fixed_output(ratio);
        }

        Ok(())
    }

    /// Restore the fixed output of every technology to its configured value
    pub fn reset_fixed_supply(&mut self, period: usize) -> Result<()> {
        for technology in &mut self.period_state_mut(period)?.technologies {
            technology.reset_fixed_output();
        }

        Ok(())
    }

    /// The share of sector output which is fixed
    pub fn get_fixed_share(&self, period: usize) -> Result<Dimensionless> {
        Ok(self.period_state(period)?.fixed_share)
    }

    /// Set the share of sector output which is fixed (must be between 0 and 1)
    pub fn set_fixed_share(&mut self, period: usize, share: Dimensionless) -> Result<()> {
        let id = self.id.clone();
        check_proportion(share.value(), "Fixed share")
            .with_context(|| format!("Invalid fixed share for subsector {id}"))?;
        self.period_state_mut(period)?.fixed_share = share;

        Ok(())
    }

    /// Set the share to the fixed share
    pub fn set_share_to_fixed_value(&mut self, period: usize) -> Result<()> {
        let state = self.period_state_mut(period)?;
        state.stage.check_not_terminal("set share to fixed value")?;
        state.share = state.fixed_share;

        Ok(())
    }

    /// Whether all of the subsector's output is fixed.
    ///
    /// This is the case if the share weight is zero or every technology has a fixed output.
    pub fn all_output_fixed(&self, period: usize) -> Result<bool> {
        let state = self.period_state(period)?;
        Ok(state.share_weight.value() == 0.0
            || state.technologies.iter().all(|tech| tech.is_output_fixed()))
    }
}
