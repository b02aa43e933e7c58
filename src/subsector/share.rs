//! Logit share calculation and capacity limits for subsectors.
use super::Subsector;
use crate::period::PeriodStage;
use crate::units::Dimensionless;
use anyhow::{Result, ensure};
use log::{debug, warn};

/// Shares smaller than this are treated as zero when deciding whether a limit binds
const SMALL: f64 = 1e-6;

/// Bound a share by a capacity limit.
///
/// Shares up to half of the capacity limit are unchanged. Above this point the bounded share
/// approaches the capacity limit exponentially, with a continuous first derivative, so that it
/// never reaches the limit. The result is non-decreasing in `share`.
///
/// A capacity limit of zero always gives a share of zero and negative shares are treated as zero.
pub fn cap_limit_transform(cap_limit: Dimensionless, share: Dimensionless) -> Dimensionless {
    let cap_limit = cap_limit.value();
    let share = share.value().max(0.0);
    if cap_limit <= 0.0 {
        return Dimensionless(0.0);
    }

    let knee = 0.5 * cap_limit;
    if share <= knee {
        return Dimensionless(share);
    }

    let scale = cap_limit - knee;
    Dimensionless(cap_limit - scale * (-(share - knee) / scale).exp())
}

impl Subsector {
    /// Whether a capacity limit applies to the period (a limit of 1 is treated as no limit)
    fn has_capacity_limit(&self, period: usize) -> Result<bool> {
        Ok(self.period_state(period)?.capacity_limit.value() < 1.0)
    }

    /// Calculate the un-normalised logit share for the period.
    ///
    /// The share is `share_weight * price^logit_exponent * gnp_per_capita_scaler^elasticity`. It
    /// is zero if the price is not positive, the share weight is zero or all output is fixed. If
    /// the subsector is already flagged as capacity limited, the share is bounded by the capacity
    /// limit and the flag is updated to whether the limit binds.
    ///
    /// The result depends only on the inputs and stored state, so repeated calls give the same
    /// result.
    pub fn calc_share(
        &mut self,
        period: usize,
        gnp_per_capita_scaler: Dimensionless,
    ) -> Result<()> {
        let all_fixed = self.all_output_fixed(period)?;
        let limited = self.has_capacity_limit(period)?;
        let id = self.id.clone();
        let state = self.period_state_mut(period)?;
        state.stage.check_not_terminal("calculate share")?;

        let price = state.price.value();
        let mut share = if all_fixed || state.share_weight.value() <= 0.0 || price <= 0.0 {
            0.0
        } else {
            state.share_weight.value()
                * price.powf(state.logit_exponent)
                * gnp_per_capita_scaler
                    .value()
                    .powf(state.fuel_pref_elasticity)
        };
        ensure!(
            share.is_finite(),
            "Share for subsector {id} in period {period} is not finite (price: {price})"
        );

        if state.cap_limited && limited {
            let bounded = cap_limit_transform(state.capacity_limit, Dimensionless(share)).value();
            state.cap_limited = share - bounded > SMALL;
            share = bounded;
        }

        state.raw_share = Dimensionless(share);
        state.share = Dimensionless(share);
        state.iterations += 1;
        state.stage = PeriodStage::SharesComputed;

        Ok(())
    }

    /// Normalise the share by the sum of the shares of all subsectors in the sector.
    ///
    /// The share is recalculated from the stored raw share, so calling this twice with the same
    /// sum has the same effect as calling it once. A sum which is not positive leaves the share
    /// unchanged.
    pub fn norm_share(&mut self, sum: Dimensionless, period: usize) -> Result<()> {
        let id = self.id.clone();
        let state = self.period_state_mut(period)?;
        state
            .stage
            .check("normalise share", &[PeriodStage::SharesComputed])?;

        if !sum.is_finite() || sum.value() <= 0.0 {
            warn!(
                "Cannot normalise share for subsector {id} in period {period}: sum of shares is \
                {sum}. Share will be left unchanged."
            );
            return Ok(());
        }

        state.share = state.raw_share / sum;

        Ok(())
    }

    /// Apply the capacity limit after shares have been normalised.
    ///
    /// Subsectors which are already capacity limited are unchanged. A subsector whose share
    /// exceeds its bounded value is set to the bounded value and flagged as capacity limited.
    /// Otherwise, the share is multiplied by `multiplier`, which the sector chooses so that shares
    /// sum to one.
    pub fn limit_shares(&mut self, multiplier: Dimensionless, period: usize) -> Result<()> {
        let limited = self.has_capacity_limit(period)?;
        let id = self.id.clone();
        let state = self.period_state_mut(period)?;
        state.stage.check(
            "limit shares",
            &[PeriodStage::SharesComputed, PeriodStage::CapacityClipped],
        )?;
        state.stage = PeriodStage::CapacityClipped;

        if state.cap_limited {
            return Ok(());
        }

        let bounded = cap_limit_transform(state.capacity_limit, state.share);
        if limited && (state.share - bounded).value() > SMALL {
            debug!(
                "Subsector {id} is capacity limited in period {period}: share {} bounded to \
                {bounded}",
                state.share
            );
            state.share = bounded;
            state.cap_limited = true;
        } else if multiplier.value() == 0.0 {
            state.share = Dimensionless(0.0);
        } else {
            state.share *= multiplier;
        }

        Ok(())
    }

    /// Whether the share is above its bounded value without the subsector being flagged
    pub fn exceeds_capacity_limit(&self, period: usize) -> Result<bool> {
        let limited = self.has_capacity_limit(period)?;
        let state = self.period_state(period)?;
        if !limited || state.cap_limited {
            return Ok(false);
        }

        let bounded = cap_limit_transform(state.capacity_limit, state.share);
        Ok((state.share - bounded).value() > SMALL)
    }

    /// The un-normalised share, as of the last call to [`Subsector::calc_share`]
    pub fn get_raw_share(&self, period: usize) -> Result<Dimensionless> {
        Ok(self.period_state(period)?.raw_share)
    }

    /// The subsector's share of sector output
    pub fn get_share(&self, period: usize) -> Result<Dimensionless> {
        Ok(self.period_state(period)?.share)
    }

    /// Override the subsector's share of sector output
    pub fn set_share(&mut self, share: Dimensionless, period: usize) -> Result<()> {
        self.period_state_mut(period)?.share = share;
        Ok(())
    }

    /// The capacity limit for the period
    pub fn get_capacity_limit(&self, period: usize) -> Result<Dimensionless> {
        Ok(self.period_state(period)?.capacity_limit)
    }

    /// Whether the subsector is capacity limited in the period
    pub fn get_cap_limit_status(&self, period: usize) -> Result<bool> {
        Ok(self.period_state(period)?.cap_limited)
    }

    /// Set whether the subsector is capacity limited in the period
    pub fn set_cap_limit_status(&mut self, value: bool, period: usize) -> Result<()> {
        self.period_state_mut(period)?.cap_limited = value;
        Ok(())
    }
}
