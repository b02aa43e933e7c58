//! Distribution of subsector output among technologies.
use super::Subsector;
use crate::commodity::CommodityID;
use crate::period::{PeriodStage, PeriodState};
use crate::technology::Technology;
use crate::units::{Dimensionless, Energy};
use anyhow::Result;
use log::{debug, warn};

/// Calculate each technology's share of subsector output.
///
/// Flexible technologies (those without a fixed output) share by logit. If no flexible
/// technology has a positive logit weight, flexible technologies share equally. Fixed
/// technologies take no logit share, unless every technology is fixed, in which case shares are
/// proportional to fixed output.
pub(super) fn calc_tech_shares(technologies: &mut [Technology]) {
    let num_flexible = technologies
        .iter()
        .filter(|tech| !tech.is_output_fixed())
        .count();

    if num_flexible == 0 {
        let total_fixed: Energy = technologies.iter().map(|tech| tech.fixed_output()).sum();
        let num_technologies = technologies.len() as f64;
        for technology in technologies.iter_mut() {
            let share = if total_fixed.value() > 0.0 {
                technology.fixed_output() / total_fixed
            } else {
                Dimensionless(1.0 / num_technologies)
            };
            technology.set_share(share);
        }
        return;
    }

    let total: f64 = technologies.iter().map(Technology::logit_weight).sum();
    for technology in technologies.iter_mut() {
        let share = if technology.is_output_fixed() {
            0.0
        } else if total > 0.0 {
            technology.logit_weight() / total
        } else {
            1.0 / num_flexible as f64
        };
        technology.set_share(Dimensionless(share));
    }
}

impl Subsector {
    /// Calculate each technology's share of subsector output from current costs
    pub fn calc_tech_shares(&mut self, period: usize) -> Result<()> {
        let state = self.period_state_mut(period)?;
        state.stage.check_not_terminal("calculate technology shares")?;
        calc_tech_shares(&mut state.technologies);

        Ok(())
    }

    /// Adjust the subsector share to account for fixed supply in the sector.
    ///
    /// The new share is the subsector's own fixed supply as a proportion of demand plus its
    /// flexible share multiplied by `share_ratio`, which the sector chooses so that shares sum to
    /// one. The relative shares of flexible technologies are unchanged.
    ///
    /// # Arguments
    ///
    /// * `demand` - Total demand for the sector's output
    /// * `share_ratio` - Factor applied to the flexible part of the share
    /// * `total_fixed_supply` - Fixed supply of all subsectors in the sector
    /// * `period` - The period index
    pub fn adj_shares(
        &mut self,
        demand: Energy,
        share_ratio: Dimensionless,
        total_fixed_supply: Energy,
        period: usize,
    ) -> Result<()> {
        let fixed_supply = self.exog_supply(period)?;
        let all_fixed = self.all_output_fixed(period)?;
        let state = self.period_state_mut(period)?;
        state.stage.check(
            "adjust shares",
            &[PeriodStage::SharesComputed, PeriodStage::CapacityClipped],
        )?;

        if demand.value() <= 0.0 {
            state.share = Dimensionless(0.0);
            return Ok(());
        }
        if total_fixed_supply.value() <= 0.0 {
            return Ok(());
        }

        let flexible_share = if all_fixed {
            Dimensionless(0.0)
        } else {
            state.share * share_ratio
        };
        state.share = fixed_supply / demand + flexible_share;

        Ok(())
    }

    /// Allocate output to technologies.
    ///
    /// The subsector's output is its share of `demand`. Fixed outputs are served first (scaled
    /// down if they exceed the subsector output) and the remainder is divided among flexible
    /// technologies by share. Technology shares are then set to their share of actual output.
    ///
    /// # Arguments
    ///
    /// * `product` - The commodity produced by the sector
    /// * `demand` - Total demand for the sector's output
    /// * `period` - The period index
    pub fn set_output(
        &mut self,
        product: &CommodityID,
        demand: Energy,
        period: usize,
    ) -> Result<()> {
        let id = self.id.clone();
        let kind = self.kind;
        let state = self.period_state_mut(period)?;
        state.stage.check(
            "set output",
            &[
                PeriodStage::CapacityClipped,
                PeriodStage::CalibrationReconciled,
            ],
        )?;

        let subsector_demand = kind.output_for_service(demand * state.share);
        let total_fixed: Energy = state
            .technologies
            .iter()
            .map(|tech| tech.fixed_output())
            .sum();
        let fixed_scale = if total_fixed > subsector_demand && total_fixed.value() > 0.0 {
            warn!(
                "Fixed output of subsector {id} ({total_fixed}) exceeds its demand \
                ({subsector_demand}) in period {period}. Fixed output will be scaled down."
            );
            subsector_demand / total_fixed
        } else {
            Dimensionless(1.0)
        };

        let flexible_demand = (subsector_demand - total_fixed * fixed_scale).max(Energy(0.0));
        let has_flexible = state
            .technologies
            .iter()
            .any(|tech| !tech.is_output_fixed());
        if !has_flexible && flexible_demand.value() > 0.0 {
            warn!(
                "Subsector {id} has no flexible technologies to supply {flexible_demand} of \
                {product} in period {period}"
            );
        }

        for technology in &mut state.technologies {
            let output = if technology.is_output_fixed() {
                technology.fixed_output() * fixed_scale
            } else {
                flexible_demand * technology.share()
            };
            technology.production(output);
        }

        sum_output(state);
        state.stage = PeriodStage::TechAllocated;
        debug!(
            "Subsector {id} produces {} of {product} in period {period}",
            state.output
        );

        Ok(())
    }
}

/// Sum technology results into the subsector totals and set realised technology shares
fn sum_output(state: &mut PeriodState) {
    state.output = state.technologies.iter().map(Technology::output).sum();
    state.input = state.technologies.iter().map(Technology::input).sum();
    state.carbon_tax_paid = state
        .technologies
        .iter()
        .map(Technology::carbon_tax_paid)
        .sum();

    let total = state.output;
    if total.value() > 0.0 {
        for technology in &mut state.technologies {
            let share = technology.output() / total;
            technology.set_share(share);
        }
    }
}
