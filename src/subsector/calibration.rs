//! Calibration of share weights to historical outputs.
//!
//! In periods with calibration data, the sector repeatedly calls
//! [`Subsector::adjust_for_calibration`] and recalculates shares until the calculated outputs match
//! the calibration values. Share weights (not shares) are adjusted, so the calibrated weights carry
//! through to interpolation in later periods.
use super::Subsector;
use crate::period::PeriodStage;
use crate::units::{Dimensionless, Energy};
use anyhow::Result;
use log::{debug, warn};

impl Subsector {
    /// Whether the subsector is calibrated in the period
    pub fn get_calibration_status(&self, period: usize) -> Result<bool> {
        Ok(self.period_state(period)?.calibration_status)
    }

    /// Derive the calibration status for the period.
    ///
    /// The subsector is calibrated if it has its own calibration value or if every technology has
    /// either a calibration value or a fixed output (and at least one has a calibration value).
    /// Inconsistent data gives a warning and leaves the subsector uncalibrated.
    pub fn set_calibration_status(&mut self, period: usize) -> Result<()> {
        let id = self.id.clone();
        let state = self.period_state_mut(period)?;

        let num_calibrated = state
            .technologies
            .iter()
            .filter(|tech| tech.get_calibration_status())
            .count();
        let all_accounted = state
            .technologies
            .iter()
            .all(|tech| tech.get_calibration_status() || tech.is_output_fixed());

        state.calibration_status = if state.do_calibration {
            if state.calibration_output.is_none() {
                warn!(
                    "Subsector {id} is marked for calibration in period {period} but has no \
                    calibration value. Calibration will be skipped."
                );
                false
            } else {
                true
            }
        } else if num_calibrated > 0 && all_accounted {
            true
        } else {
            if num_calibrated > 0 {
                warn!(
                    "Only some technologies in subsector {id} have calibration values in period \
                    {period}. Calibration will be skipped."
                );
            }
            false
        };

        Ok(())
    }

    /// Scale the calibration values for the subsector and its technologies
    pub fn scale_calibration_input(
        &mut self,
        period: usize,
        scale_factor: Dimensionless,
    ) -> Result<()> {
        let state = self.period_state_mut(period)?;
        if let Some(value) = state.calibration_output.as_mut() {
            *value = *value * scale_factor;
        }
        for technology in &mut state.technologies {
            technology.scale_calibration_input(scale_factor);
        }

        Ok(())
    }

    /// The calibrated output of the subsector, measured in the units of sector demand.
    ///
    /// This is the subsector's own calibration value if it has one, otherwise the sum of its
    /// technologies' calibration values. Technologies with fixed output are left out, as their
    /// output is already counted as fixed supply.
    pub fn get_total_cal_outputs(&self, period: usize) -> Result<Energy> {
        let state = self.period_state(period)?;
        if state.do_calibration
            && let Some(value) = state.calibration_output
        {
            return Ok(value);
        }

        // Technology values are in units of subsector output
        let tech_total: Energy = state
            .technologies
            .iter()
            .filter(|tech| !tech.is_output_fixed())
            .filter_map(|tech| tech.calibration_output)
            .sum();
        Ok(self.kind.service_for_output(tech_total))
    }

    /// The total output the subsector should produce when calibrated, including fixed output
    fn calibration_target(&self, period: usize) -> Result<Energy> {
        let state = self.period_state(period)?;
        let total = self.get_total_cal_outputs(period)?;
        if state.do_calibration && state.calibration_output.is_some() {
            Ok(total)
        } else {
            Ok(total + self.exog_supply(period)?)
        }
    }

    /// Adjust share weights so that the next share calculation reproduces the calibration data.
    ///
    /// # Arguments
    ///
    /// * `sector_demand` - Total demand for the sector's output
    /// * `total_fixed_supply` - Fixed supply of all subsectors in the sector
    /// * `total_cal_outputs` - Calibrated outputs of all calibrated subsectors in the sector
    /// * `period` - The period index
    pub fn adjust_for_calibration(
        &mut self,
        sector_demand: Energy,
        total_fixed_supply: Energy,
        total_cal_outputs: Energy,
        period: usize,
    ) -> Result<()> {
        let id = self.id.clone();
        let kind = self.kind;
        let calibrated = self.get_calibration_status(period)?;
        let mut target = self.calibration_target(period)?;
        let fixed_supply = self.get_fixed_supply(period)?;
        let state = self.period_state_mut(period)?;
        state.stage.check(
            "adjust for calibration",
            &[
                PeriodStage::CapacityClipped,
                PeriodStage::CalibrationReconciled,
            ],
        )?;
        if !calibrated {
            return Ok(());
        }
        state.stage = PeriodStage::CalibrationReconciled;

        let available = (sector_demand - total_fixed_supply).max(Energy(0.0));
        if total_cal_outputs > available && total_cal_outputs.value() > 0.0 {
            warn!(
                "Calibrated outputs ({total_cal_outputs}) exceed demand available to calibrated \
                subsectors ({available}) in period {period}. Calibration value for subsector {id} \
                will be scaled down."
            );
            target = target * (available / total_cal_outputs);
        }

        if state.share_weight.value() == 0.0 && target.value() > 0.0 {
            state.share_weight = Dimensionless(1.0);
        }
        let current_output = sector_demand * state.share;
        if current_output.value() > 0.0 {
            state.share_weight *= target / current_output;
        }
        debug!(
            "Calibrating subsector {id} in period {period}: output {current_output}, target \
            {target}, share weight now {}",
            state.share_weight
        );

        let flexible_demand = (kind.output_for_service(target) - fixed_supply).max(Energy(0.0));
        for technology in &mut state.technologies {
            technology.adjust_for_calibration(flexible_demand);
        }

        self.share_weight_scale(period)
    }

    /// Whether the calculated outputs match the calibration data to within `tolerance`.
    ///
    /// Uncalibrated subsectors are always considered converged.
    pub fn calibration_converged(
        &self,
        sector_demand: Energy,
        tolerance: f64,
        period: usize,
    ) -> Result<bool> {
        if !self.get_calibration_status(period)? {
            return Ok(true);
        }

        let within_tolerance = |actual: Energy, target: Energy| {
            (actual - target).abs().value() <= tolerance * target.value().abs().max(f64::EPSILON)
        };

        let state = self.period_state(period)?;
        let target = self.calibration_target(period)?;
        let output = sector_demand * state.share;
        if !within_tolerance(output, target) {
            return Ok(false);
        }

        let fixed_supply = self.get_fixed_supply(period)?;
        let flexible_demand =
            (self.kind.output_for_service(output) - fixed_supply).max(Energy(0.0));
        Ok(state.technologies.iter().all(|tech| {
            tech.calibration_output.is_none_or(|target| {
                tech.is_output_fixed() || within_tolerance(flexible_demand * tech.share(), target)
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commodity::CommodityPrices;
    use crate::fixture::{fuel_prices, subsector};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Move the period into a stage in which calibration can be applied
    fn prepare(subsector: &mut Subsector, fuel_prices: &CommodityPrices, share: Dimensionless) {
        subsector.init_calc(0).unwrap();
        subsector.calc_price(0, fuel_prices).unwrap();
        subsector.calc_share(0, Dimensionless(1.0)).unwrap();
        subsector.set_share(share, 0).unwrap();
        subsector.limit_shares(Dimensionless(1.0), 0).unwrap();
    }

    #[rstest]
    fn test_set_calibration_status_subsector(mut subsector: Subsector) {
        {
            let state = subsector.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(10.0));
        }
        subsector.set_calibration_status(0).unwrap();
        assert!(subsector.get_calibration_status(0).unwrap());
    }

    #[rstest]
    fn test_set_calibration_status_missing_value(mut subsector: Subsector) {
        subsector.period_state_mut(0).unwrap().do_calibration = true;
        subsector.set_calibration_status(0).unwrap();
        assert!(!subsector.get_calibration_status(0).unwrap());
    }

    #[rstest]
    fn test_set_calibration_status_technologies(mut subsector: Subsector) {
        // Only one technology calibrated
        subsector.period_state_mut(0).unwrap().technologies[0].calibration_output =
            Some(Energy(1.0));
        subsector.set_calibration_status(0).unwrap();
        assert!(!subsector.get_calibration_status(0).unwrap());

        // Both calibrated
        subsector.period_state_mut(0).unwrap().technologies[1].calibration_output =
            Some(Energy(2.0));
        subsector.set_calibration_status(0).unwrap();
        assert!(subsector.get_calibration_status(0).unwrap());
        assert_eq!(subsector.get_total_cal_outputs(0).unwrap(), Energy(3.0));
    }

    #[rstest]
    fn test_calibration_with_fixed_technology(
        mut subsector: Subsector,
        fuel_prices: CommodityPrices,
    ) {
        {
            let technologies = &mut subsector.period_state_mut(0).unwrap().technologies;
            technologies[0] = technologies[0].clone().with_fixed_output(Energy(10.0));
            technologies[0].calibration_output = Some(Energy(10.0));
            technologies[1].calibration_output = Some(Energy(20.0));
        }
        subsector.set_calibration_status(0).unwrap();
        assert!(subsector.get_calibration_status(0).unwrap());
        assert_eq!(subsector.get_total_cal_outputs(0).unwrap(), Energy(20.0));

        // Target is 20 calibrated plus 10 fixed, against an output of 50
        prepare(&mut subsector, &fuel_prices, Dimensionless(0.5));
        subsector
            .adjust_for_calibration(Energy(100.0), Energy(10.0), Energy(20.0), 0)
            .unwrap();
        assert_approx_eq!(
            Dimensionless,
            subsector.get_share_weight(0).unwrap(),
            Dimensionless(0.6)
        );
    }

    #[rstest]
    fn test_scale_calibration_input(mut subsector: Subsector) {
        {
            let state = subsector.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(10.0));
            state.technologies[0].calibration_output = Some(Energy(4.0));
        }
        subsector
            .scale_calibration_input(0, Dimensionless(0.5))
            .unwrap();
        assert_eq!(subsector.get_total_cal_outputs(0).unwrap(), Energy(5.0));
        assert_eq!(
            subsector.technologies(0).unwrap()[0].calibration_output,
            Some(Energy(2.0))
        );
    }

    #[rstest]
    fn test_adjust_for_calibration(mut subsector: Subsector, fuel_prices: CommodityPrices) {
        {
            let state = subsector.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(30.0));
        }
        prepare(&mut subsector, &fuel_prices, Dimensionless(0.5));

        // Output is 50, target is 30
        subsector
            .adjust_for_calibration(Energy(100.0), Energy(0.0), Energy(30.0), 0)
            .unwrap();
        assert_approx_eq!(
            Dimensionless,
            subsector.get_share_weight(0).unwrap(),
            Dimensionless(0.6)
        );
        assert_eq!(
            subsector.stage(0).unwrap(),
            PeriodStage::CalibrationReconciled
        );
    }

    #[rstest]
    fn test_adjust_for_calibration_scaled_target(
        mut subsector: Subsector,
        fuel_prices: CommodityPrices,
    ) {
        {
            let state = subsector.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(80.0));
        }
        prepare(&mut subsector, &fuel_prices, Dimensionless(0.5));

        // Only 40 is available after fixed supply, so the target is scaled to 40
        subsector
            .adjust_for_calibration(Energy(100.0), Energy(60.0), Energy(80.0), 0)
            .unwrap();
        assert_approx_eq!(
            Dimensionless,
            subsector.get_share_weight(0).unwrap(),
            Dimensionless(0.8)
        );
    }

    #[rstest]
    fn test_adjust_for_calibration_zero_weight(
        mut subsector: Subsector,
        fuel_prices: CommodityPrices,
    ) {
        {
            let state = subsector.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(30.0));
            state.share_weight = Dimensionless(0.0);
        }
        prepare(&mut subsector, &fuel_prices, Dimensionless(0.0));
        subsector
            .adjust_for_calibration(Energy(100.0), Energy(0.0), Energy(30.0), 0)
            .unwrap();
        assert_eq!(subsector.get_share_weight(0).unwrap(), Dimensionless(1.0));
    }

    #[rstest]
    fn test_adjust_for_calibration_uncalibrated(
        mut subsector: Subsector,
        fuel_prices: CommodityPrices,
    ) {
        prepare(&mut subsector, &fuel_prices, Dimensionless(0.5));
        subsector
            .adjust_for_calibration(Energy(100.0), Energy(0.0), Energy(0.0), 0)
            .unwrap();
        assert_eq!(subsector.get_share_weight(0).unwrap(), Dimensionless(1.0));
        assert_eq!(subsector.stage(0).unwrap(), PeriodStage::CapacityClipped);
    }

    #[rstest]
    fn test_adjust_for_calibration_technologies(
        mut subsector: Subsector,
        fuel_prices: CommodityPrices,
    ) {
        {
            let technologies = &mut subsector.period_state_mut(0).unwrap().technologies;
            technologies[0].calibration_output = Some(Energy(15.0));
            technologies[1].calibration_output = Some(Energy(5.0));
        }
        prepare(&mut subsector, &fuel_prices, Dimensionless(0.5));
        subsector
            .adjust_for_calibration(Energy(100.0), Energy(0.0), Energy(20.0), 0)
            .unwrap();

        // Technologies share equally, so weights move to 3:1, then are scaled to a mean of 1
        let technologies = subsector.technologies(0).unwrap();
        assert_approx_eq!(
            Dimensionless,
            technologies[0].share_weight,
            Dimensionless(1.5)
        );
        assert_approx_eq!(
            Dimensionless,
            technologies[1].share_weight,
            Dimensionless(0.5)
        );
    }

    #[rstest]
    fn test_calibration_converges(mut subsector: Subsector, fuel_prices: CommodityPrices) {
        // A calibrated subsector competing against a fixed rest-of-sector raw share
        {
            let state = subsector.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(40.0));
        }
        let demand = Energy(100.0);
        let other_raw_share = Dimensionless(0.01);

        subsector.init_calc(0).unwrap();
        let mut converged = false;
        for _ in 0..100 {
            subsector.calc_price(0, &fuel_prices).unwrap();
            subsector.calc_share(0, Dimensionless(1.0)).unwrap();
            let sum = subsector.get_raw_share(0).unwrap() + other_raw_share;
            subsector.norm_share(sum, 0).unwrap();
            subsector.limit_shares(Dimensionless(1.0), 0).unwrap();
            if subsector.calibration_converged(demand, 1e-3, 0).unwrap() {
                converged = true;
                break;
            }
            subsector
                .adjust_for_calibration(demand, Energy(0.0), Energy(40.0), 0)
                .unwrap();
        }

        assert!(converged);
        let output = demand * subsector.get_share(0).unwrap();
        assert_approx_eq!(Energy, output, Energy(40.0), epsilon = 0.04);
    }
}
