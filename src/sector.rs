//! A sector is a group of subsectors competing to meet a single demand.
//!
//! The sector drives each subsector through the stages of a period in order, reconciling shares
//! across subsectors so that they sum to one, respecting capacity limits and fixed supply, and
//! iterating share weights until calibrated outputs are reproduced.
use crate::commodity::{CommodityID, CommodityPrices, GasTaxes};
use crate::id::define_id_type;
use crate::model::ModelParameters;
use crate::subsector::emissions::IndirectEmissionCoefficient;
use crate::subsector::Subsector;
use crate::units::{Dimensionless, Energy};
use anyhow::{Result, ensure};
use indexmap::IndexSet;
use itertools::Itertools;
use log::{debug, info, warn};

define_id_type! {RegionID}
define_id_type! {SectorID}

/// Exogenous inputs to the sector for a single period
#[derive(Debug, Clone, Copy)]
pub struct PeriodInputs<'a> {
    /// Total demand for the sector's output
    pub demand: Energy,
    /// Prices of the fuels consumed by technologies
    pub fuel_prices: &'a CommodityPrices,
    /// Taxes on greenhouse gas emissions
    pub ghg_taxes: &'a GasTaxes,
    /// Ratio of GNP per capita to its base year value
    pub gnp_per_capita_scaler: Dimensionless,
    /// Coefficients for indirect emissions of fuels
    pub indirect_coefficients: &'a [IndirectEmissionCoefficient],
}

/// Options controlling how the sector is solved
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    /// The commodity produced by the sector
    pub product: CommodityID,
    /// Fuels which count towards primary energy consumption
    pub primary_fuels: Vec<CommodityID>,
    /// The maximum number of share/calibration passes for a period
    pub max_calibration_iterations: u32,
    /// The relative tolerance within which calibrated outputs are considered converged
    pub calibration_tolerance: f64,
    /// The maximum number of passes used to resolve capacity limits
    pub max_capacity_limit_iterations: u32,
}

impl From<&ModelParameters> for SolverOptions {
    fn from(parameters: &ModelParameters) -> Self {
        Self {
            product: CommodityID::new(&parameters.product),
            primary_fuels: parameters.primary_fuels.clone(),
            max_calibration_iterations: parameters.max_calibration_iterations,
            calibration_tolerance: parameters.calibration_tolerance,
            max_capacity_limit_iterations: parameters.max_capacity_limit_iterations,
        }
    }
}

/// Information about how a period was solved
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodSolution {
    /// Whether any subsector was calibrated in the period
    pub calibrated: bool,
    /// Whether calibrated outputs matched the calibration data
    pub converged: bool,
    /// The number of share/calibration passes performed
    pub iterations: u32,
}

/// A sector in a single region
#[derive(Debug, Clone, PartialEq)]
pub struct Sector {
    /// Sector name (e.g. "electricity")
    pub id: SectorID,
    /// The region the sector belongs to
    pub region_id: RegionID,
    subsectors: Vec<Subsector>,
}

impl Sector {
    /// Create a new sector.
    ///
    /// The subsectors must already have been initialised with [`Subsector::complete_init`], must
    /// have unique IDs and must all have the same number of periods.
    pub fn new(id: SectorID, region_id: RegionID, subsectors: Vec<Subsector>) -> Result<Self> {
        ensure!(!subsectors.is_empty(), "Sector {id} has no subsectors");

        let mut ids = IndexSet::new();
        for subsector in &subsectors {
            ensure!(
                ids.insert(subsector.id.clone()),
                "Duplicate subsector ID {} in sector {id}",
                subsector.id
            );
        }

        let num_periods = subsectors[0].num_periods();
        ensure!(
            subsectors
                .iter()
                .all(|subsector| subsector.num_periods() == num_periods),
            "All subsectors in sector {id} must have the same number of periods"
        );

        Ok(Self {
            id,
            region_id,
            subsectors,
        })
    }

    /// The number of periods
    pub fn num_periods(&self) -> usize {
        self.subsectors[0].num_periods()
    }

    /// Iterate over the subsectors
    pub fn iter_subsectors(&self) -> impl Iterator<Item = &Subsector> {
        self.subsectors.iter()
    }

    /// Get a subsector by ID
    pub fn subsector(&self, id: &str) -> Option<&Subsector> {
        self.subsectors
            .iter()
            .find(|subsector| subsector.id.0.as_ref() == id)
    }

    /// Sum a per-subsector quantity over all subsectors
    fn sum_over<T, F>(&self, mut f: F) -> Result<T>
    where
        T: std::iter::Sum<T>,
        F: FnMut(&Subsector) -> Result<T>,
    {
        self.subsectors.iter().map(&mut f).sum()
    }

    /// Solve a single period.
    ///
    /// Every subsector ends the period with its share of `demand` allocated to technologies and
    /// its emissions and summary calculated.
    pub fn solve_period(
        &mut self,
        period: usize,
        inputs: &PeriodInputs,
        options: &SolverOptions,
    ) -> Result<PeriodSolution> {
        ensure!(
            inputs.demand.is_finite() && inputs.demand.value() >= 0.0,
            "Demand for sector {} in period {period} must be a finite number >= 0 (got {})",
            self.id,
            inputs.demand
        );

        for subsector in &mut self.subsectors {
            subsector.init_calc(period)?;
            for (gas, tax) in inputs.ghg_taxes {
                subsector.add_ghg_tax(gas, *tax, period)?;
            }
            subsector.reset_fixed_supply(period)?;
        }

        let total_fixed = self.reconcile_fixed_supply(period, inputs.demand)?;
        let calibrated = self
            .subsectors
            .iter()
            .map(|subsector| subsector.get_calibration_status(period))
            .process_results(|mut iter| iter.any(|calibrated| calibrated))?;

        let mut converged = !calibrated;
        let mut iterations = 0;
        for iteration in 0..options.max_calibration_iterations {
            iterations = iteration + 1;
            self.calc_shares(period, inputs)?;
            self.resolve_capacity_limits(period, options.max_capacity_limit_iterations)?;
            self.adjust_for_fixed_supply(period, inputs.demand, total_fixed)?;

            if !calibrated {
                break;
            }

            converged = self
                .subsectors
                .iter()
                .map(|subsector| {
                    subsector.calibration_converged(
                        inputs.demand,
                        options.calibration_tolerance,
                        period,
                    )
                })
                .process_results(|mut iter| iter.all(|converged| converged))?;
            if converged || iterations == options.max_calibration_iterations {
                break;
            }

            let total_cal: Energy = self.sum_over(|subsector| {
                if subsector.get_calibration_status(period)? {
                    subsector.get_total_cal_outputs(period)
                } else {
                    Ok(Energy(0.0))
                }
            })?;
            for subsector in &mut self.subsectors {
                subsector.adjust_for_calibration(inputs.demand, total_fixed, total_cal, period)?;
            }
        }

        if calibrated {
            if converged {
                debug!(
                    "Calibration of sector {} converged in period {period} after {iterations} \
                    iterations",
                    self.id
                );
            } else {
                warn!(
                    "Calibration of sector {} did not converge in period {period} after \
                    {iterations} iterations",
                    self.id
                );
            }
        }

        for subsector in &mut self.subsectors {
            subsector.set_output(&options.product, inputs.demand, period)?;
            subsector.emission(period, &options.product)?;
            subsector.indemission(period, inputs.indirect_coefficients)?;
            subsector.update_summary(period, &options.primary_fuels)?;
        }

        let total_share: Dimensionless = self.sum_over(|subsector| subsector.get_share(period))?;
        info!(
            "Solved sector {} in period {period}: total share {total_share}",
            self.id
        );

        Ok(PeriodSolution {
            calibrated,
            converged,
            iterations,
        })
    }

    /// Scale fixed supply down if it exceeds demand and set the shares of subsectors whose output
    /// is entirely fixed.
    ///
    /// Returns the total fixed supply after scaling.
    fn reconcile_fixed_supply(&mut self, period: usize, demand: Energy) -> Result<Energy> {
        let mut total_fixed: Energy = self.sum_over(|subsector| subsector.exog_supply(period))?;
        if total_fixed > demand && total_fixed.value() > 0.0 {
            warn!(
                "Fixed supply ({total_fixed}) exceeds demand ({demand}) for sector {} in period \
                {period}. Fixed supply will be scaled down.",
                self.id
            );
            let ratio = demand / total_fixed;
            for subsector in &mut self.subsectors {
                subsector.scale_fixed_supply(ratio, period)?;
            }
            total_fixed = demand;
        }

        for subsector in &mut self.subsectors {
            if subsector.all_output_fixed(period)? {
                let share = if demand.value() > 0.0 {
                    (subsector.exog_supply(period)? / demand).min(Dimensionless(1.0))
                } else {
                    Dimensionless(0.0)
                };
                subsector.set_fixed_share(period, share)?;
            }
        }

        Ok(total_fixed)
    }

    /// Calculate prices and normalised logit shares for all subsectors
    fn calc_shares(&mut self, period: usize, inputs: &PeriodInputs) -> Result<()> {
        for subsector in &mut self.subsectors {
            subsector.set_cap_limit_status(false, period)?;
            subsector.calc_price(period, inputs.fuel_prices)?;
            subsector.calc_share(period, inputs.gnp_per_capita_scaler)?;
        }

        let sum: Dimensionless = self.sum_over(|subsector| subsector.get_raw_share(period))?;
        if sum.value() > 0.0 {
            for subsector in &mut self.subsectors {
                subsector.norm_share(sum, period)?;
            }
        }

        Ok(())
    }

    /// Bound shares by capacity limits, redistributing the excess to unlimited subsectors
    fn resolve_capacity_limits(&mut self, period: usize, max_iterations: u32) -> Result<()> {
        let count_limited = |sector: &Self| -> Result<usize> {
            sector.sum_over(|subsector| Ok(usize::from(subsector.get_cap_limit_status(period)?)))
        };

        let mut num_limited = count_limited(self)?;
        for _ in 0..max_iterations {
            let mut limited_total = Dimensionless(0.0);
            let mut free_total = Dimensionless(0.0);
            for subsector in &self.subsectors {
                let share = subsector.get_share(period)?;
                if subsector.get_cap_limit_status(period)? {
                    limited_total += share;
                } else {
                    free_total += share;
                }
            }

            let multiplier = if free_total.value() > 0.0 {
                ((Dimensionless(1.0) - limited_total) / free_total).max(Dimensionless(0.0))
            } else {
                if limited_total.value() > 0.0 {
                    warn!(
                        "All subsectors in sector {} are capacity limited in period {period}. \
                        Shares will not sum to one.",
                        self.id
                    );
                }
                Dimensionless(1.0)
            };

            for subsector in &mut self.subsectors {
                subsector.limit_shares(multiplier, period)?;
            }

            let new_num_limited = count_limited(self)?;
            let any_exceeded = self
                .subsectors
                .iter()
                .map(|subsector| subsector.exceeds_capacity_limit(period))
                .process_results(|mut iter| iter.any(|exceeded| exceeded))?;
            if new_num_limited == num_limited && !any_exceeded {
                return Ok(());
            }
            num_limited = new_num_limited;
        }

        warn!(
            "Capacity limits for sector {} were not resolved in period {period} after \
            {max_iterations} passes",
            self.id
        );

        Ok(())
    }

    /// Make room for fixed supply by scaling down the shares of subsectors with flexible output
    fn adjust_for_fixed_supply(
        &mut self,
        period: usize,
        demand: Energy,
        total_fixed: Energy,
    ) -> Result<()> {
        if total_fixed.value() <= 0.0 {
            return Ok(());
        }

        let flexible_total: Dimensionless = self.sum_over(|subsector| {
            if subsector.all_output_fixed(period)? {
                Ok(Dimensionless(0.0))
            } else {
                subsector.get_share(period)
            }
        })?;
        let share_ratio = if flexible_total.value() > 0.0 && demand.value() > 0.0 {
            (Dimensionless(1.0) - total_fixed / demand).max(Dimensionless(0.0)) / flexible_total
        } else {
            Dimensionless(0.0)
        };

        for subsector in &mut self.subsectors {
            subsector.adj_shares(demand, share_ratio, total_fixed, period)?;
            if subsector.all_output_fixed(period)? {
                subsector.set_share_to_fixed_value(period)?;
            }
        }

        Ok(())
    }

    /// Carry calibrated share weights forward into later periods.
    ///
    /// If a subsector is calibrated in `period` but not in the following period, its share weights
    /// are interpolated towards the next period with share weights given in the input data. If
    /// there is no such period, the weights are held constant for the rest of the run.
    pub fn interpolate_after_calibration(&mut self, period: usize) -> Result<()> {
        let next = period + 1;
        if next >= self.num_periods() {
            return Ok(());
        }

        for subsector in &mut self.subsectors {
            subsector.set_calibration_status(next)?;
            if !subsector.get_calibration_status(period)?
                || subsector.get_calibration_status(next)?
            {
                continue;
            }

            let mut anchor = None;
            for candidate in next..subsector.num_periods() {
                if subsector.is_share_weight_from_input(candidate)? {
                    anchor = Some(candidate);
                    break;
                }
            }

            match anchor {
                Some(anchor) => subsector.share_weight_interp(period, anchor)?,
                None => subsector.hold_share_weights(period)?,
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commodity::{CO2, GasID};
    use crate::fixture::{
        assert_error, build_subsector, demand, fuel_prices, gas_subsector, options, sector,
        subsector, technology,
    };
    use crate::period::PeriodStage;
    use crate::technology::Technology;
    use crate::units::{Emissions, MoneyPerEmissions, MoneyPerEnergy};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Solve a period with no taxes or indirect emissions
    fn solve(
        sector: &mut Sector,
        period: usize,
        demand: Energy,
        fuel_prices: &CommodityPrices,
        options: &SolverOptions,
    ) -> PeriodSolution {
        let ghg_taxes = GasTaxes::new();
        let inputs = PeriodInputs {
            demand,
            fuel_prices,
            ghg_taxes: &ghg_taxes,
            gnp_per_capita_scaler: Dimensionless(1.0),
            indirect_coefficients: &[],
        };
        sector.solve_period(period, &inputs, options).unwrap()
    }

    fn share(sector: &Sector, id: &str, period: usize) -> Dimensionless {
        sector.subsector(id).unwrap().get_share(period).unwrap()
    }

    fn total_share(sector: &Sector, period: usize) -> Dimensionless {
        sector
            .iter_subsectors()
            .map(|subsector| subsector.get_share(period).unwrap())
            .sum()
    }

    #[rstest]
    fn test_new_empty() {
        assert_error!(
            Sector::new("electricity".into(), "USA".into(), Vec::new()),
            "Sector electricity has no subsectors"
        );
    }

    #[rstest]
    fn test_new_duplicate_subsector(subsector: Subsector) {
        assert_error!(
            Sector::new(
                "electricity".into(),
                "USA".into(),
                vec![subsector.clone(), subsector]
            ),
            "Duplicate subsector ID coal in sector electricity"
        );
    }

    #[rstest]
    fn test_new_mismatched_periods(subsector: Subsector, technology: Technology) {
        let other = build_subsector("other", vec![technology], 3);
        assert_error!(
            Sector::new("electricity".into(), "USA".into(), vec![subsector, other]),
            "All subsectors in sector electricity must have the same number of periods"
        );
    }

    #[rstest]
    fn test_solve_period_equal_costs(
        mut sector: Sector,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        let solution = solve(&mut sector, 0, demand, &fuel_prices, &options);
        assert!(!solution.calibrated);
        assert_eq!(solution.iterations, 1);

        assert_approx_eq!(Dimensionless, share(&sector, "coal", 0), Dimensionless(0.5));
        assert_approx_eq!(Dimensionless, share(&sector, "gas", 0), Dimensionless(0.5));
        for subsector in sector.iter_subsectors() {
            assert_approx_eq!(Energy, subsector.get_output(0).unwrap(), Energy(50.0));
            assert_eq!(subsector.stage(0).unwrap(), PeriodStage::SummaryUpdated);

            let tech_total: Dimensionless = subsector
                .technologies(0)
                .unwrap()
                .iter()
                .map(Technology::share)
                .sum();
            assert_approx_eq!(Dimensionless, tech_total, Dimensionless(1.0));
        }

        // Coal: 50 output at efficiency 0.5 => 100 input, CO2 coefficient 2
        let coal = sector.subsector("coal").unwrap();
        assert_approx_eq!(Emissions, coal.show_co2(0).unwrap(), Emissions(200.0));
        assert_approx_eq!(Energy, coal.get_pe_cons(0).unwrap(), Energy(100.0));
    }

    #[rstest]
    fn test_solve_period_cheaper_subsector_wins(
        mut subsector: Subsector,
        mut gas_subsector: Subsector,
        demand: Energy,
        options: SolverOptions,
    ) {
        subsector.period_state_mut(0).unwrap().logit_exponent = -2.0;
        gas_subsector.period_state_mut(0).unwrap().logit_exponent = -2.0;
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![subsector, gas_subsector])
                .unwrap();
        let fuel_prices: CommodityPrices = [
            ("coal".into(), MoneyPerEnergy(2.0)),
            ("gas".into(), MoneyPerEnergy(1.0)),
        ]
        .into_iter()
        .collect();
        solve(&mut sector, 0, demand, &fuel_prices, &options);

        // Costs are 5 and 3, so shares are proportional to 5^-2 and 3^-2
        let expected = 9.0 / (9.0 + 25.0);
        assert_approx_eq!(
            Dimensionless,
            share(&sector, "coal", 0),
            Dimensionless(expected)
        );
        assert_approx_eq!(Dimensionless, total_share(&sector, 0), Dimensionless(1.0));
    }

    #[rstest]
    fn test_solve_period_fixed_share(
        subsector: Subsector,
        gas_subsector: Subsector,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        let mut gas_subsector = gas_subsector;
        {
            let technologies = &mut gas_subsector.period_state_mut(0).unwrap().technologies;
            technologies[0] = technologies[0].clone().with_fixed_output(Energy(30.0));
        }
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![subsector, gas_subsector])
                .unwrap();

        solve(&mut sector, 0, demand, &fuel_prices, &options);
        assert_approx_eq!(Dimensionless, share(&sector, "gas", 0), Dimensionless(0.3));
        assert_approx_eq!(Dimensionless, share(&sector, "coal", 0), Dimensionless(0.7));
        let gas = sector.subsector("gas").unwrap();
        assert_approx_eq!(Energy, gas.get_output(0).unwrap(), Energy(30.0));
        assert_approx_eq!(Dimensionless, gas.get_fixed_share(0).unwrap(), Dimensionless(0.3));
    }

    #[rstest]
    fn test_solve_period_fixed_supply_exceeds_demand(
        subsector: Subsector,
        gas_subsector: Subsector,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        let mut gas_subsector = gas_subsector;
        {
            let technologies = &mut gas_subsector.period_state_mut(0).unwrap().technologies;
            technologies[0] = technologies[0].clone().with_fixed_output(Energy(150.0));
        }
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![subsector, gas_subsector])
                .unwrap();

        solve(&mut sector, 0, Energy(100.0), &fuel_prices, &options);
        assert_approx_eq!(Dimensionless, share(&sector, "gas", 0), Dimensionless(1.0));
        assert_approx_eq!(Dimensionless, share(&sector, "coal", 0), Dimensionless(0.0));
        let gas = sector.subsector("gas").unwrap();
        assert_approx_eq!(Energy, gas.get_output(0).unwrap(), Energy(100.0));
    }

    #[rstest]
    fn test_solve_period_capacity_limit(
        mut subsector: Subsector,
        gas_subsector: Subsector,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        subsector.period_state_mut(0).unwrap().capacity_limit = Dimensionless(0.4);
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![subsector, gas_subsector])
                .unwrap();
        solve(&mut sector, 0, demand, &fuel_prices, &options);

        // The unlimited share of 0.5 is above the knee of the limit (0.2)
        let limited = 0.4 - 0.2 * (-0.3f64 / 0.2).exp();
        let coal = sector.subsector("coal").unwrap();
        assert!(coal.get_cap_limit_status(0).unwrap());
        assert_approx_eq!(Dimensionless, share(&sector, "coal", 0), Dimensionless(limited));
        assert_approx_eq!(
            Dimensionless,
            share(&sector, "gas", 0),
            Dimensionless(1.0 - limited)
        );
        assert!(share(&sector, "coal", 0).value() <= 0.4);
    }

    #[rstest]
    fn test_solve_period_capacity_limits_redistribute(
        technology: Technology,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        // With a logit exponent of 0, raw shares equal share weights
        let subsectors = [("a", 0.8, 0.1), ("b", 0.09, 0.2), ("c", 0.11, 1.0)]
            .into_iter()
            .map(|(id, share_weight, capacity_limit)| {
                let mut subsector = build_subsector(id, vec![technology.clone()], 1);
                let state = subsector.period_state_mut(0).unwrap();
                state.logit_exponent = 0.0;
                state.share_weight = Dimensionless(share_weight);
                state.capacity_limit = Dimensionless(capacity_limit);
                subsector
            })
            .collect();
        let mut sector = Sector::new("electricity".into(), "USA".into(), subsectors).unwrap();
        solve(&mut sector, 0, demand, &fuel_prices, &options);

        // Scaling up "b" after "a" is clipped takes it past its own limit, so it is clipped too
        for subsector in sector.iter_subsectors() {
            assert!(
                subsector.get_share(0).unwrap() <= subsector.get_capacity_limit(0).unwrap(),
                "{} exceeds its capacity limit",
                subsector.id
            );
        }
        assert!(sector.subsector("a").unwrap().get_cap_limit_status(0).unwrap());
        assert!(sector.subsector("b").unwrap().get_cap_limit_status(0).unwrap());
        assert!(!sector.subsector("c").unwrap().get_cap_limit_status(0).unwrap());
        assert!(share(&sector, "c", 0).value() > 0.7);
        assert_approx_eq!(Dimensionless, total_share(&sector, 0), Dimensionless(1.0));
    }

    #[rstest]
    fn test_solve_period_default_logit_exponent(
        subsector: Subsector,
        gas_subsector: Subsector,
        demand: Energy,
        options: SolverOptions,
    ) {
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![subsector, gas_subsector])
                .unwrap();
        let fuel_prices: CommodityPrices = [
            ("coal".into(), MoneyPerEnergy(2.0)),
            ("gas".into(), MoneyPerEnergy(1.0)),
        ]
        .into_iter()
        .collect();
        solve(&mut sector, 0, demand, &fuel_prices, &options);

        // Costs are 5 and 3, with the default exponent of -3
        let expected = 27.0 / (27.0 + 125.0);
        assert_approx_eq!(
            Dimensionless,
            share(&sector, "coal", 0),
            Dimensionless(expected)
        );
    }

    #[rstest]
    fn test_solve_period_calibration(
        mut subsector: Subsector,
        gas_subsector: Subsector,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        {
            let state = subsector.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(30.0));
        }
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![subsector, gas_subsector])
                .unwrap();

        let solution = solve(&mut sector, 0, demand, &fuel_prices, &options);
        assert!(solution.calibrated);
        assert!(solution.converged);
        assert!(solution.iterations > 1);

        let coal = sector.subsector("coal").unwrap();
        let output = coal.get_output(0).unwrap();
        assert!((output.value() - 30.0).abs() <= 30.0 * 1e-3);
        assert_approx_eq!(Dimensionless, total_share(&sector, 0), Dimensionless(1.0));
    }

    #[rstest]
    fn test_solve_period_ghg_tax(
        mut sector: Sector,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        let ghg_taxes: GasTaxes = [(GasID::new(CO2), MoneyPerEmissions(1.0))]
            .into_iter()
            .collect();
        let inputs = PeriodInputs {
            demand,
            fuel_prices: &fuel_prices,
            ghg_taxes: &ghg_taxes,
            gnp_per_capita_scaler: Dimensionless(1.0),
            indirect_coefficients: &[],
        };
        sector.solve_period(0, &inputs, &options).unwrap();

        // Coal pays 4 per unit output, gas 2
        let coal = sector.subsector("coal").unwrap();
        assert_approx_eq!(
            MoneyPerEnergy,
            coal.get_price(0).unwrap(),
            MoneyPerEnergy(9.0)
        );
        let gas = sector.subsector("gas").unwrap();
        assert_approx_eq!(
            MoneyPerEnergy,
            gas.get_price(0).unwrap(),
            MoneyPerEnergy(7.0)
        );
    }

    #[rstest]
    fn test_solve_period_negative_demand(
        mut sector: Sector,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        let ghg_taxes = GasTaxes::new();
        let inputs = PeriodInputs {
            demand: Energy(-1.0),
            fuel_prices: &fuel_prices,
            ghg_taxes: &ghg_taxes,
            gnp_per_capita_scaler: Dimensionless(1.0),
            indirect_coefficients: &[],
        };
        assert_error!(
            sector.solve_period(0, &inputs, &options),
            "Demand for sector electricity in period 0 must be a finite number >= 0 (got -1)"
        );
    }

    #[rstest]
    fn test_interpolate_after_calibration(
        technology: Technology,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        let mut coal = build_subsector("coal", vec![technology.clone()], 3);
        {
            let state = coal.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(30.0));
            state.share_weight_from_input = true;
        }
        coal.period_state_mut(2).unwrap().share_weight_from_input = true;
        let other = build_subsector("other", vec![technology], 3);
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![coal, other]).unwrap();

        solve(&mut sector, 0, demand, &fuel_prices, &options);
        sector.interpolate_after_calibration(0).unwrap();

        let coal = sector.subsector("coal").unwrap();
        let calibrated = coal.get_share_weight(0).unwrap();
        assert!(calibrated.value() < 1.0);
        assert_approx_eq!(
            Dimensionless,
            coal.get_share_weight(1).unwrap(),
            (calibrated + Dimensionless(1.0)) * Dimensionless(0.5)
        );
        assert_eq!(coal.get_share_weight(2).unwrap(), Dimensionless(1.0));
    }

    #[rstest]
    fn test_interpolate_after_calibration_hold(
        technology: Technology,
        demand: Energy,
        fuel_prices: CommodityPrices,
        options: SolverOptions,
    ) {
        let mut coal = build_subsector("coal", vec![technology.clone()], 3);
        {
            let state = coal.period_state_mut(0).unwrap();
            state.do_calibration = true;
            state.calibration_output = Some(Energy(30.0));
        }
        let other = build_subsector("other", vec![technology], 3);
        let mut sector =
            Sector::new("electricity".into(), "USA".into(), vec![coal, other]).unwrap();

        solve(&mut sector, 0, demand, &fuel_prices, &options);
        sector.interpolate_after_calibration(0).unwrap();

        let coal = sector.subsector("coal").unwrap();
        let calibrated = coal.get_share_weight(0).unwrap();
        assert_eq!(coal.get_share_weight(1).unwrap(), calibrated);
        assert_eq!(coal.get_share_weight(2).unwrap(), calibrated);
    }
}
