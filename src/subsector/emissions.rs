//! Emissions and greenhouse gas taxes.
use super::Subsector;
use crate::commodity::{CO2, CommodityID, GasID};
use crate::period::PeriodStage;
use crate::units::{Emissions, EmissionsPerEnergy, Energy, MoneyPerEmissions};
use anyhow::Result;
use indexmap::IndexMap;
use log::debug;
use serde::Deserialize;

/// Emissions from upstream production of a fuel, per unit of fuel consumed
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IndirectEmissionCoefficient {
    /// The fuel
    pub commodity_id: CommodityID,
    /// The greenhouse gas emitted
    pub gas: GasID,
    /// Emissions per unit of fuel consumed
    pub coefficient: EmissionsPerEnergy,
}

impl Subsector {
    /// Set the tax on CO2 emissions for every technology.
    ///
    /// Taxes are included in technology costs from the next call to
    /// [`Subsector::calc_price`].
    pub fn apply_carbon_tax(&mut self, tax: MoneyPerEmissions, period: usize) -> Result<()> {
        let state = self.period_state_mut(period)?;
        state.stage.check_not_terminal("apply carbon tax")?;
        for technology in &mut state.technologies {
            technology.apply_carbon_tax(tax);
        }

        Ok(())
    }

    /// Set the tax on emissions of a greenhouse gas for every technology
    pub fn add_ghg_tax(
        &mut self,
        gas: &GasID,
        tax: MoneyPerEmissions,
        period: usize,
    ) -> Result<()> {
        let state = self.period_state_mut(period)?;
        state.stage.check_not_terminal("add greenhouse gas tax")?;
        for technology in &mut state.technologies {
            technology.add_ghg_tax(gas.clone(), tax);
        }

        Ok(())
    }

    /// Calculate direct emissions for each technology and add them to the period summary
    pub fn emission(&mut self, period: usize, product: &CommodityID) -> Result<()> {
        let id = self.id.clone();
        let state = self.period_state_mut(period)?;
        state
            .stage
            .check("calculate emissions", &[PeriodStage::TechAllocated])?;

        state.summary.clear_emissions();
        for technology in &mut state.technologies {
            technology.calc_emissions();
            state.summary.add_emissions(technology.emissions());
            state
                .summary
                .add_emissions_by_fuel(technology.emissions_by_fuel());
        }
        state.stage = PeriodStage::EmissionsComputed;

        if state.output.value() > 0.0 {
            let co2 = state
                .summary
                .emissions()
                .get(CO2)
                .copied()
                .unwrap_or_default();
            debug!(
                "Subsector {id} emits {} CO2 per unit of {product} in period {period}",
                co2 / state.output
            );
        }

        Ok(())
    }

    /// Calculate indirect emissions for each technology and add them to the period summary
    pub fn indemission(
        &mut self,
        period: usize,
        coefficients: &[IndirectEmissionCoefficient],
    ) -> Result<()> {
        let state = self.period_state_mut(period)?;
        state.stage.check(
            "calculate indirect emissions",
            &[PeriodStage::TechAllocated, PeriodStage::EmissionsComputed],
        )?;

        state.summary.clear_indirect_emissions();
        for technology in &mut state.technologies {
            technology.calc_indirect_emissions(coefficients);
            state
                .summary
                .add_indirect_emissions(technology.indirect_emissions());
        }

        Ok(())
    }

    /// Direct CO2 emissions
    pub fn show_co2(&self, period: usize) -> Result<Emissions> {
        Ok(gas_total(self.get_emission(period)?, CO2))
    }

    /// Indirect CO2 emissions
    pub fn show_co2_ind(&self, period: usize) -> Result<Emissions> {
        Ok(gas_total(self.get_em_ind_map(period)?, CO2))
    }

    /// CO2 embodied in the fuels consumed, before capture
    pub fn show_co2_fuel(&self, period: usize) -> Result<Emissions> {
        Ok(self.get_em_fuel_map(period)?.values().sum())
    }

    /// Fuel consumption by fuel
    pub fn get_fuel_cons(&self, period: usize) -> Result<&IndexMap<CommodityID, Energy>> {
        Ok(self.period_state(period)?.summary.fuel_consumption())
    }

    /// Remove fuel consumption records for the period
    pub fn clear_fuel_cons(&mut self, period: usize) -> Result<()> {
        self.period_state_mut(period)?
            .summary
            .clear_fuel_consumption();
        Ok(())
    }

    /// Direct emissions by gas
    pub fn get_emission(&self, period: usize) -> Result<&IndexMap<GasID, Emissions>> {
        Ok(self.period_state(period)?.summary.emissions())
    }

    /// CO2 embodied in fuels, by fuel
    pub fn get_em_fuel_map(&self, period: usize) -> Result<&IndexMap<CommodityID, Emissions>> {
        Ok(self.period_state(period)?.summary.emissions_by_fuel())
    }

    /// Indirect emissions by gas
    pub fn get_em_ind_map(&self, period: usize) -> Result<&IndexMap<GasID, Emissions>> {
        Ok(self.period_state(period)?.summary.indirect_emissions())
    }
}

/// Get the emissions of a gas from a map, defaulting to zero
fn gas_total(map: &IndexMap<GasID, Emissions>, gas: &str) -> Emissions {
    map.get(gas).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commodity::CommodityPrices;
    use crate::fixture::{assert_error, fuel_prices, subsector};
    use crate::units::{Dimensionless, Money, MoneyPerEnergy};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// Solve period 0 as far as technology allocation, with 10 units of output
    fn allocate(subsector: &mut Subsector, fuel_prices: &CommodityPrices) {
        subsector.init_calc(0).unwrap();
        subsector.calc_price(0, fuel_prices).unwrap();
        subsector.calc_share(0, Dimensionless(1.0)).unwrap();
        subsector.set_share(Dimensionless(0.1), 0).unwrap();
        subsector.limit_shares(Dimensionless(1.0), 0).unwrap();
        subsector
            .set_output(&"electricity".into(), Energy(100.0), 0)
            .unwrap();
    }

    #[rstest]
    fn test_emission(mut subsector: Subsector, fuel_prices: CommodityPrices) {
        allocate(&mut subsector, &fuel_prices);
        subsector.emission(0, &"electricity".into()).unwrap();

        // 10 output at efficiency 0.5 => 20 input, CO2 coefficient 2
        assert_approx_eq!(Emissions, subsector.show_co2(0).unwrap(), Emissions(40.0));
        assert_approx_eq!(
            Emissions,
            subsector.show_co2_fuel(0).unwrap(),
            Emissions(40.0)
        );
        assert_eq!(subsector.stage(0).unwrap(), PeriodStage::EmissionsComputed);

        // Recalculating doesn't double count
        subsector.period_state_mut(0).unwrap().stage = PeriodStage::TechAllocated;
        subsector.emission(0, &"electricity".into()).unwrap();
        assert_approx_eq!(Emissions, subsector.show_co2(0).unwrap(), Emissions(40.0));
    }

    #[rstest]
    fn test_emission_wrong_stage(mut subsector: Subsector) {
        assert_error!(
            subsector.emission(0, &"electricity".into()),
            "Cannot calculate emissions while period is in stage uninitialized"
        );
    }

    #[rstest]
    fn test_indemission(mut subsector: Subsector, fuel_prices: CommodityPrices) {
        allocate(&mut subsector, &fuel_prices);
        let coefficients = [IndirectEmissionCoefficient {
            commodity_id: "coal".into(),
            gas: GasID::new(CO2),
            coefficient: EmissionsPerEnergy(0.1),
        }];
        subsector.indemission(0, &coefficients).unwrap();
        assert_approx_eq!(
            Emissions,
            subsector.show_co2_ind(0).unwrap(),
            Emissions(2.0)
        );
    }

    #[rstest]
    fn test_carbon_tax(mut subsector: Subsector, fuel_prices: CommodityPrices) {
        subsector
            .apply_carbon_tax(MoneyPerEmissions(1.0), 0)
            .unwrap();
        subsector.calc_price(0, &fuel_prices).unwrap();

        // 2 CO2 per unit input, efficiency 0.5 => 4 tax per unit output
        assert_approx_eq!(
            MoneyPerEnergy,
            subsector.get_price(0).unwrap(),
            MoneyPerEnergy(9.0)
        );

        allocate(&mut subsector, &fuel_prices);
        assert_approx_eq!(
            Money,
            subsector.get_total_carbon_tax_paid(0).unwrap(),
            Money(40.0)
        );
    }

    #[rstest]
    fn test_add_ghg_tax_replaces(mut subsector: Subsector, fuel_prices: CommodityPrices) {
        let co2 = GasID::new(CO2);
        subsector
            .add_ghg_tax(&co2, MoneyPerEmissions(5.0), 0)
            .unwrap();
        subsector
            .add_ghg_tax(&co2, MoneyPerEmissions(1.0), 0)
            .unwrap();
        subsector.calc_price(0, &fuel_prices).unwrap();
        assert_approx_eq!(
            MoneyPerEnergy,
            subsector.get_price(0).unwrap(),
            MoneyPerEnergy(9.0)
        );
    }

    #[rstest]
    fn test_fuel_cons(mut subsector: Subsector, fuel_prices: CommodityPrices) {
        allocate(&mut subsector, &fuel_prices);
        subsector.emission(0, &"electricity".into()).unwrap();
        subsector.update_summary(0, &["coal".into()]).unwrap();

        let coal = CommodityID::new("coal");
        assert_approx_eq!(
            Energy,
            subsector.get_fuel_cons(0).unwrap()[&coal],
            Energy(20.0)
        );
        assert_approx_eq!(Energy, subsector.get_pe_cons(0).unwrap(), Energy(20.0));
        assert_eq!(subsector.stage(0).unwrap(), PeriodStage::SummaryUpdated);

        subsector.clear_fuel_cons(0).unwrap();
        assert!(subsector.get_fuel_cons(0).unwrap().is_empty());

        // The period is finalised
        assert!(subsector.calc_share(0, Dimensionless(1.0)).is_err());
    }
}
