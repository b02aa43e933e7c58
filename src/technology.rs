//! Technologies are the individual production options competing within a subsector.
//!
//! A [`Technology`] holds the parameters for one period together with the results of the most
//! recent cost, share, production and emissions calculations for that period. Subsectors own one
//! instance per technology per period.
use crate::commodity::{CO2, CommodityID, GasID, GasTaxes};
use crate::id::define_id_type;
use crate::subsector::emissions::IndirectEmissionCoefficient;
use crate::units::{
    Dimensionless, Emissions, EmissionsPerEnergy, Energy, Money, MoneyPerEmissions,
    MoneyPerEnergy,
};
use indexmap::IndexMap;

define_id_type! {TechnologyID}

/// The default logit exponent for technologies
pub const DEFAULT_TECHNOLOGY_LOGIT_EXPONENT: f64 = -6.0;

/// A technology in a single period
#[derive(Debug, Clone, PartialEq)]
pub struct Technology {
    /// Unique identifier within the subsector (e.g. "coal_steam")
    pub id: TechnologyID,
    /// The fuel consumed by the technology
    pub fuel: CommodityID,
    /// Output per unit of fuel input
    pub efficiency: Dimensionless,
    /// Non-fuel cost per unit of output
    pub non_fuel_cost: MoneyPerEnergy,
    /// Logit share weight
    pub share_weight: Dimensionless,
    /// Logit exponent (<= 0)
    pub logit_exponent: f64,
    /// Fraction of CO2 which is captured rather than emitted
    pub capture_fraction: Dimensionless,
    /// Emissions per unit of fuel input, keyed by gas
    pub emission_coefficients: IndexMap<GasID, EmissionsPerEnergy>,
    /// Exogenously fixed output, as given in the input data
    pub configured_fixed_output: Option<Energy>,
    /// Historical output to calibrate to
    pub calibration_output: Option<Energy>,
    state: TechnologyState,
}

/// Results of calculations for a technology
#[derive(Debug, Clone, Default, PartialEq)]
struct TechnologyState {
    fixed_output: Option<Energy>,
    ghg_taxes: GasTaxes,
    fuel_cost: MoneyPerEnergy,
    cost: MoneyPerEnergy,
    share: Dimensionless,
    output: Energy,
    input: Energy,
    carbon_tax_paid: Money,
    emissions: IndexMap<GasID, Emissions>,
    emissions_by_fuel: IndexMap<CommodityID, Emissions>,
    indirect_emissions: IndexMap<GasID, Emissions>,
}

impl Technology {
    /// Create a new technology with a share weight of 1 and no emissions
    pub fn new(
        id: TechnologyID,
        fuel: CommodityID,
        efficiency: Dimensionless,
        non_fuel_cost: MoneyPerEnergy,
    ) -> Self {
        Self {
            id,
            fuel,
            efficiency,
            non_fuel_cost,
            share_weight: Dimensionless(1.0),
            logit_exponent: DEFAULT_TECHNOLOGY_LOGIT_EXPONENT,
            capture_fraction: Dimensionless(0.0),
            emission_coefficients: IndexMap::new(),
            configured_fixed_output: None,
            calibration_output: None,
            state: TechnologyState::default(),
        }
    }

    /// Give the technology an exogenously fixed output
    pub fn with_fixed_output(mut self, fixed_output: Energy) -> Self {
        self.configured_fixed_output = Some(fixed_output);
        self.state.fixed_output = Some(fixed_output);
        self
    }

    /// Emissions per unit of input which are actually released for the given gas
    fn effective_coefficient(&self, gas: &GasID, coeff: EmissionsPerEnergy) -> EmissionsPerEnergy {
        if gas.0.as_ref() == CO2 {
            coeff * (Dimensionless(1.0) - self.capture_fraction)
        } else {
            coeff
        }
    }

    /// Greenhouse gas taxes per unit of output
    fn tax_cost(&self) -> MoneyPerEnergy {
        let per_input: MoneyPerEnergy = self
            .emission_coefficients
            .iter()
            .filter_map(|(gas, coeff)| {
                let tax = self.state.ghg_taxes.get(gas)?;
                Some(self.effective_coefficient(gas, *coeff) * *tax)
            })
            .sum();

        per_input / self.efficiency
    }

    /// Calculate the cost per unit of output for the given fuel price
    pub fn calc_cost(&mut self, fuel_price: MoneyPerEnergy) {
        self.state.fuel_cost = fuel_price / self.efficiency;
        self.state.cost = self.state.fuel_cost + self.non_fuel_cost + self.tax_cost();
    }

    /// Total cost per unit of output, as of the last call to [`Technology::calc_cost`]
    pub fn cost(&self) -> MoneyPerEnergy {
        self.state.cost
    }

    /// Fuel cost per unit of output, as of the last call to [`Technology::calc_cost`]
    pub fn fuel_cost(&self) -> MoneyPerEnergy {
        self.state.fuel_cost
    }

    /// The un-normalised logit share of the technology.
    ///
    /// Technologies with a fixed output, a zero share weight or a non-positive cost do not
    /// compete for share.
    pub fn logit_weight(&self) -> f64 {
        if self.is_output_fixed()
            || self.share_weight.value() <= 0.0
            || self.state.cost.value() <= 0.0
        {
            return 0.0;
        }

        self.share_weight.value() * self.state.cost.value().powf(self.logit_exponent)
    }

    /// The technology's share of subsector output
    pub fn share(&self) -> Dimensionless {
        self.state.share
    }

    /// Set the technology's share of subsector output
    pub fn set_share(&mut self, share: Dimensionless) {
        self.state.share = share;
    }

    /// Whether the technology's output is exogenously fixed
    pub fn is_output_fixed(&self) -> bool {
        self.state.fixed_output.is_some()
    }

    /// Fixed output of the technology (zero if not fixed)
    pub fn fixed_output(&self) -> Energy {
        self.state.fixed_output.unwrap_or_default()
    }

    /// Scale the fixed output, e.g. when total demand cannot absorb all fixed supply
    pub fn scale_fixed_output(&mut self, ratio: Dimensionless) {
        if let Some(fixed_output) = self.state.fixed_output.as_mut() {
            *fixed_output = *fixed_output * ratio;
        }
    }

    /// Restore the fixed output to its configured value
    pub fn reset_fixed_output(&mut self) {
        self.state.fixed_output = self.configured_fixed_output;
    }

    /// Produce the given output, consuming fuel accordingly
    pub fn production(&mut self, output: Energy) {
        self.state.output = output;
        self.state.input = output / self.efficiency;
        self.state.carbon_tax_paid = output * self.tax_cost();
    }

    /// Output as of the last call to [`Technology::production`]
    pub fn output(&self) -> Energy {
        self.state.output
    }

    /// Fuel input as of the last call to [`Technology::production`]
    pub fn input(&self) -> Energy {
        self.state.input
    }

    /// Greenhouse gas taxes paid as of the last call to [`Technology::production`]
    pub fn carbon_tax_paid(&self) -> Money {
        self.state.carbon_tax_paid
    }

    /// Set the tax on CO2 emissions
    pub fn apply_carbon_tax(&mut self, tax: MoneyPerEmissions) {
        self.state.ghg_taxes.insert(GasID::new(CO2), tax);
    }

    /// Set the tax on emissions of the given gas
    pub fn add_ghg_tax(&mut self, gas: GasID, tax: MoneyPerEmissions) {
        self.state.ghg_taxes.insert(gas, tax);
    }

    /// Calculate direct emissions from the current fuel input
    pub fn calc_emissions(&mut self) {
        let input = self.state.input;
        self.state.emissions = self
            .emission_coefficients
            .iter()
            .map(|(gas, coeff)| (gas.clone(), input * self.effective_coefficient(gas, *coeff)))
            .collect();

        // CO2 embodied in the fuel, before any capture
        self.state.emissions_by_fuel.clear();
        if let Some(coeff) = self.emission_coefficients.get(CO2) {
            self.state
                .emissions_by_fuel
                .insert(self.fuel.clone(), input * *coeff);
        }
    }

    /// Calculate indirect emissions from upstream production of the fuel consumed
    pub fn calc_indirect_emissions(&mut self, coefficients: &[IndirectEmissionCoefficient]) {
        self.state.indirect_emissions.clear();
        for coeff in coefficients.iter().filter(|coeff| coeff.commodity_id == self.fuel) {
            *self
                .state
                .indirect_emissions
                .entry(coeff.gas.clone())
                .or_default() += self.state.input * coeff.coefficient;
        }
    }

    /// Direct emissions by gas
    pub fn emissions(&self) -> &IndexMap<GasID, Emissions> {
        &self.state.emissions
    }

    /// CO2 embodied in fuel consumption, by fuel
    pub fn emissions_by_fuel(&self) -> &IndexMap<CommodityID, Emissions> {
        &self.state.emissions_by_fuel
    }

    /// Indirect emissions by gas
    pub fn indirect_emissions(&self) -> &IndexMap<GasID, Emissions> {
        &self.state.indirect_emissions
    }

    /// Whether the technology has a calibration value
    pub fn get_calibration_status(&self) -> bool {
        self.calibration_output.is_some()
    }

    /// Scale the calibration value
    pub fn scale_calibration_input(&mut self, scale_factor: Dimensionless) {
        if let Some(value) = self.calibration_output.as_mut() {
            *value = *value * scale_factor;
        }
    }

    /// Adjust the share weight so that the next share calculation reproduces the calibration
    /// output.
    ///
    /// # Arguments
    ///
    /// * `flexible_demand` - The subsector demand which is shared out among flexible technologies
    pub fn adjust_for_calibration(&mut self, flexible_demand: Energy) {
        let Some(calibration_output) = self.calibration_output else {
            return;
        };
        if self.is_output_fixed() || flexible_demand.value() <= 0.0 {
            return;
        }

        if self.share_weight.value() == 0.0 && calibration_output.value() > 0.0 {
            self.share_weight = Dimensionless(1.0);
        }

        let current_output = flexible_demand * self.state.share;
        if current_output.value() > 0.0 {
            self.share_weight *= calibration_output / current_output;
        }
    }

    /// Multiply the share weight by a constant factor
    pub fn scale_share_weight(&mut self, scale_factor: Dimensionless) {
        self.share_weight *= scale_factor;
    }
}
