//! Per-period reporting snapshot for a subsector.
use crate::commodity::{CommodityID, GasID};
use crate::units::{Emissions, Energy};
use indexmap::IndexMap;

/// Add the values of one map into another, summing values for repeated keys
fn add_to_map<K, V>(map: &mut IndexMap<K, V>, other: &IndexMap<K, V>)
where
    K: std::hash::Hash + Eq + Clone,
    V: Copy + Default + std::ops::AddAssign,
{
    for (key, value) in other {
        *map.entry(key.clone()).or_default() += *value;
    }
}

/// Aggregated fuel consumption and emissions for one period
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Summary {
    fuel_consumption: IndexMap<CommodityID, Energy>,
    emissions: IndexMap<GasID, Emissions>,
    emissions_by_fuel: IndexMap<CommodityID, Emissions>,
    indirect_emissions: IndexMap<GasID, Emissions>,
}

impl Summary {
    /// Fuel consumption by fuel
    pub fn fuel_consumption(&self) -> &IndexMap<CommodityID, Energy> {
        &self.fuel_consumption
    }

    /// Add to the consumption of a fuel
    pub fn add_fuel_consumption(&mut self, fuel: &CommodityID, input: Energy) {
        *self.fuel_consumption.entry(fuel.clone()).or_default() += input;
    }

    /// Remove all fuel consumption records
    pub fn clear_fuel_consumption(&mut self) {
        self.fuel_consumption.clear();
    }

    /// Direct emissions by gas
    pub fn emissions(&self) -> &IndexMap<GasID, Emissions> {
        &self.emissions
    }

    /// Add direct emissions by gas
    pub fn add_emissions(&mut self, emissions: &IndexMap<GasID, Emissions>) {
        add_to_map(&mut self.emissions, emissions);
    }

    /// CO2 embodied in fuel consumption, by fuel
    pub fn emissions_by_fuel(&self) -> &IndexMap<CommodityID, Emissions> {
        &self.emissions_by_fuel
    }

    /// Add fuel-embodied emissions
    pub fn add_emissions_by_fuel(&mut self, emissions: &IndexMap<CommodityID, Emissions>) {
        add_to_map(&mut self.emissions_by_fuel, emissions);
    }

    /// Indirect emissions by gas
    pub fn indirect_emissions(&self) -> &IndexMap<GasID, Emissions> {
        &self.indirect_emissions
    }

    /// Add indirect emissions by gas
    pub fn add_indirect_emissions(&mut self, emissions: &IndexMap<GasID, Emissions>) {
        add_to_map(&mut self.indirect_emissions, emissions);
    }

    /// Remove direct emissions records (including those by fuel)
    pub fn clear_emissions(&mut self) {
        self.emissions.clear();
        self.emissions_by_fuel.clear();
    }

    /// Remove indirect emissions records
    pub fn clear_indirect_emissions(&mut self) {
        self.indirect_emissions.clear();
    }
}
