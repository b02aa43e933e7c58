//! Commodities (fuels and products) and greenhouse gases.
use crate::id::define_id_type;
use crate::units::{MoneyPerEmissions, MoneyPerEnergy};
use anyhow::{Context, Result};
use indexmap::IndexMap;

define_id_type! {CommodityID}
define_id_type! {GasID}

/// The name of the gas to which carbon taxes and capture apply
pub const CO2: &str = "CO2";

/// Fuel prices for a single period, keyed by commodity
#[derive(Debug, Default, Clone, PartialEq)]
pub struct CommodityPrices(IndexMap<CommodityID, MoneyPerEnergy>);

impl CommodityPrices {
    /// Get the price for the given commodity
    pub fn get(&self, commodity_id: &CommodityID) -> Result<MoneyPerEnergy> {
        self.0
            .get(commodity_id)
            .copied()
            .with_context(|| format!("No price given for commodity {commodity_id}"))
    }

    /// Insert a price for the given commodity
    pub fn insert(&mut self, commodity_id: CommodityID, price: MoneyPerEnergy) {
        self.0.insert(commodity_id, price);
    }

    /// Whether a price has been given for the commodity
    pub fn contains(&self, commodity_id: &CommodityID) -> bool {
        self.0.contains_key(commodity_id)
    }

    /// Iterate over the prices
    pub fn iter(&self) -> impl Iterator<Item = (&CommodityID, MoneyPerEnergy)> {
        self.0.iter().map(|(id, price)| (id, *price))
    }
}

impl FromIterator<(CommodityID, MoneyPerEnergy)> for CommodityPrices {
    fn from_iter<I: IntoIterator<Item = (CommodityID, MoneyPerEnergy)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Taxes on greenhouse gases for a single period, keyed by gas
pub type GasTaxes = IndexMap<GasID, MoneyPerEmissions>;
