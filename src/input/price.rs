//! Code for reading fuel prices, which vary by commodity and year.
use super::*;
use crate::commodity::{CommodityID, CommodityPrices};
use crate::units::MoneyPerEnergy;
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::Deserialize;
use std::path::Path;

const FUEL_PRICES_FILE_NAME: &str = "fuel_prices.csv";

/// A single row of the fuel prices file
#[derive(Debug, Clone, Deserialize, PartialEq)]
struct FuelPriceRaw {
    commodity_id: CommodityID,
    year: u32,
    price: f64,
}

/// Read fuel prices from the `fuel_prices.csv` file.
///
/// A price must be given for every fuel used by a technology in every milestone year. Prices for
/// other commodities are ignored.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `fuels` - The fuels used by technologies
/// * `milestone_years` - All milestone years
///
/// # Returns
///
/// Fuel prices for each milestone year, indexed by period.
pub fn read_fuel_prices(
    model_dir: &Path,
    fuels: &IndexSet<CommodityID>,
    milestone_years: &[u32],
) -> Result<Vec<CommodityPrices>> {
    let file_path = model_dir.join(FUEL_PRICES_FILE_NAME);
    let iter = read_csv(&file_path)?;
    read_fuel_prices_from_iter(iter, fuels, milestone_years)
        .with_context(|| input_err_msg(file_path))
}

fn read_fuel_prices_from_iter<I>(
    iter: I,
    fuels: &IndexSet<CommodityID>,
    milestone_years: &[u32],
) -> Result<Vec<CommodityPrices>>
where
    I: Iterator<Item = FuelPriceRaw>,
{
    let mut map: IndexMap<u32, CommodityPrices> = milestone_years
        .iter()
        .map(|year| (*year, CommodityPrices::default()))
        .collect();

    for raw in iter {
        // Years outside the simulation are allowed, so that a price file can be shared between
        // models
        let Some(prices) = map.get_mut(&raw.year) else {
            continue;
        };
        if !fuels.contains(&raw.commodity_id) {
            continue;
        }

        check_non_negative(raw.price, "Fuel price")?;
        ensure!(
            !prices.contains(&raw.commodity_id),
            "Duplicate price for commodity {} in year {}",
            raw.commodity_id,
            raw.year
        );
        prices.insert(raw.commodity_id, MoneyPerEnergy(raw.price));
    }

    for (year, prices) in &map {
        for fuel in fuels {
            ensure!(
                prices.contains(fuel),
                "Missing price for commodity {fuel} in year {year}"
            );
        }
    }

    Ok(map.into_values().collect())
}
