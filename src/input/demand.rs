//! Code for reading total demand for the sector's output, which varies by year.
use super::*;
use crate::units::Energy;
use anyhow::{Result, ensure};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

const DEMAND_FILE_NAME: &str = "demand.csv";

/// Represents a single demand entry in the dataset.
#[derive(Debug, Clone, Deserialize, PartialEq)]
struct Demand {
    /// The year of the demand entry
    year: u32,
    /// Total demand for the sector's output
    demand: f64,
}

/// Read sector demand from the `demand.csv` file.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `milestone_years` - All milestone years
///
/// # Returns
///
/// Demand for each milestone year, indexed by period.
pub fn read_demand(model_dir: &Path, milestone_years: &[u32]) -> Result<Vec<Energy>> {
    let file_path = model_dir.join(DEMAND_FILE_NAME);
    let iter = read_csv(&file_path)?;
    read_demand_from_iter(iter, milestone_years).with_context(|| input_err_msg(file_path))
}

/// Read the demand data from an iterator.
fn read_demand_from_iter<I>(iter: I, milestone_years: &[u32]) -> Result<Vec<Energy>>
where
    I: Iterator<Item = Demand>,
{
    let mut map = IndexMap::new();
    for demand in iter {
        ensure!(
            milestone_years.binary_search(&demand.year).is_ok(),
            "Year {} is not a milestone year",
            demand.year
        );
        check_non_negative(demand.demand, "Demand")?;
        ensure!(
            map.insert(demand.year, Energy(demand.demand)).is_none(),
            "Duplicate demand entries for year {}",
            demand.year
        );
    }

    milestone_years
        .iter()
        .map(|year| {
            map.get(year)
                .copied()
                .with_context(|| format!("Missing demand for year {year}"))
        })
        .collect()
}
