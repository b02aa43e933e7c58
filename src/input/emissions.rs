//! Code for reading greenhouse gas taxes and indirect emission coefficients.
use super::*;
use crate::commodity::{GasID, GasTaxes};
use crate::subsector::emissions::IndirectEmissionCoefficient;
use crate::units::MoneyPerEmissions;
use anyhow::{Result, ensure};
use indexmap::IndexSet;
use serde::Deserialize;
use std::path::Path;

const GHG_TAXES_FILE_NAME: &str = "ghg_taxes.csv";
const INDIRECT_EMISSIONS_FILE_NAME: &str = "indirect_emissions.csv";

/// A single row of the GHG taxes file
#[derive(Debug, Clone, Deserialize, PartialEq)]
struct GhgTaxRaw {
    gas: GasID,
    year: u32,
    tax: f64,
}

/// Read taxes on greenhouse gases from the `ghg_taxes.csv` file, if present.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `milestone_years` - All milestone years
///
/// # Returns
///
/// Taxes for each milestone year, indexed by period. Gases without a tax in a given year are
/// untaxed.
pub fn read_ghg_taxes(model_dir: &Path, milestone_years: &[u32]) -> Result<Vec<GasTaxes>> {
    let file_path = model_dir.join(GHG_TAXES_FILE_NAME);
    let iter = read_csv_optional(&file_path)?;
    read_ghg_taxes_from_iter(iter, milestone_years).with_context(|| input_err_msg(file_path))
}

fn read_ghg_taxes_from_iter<I>(iter: I, milestone_years: &[u32]) -> Result<Vec<GasTaxes>>
where
    I: Iterator<Item = GhgTaxRaw>,
{
    let mut taxes = vec![GasTaxes::new(); milestone_years.len()];
    for raw in iter {
        let period = milestone_years
            .binary_search(&raw.year)
            .ok()
            .with_context(|| format!("Year {} is not a milestone year", raw.year))?;
        ensure!(
            raw.tax.is_finite(),
            "Tax on {} in year {} must be a finite number",
            raw.gas,
            raw.year
        );
        ensure!(
            taxes[period]
                .insert(raw.gas.clone(), MoneyPerEmissions(raw.tax))
                .is_none(),
            "Duplicate tax for gas {} in year {}",
            raw.gas,
            raw.year
        );
    }

    Ok(taxes)
}

/// Read indirect emission coefficients from the `indirect_emissions.csv` file, if present.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
pub fn read_indirect_emission_coefficients(
    model_dir: &Path,
) -> Result<Vec<IndirectEmissionCoefficient>> {
    let file_path = model_dir.join(INDIRECT_EMISSIONS_FILE_NAME);
    let iter = read_csv_optional(&file_path)?;
    check_indirect_emission_coefficients(iter).with_context(|| input_err_msg(file_path))
}

fn check_indirect_emission_coefficients<I>(iter: I) -> Result<Vec<IndirectEmissionCoefficient>>
where
    I: Iterator<Item = IndirectEmissionCoefficient>,
{
    let mut seen = IndexSet::new();
    let mut coefficients = Vec::new();
    for coeff in iter {
        ensure!(
            coeff.coefficient.is_finite(),
            "Indirect emission coefficient for {} ({}) must be a finite number",
            coeff.commodity_id,
            coeff.gas
        );
        ensure!(
            seen.insert((coeff.commodity_id.clone(), coeff.gas.clone())),
            "Duplicate indirect emission coefficient for {} ({})",
            coeff.commodity_id,
            coeff.gas
        );
        coefficients.push(coeff);
    }

    Ok(coefficients)
}
