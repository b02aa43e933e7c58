//! Code for reading the subsector configuration file.
//!
//! Subsectors and their technologies are configured with base values, which can be overridden for
//! individual milestone years.
use super::*;
use crate::commodity::{CommodityID, GasID};
use crate::model::ModelParameters;
use crate::period::PeriodState;
use crate::sector::{RegionID, SectorID};
use crate::subsector::{DEFAULT_SUBSECTOR_LOGIT_EXPONENT, Subsector, SubsectorID, SubsectorKind};
use crate::technology::{DEFAULT_TECHNOLOGY_LOGIT_EXPONENT, Technology, TechnologyID};
use crate::units::{Dimensionless, EmissionsPerEnergy, Energy, MoneyPerEnergy};
use anyhow::{Result, ensure};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::path::Path;

const SUBSECTORS_FILE_NAME: &str = "subsectors.toml";

fn default_unit() -> String {
    "EJ".into()
}

fn default_one() -> f64 {
    1.0
}

fn default_subsector_logit_exponent() -> f64 {
    DEFAULT_SUBSECTOR_LOGIT_EXPONENT
}

fn default_technology_logit_exponent() -> f64 {
    DEFAULT_TECHNOLOGY_LOGIT_EXPONENT
}

/// The contents of `subsectors.toml`
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubsectorsFile {
    /// The subsectors of the sector
    pub subsectors: Vec<SubsectorConfig>,
}

/// The type of a subsector, as given in the configuration file
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum SubsectorKindRaw {
    #[default]
    #[string = "standard"]
    Standard,
    #[string = "transport"]
    Transport,
}

/// Configuration for a single subsector
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubsectorConfig {
    /// Unique identifier for the subsector
    pub id: SubsectorID,
    /// The subsector's principal fuel
    pub fuel: CommodityID,
    /// Unit of the subsector's output
    #[serde(default = "default_unit")]
    pub unit: String,
    /// The type of subsector
    #[serde(default)]
    pub kind: SubsectorKindRaw,
    /// Units of service per unit of vehicle output (transport subsectors only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_factor: Option<f64>,
    /// Tax added to the subsector price
    #[serde(default)]
    pub tax: f64,
    /// Share weight for years without an override
    #[serde(default = "default_one")]
    pub base_share_weight: f64,
    /// Logit exponent for years without an override
    #[serde(default = "default_subsector_logit_exponent")]
    pub logit_exponent: f64,
    /// Capacity limit for years without an override
    #[serde(default = "default_one")]
    pub capacity_limit: f64,
    /// Fuel preference elasticity for years without an override
    #[serde(default)]
    pub fuel_pref_elasticity: f64,
    /// Overrides for individual years
    #[serde(default)]
    pub periods: Vec<SubsectorPeriodConfig>,
    /// The subsector's technologies
    pub technologies: Vec<TechnologyConfig>,
}

/// Overrides of subsector parameters for a single year
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct SubsectorPeriodConfig {
    /// The milestone year
    pub year: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity_limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logit_exponent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel_pref_elasticity: Option<f64>,
    /// Historical output of the subsector, measured in units of sector demand
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_output: Option<f64>,
}

/// Configuration for a single technology
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TechnologyConfig {
    /// Unique identifier within the subsector
    pub id: TechnologyID,
    /// The fuel consumed (defaults to the subsector's fuel)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuel: Option<CommodityID>,
    /// Output per unit of fuel input
    pub efficiency: f64,
    /// Non-fuel cost per unit of output
    pub non_fuel_cost: f64,
    /// Share weight for years without an override
    #[serde(default = "default_one")]
    pub share_weight: f64,
    #[serde(default = "default_technology_logit_exponent")]
    pub logit_exponent: f64,
    /// Fraction of CO2 which is captured
    #[serde(default)]
    pub capture_fraction: f64,
    /// Emissions per unit of fuel input, keyed by gas
    #[serde(default)]
    pub emission_coefficients: IndexMap<GasID, f64>,
    /// Overrides for individual years
    #[serde(default)]
    pub periods: Vec<TechnologyPeriodConfig>,
}

/// Overrides of technology parameters for a single year
#[derive(Debug, Default, Clone, PartialEq, Deserialize, Serialize)]
pub struct TechnologyPeriodConfig {
    /// The milestone year
    pub year: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_weight: Option<f64>,
    /// Exogenously fixed output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fixed_output: Option<f64>,
    /// Historical output, measured in units of subsector output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calibration_output: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub non_fuel_cost: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efficiency: Option<f64>,
}

/// Read subsectors from the `subsectors.toml` file.
///
/// The returned subsectors have not yet been initialised with [`Subsector::complete_init`].
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
/// * `parameters` - Model parameters
pub fn read_subsectors(model_dir: &Path, parameters: &ModelParameters) -> Result<Vec<Subsector>> {
    let file_path = model_dir.join(SUBSECTORS_FILE_NAME);
    let file: SubsectorsFile = read_toml(&file_path)?;
    build_subsectors(&file, parameters).with_context(|| input_err_msg(file_path))
}

fn build_subsectors(file: &SubsectorsFile, parameters: &ModelParameters) -> Result<Vec<Subsector>> {
    ensure!(!file.subsectors.is_empty(), "No subsectors given");

    let mut ids = IndexSet::new();
    let region_id = RegionID::new(&parameters.region);
    let sector_id = SectorID::new(&parameters.sector);
    file.subsectors
        .iter()
        .map(|config| {
            ensure!(
                ids.insert(config.id.clone()),
                "Duplicate subsector ID {}",
                config.id
            );
            build_subsector(
                config,
                region_id.clone(),
                sector_id.clone(),
                &parameters.milestone_years,
            )
            .with_context(|| format!("Invalid configuration for subsector {}", config.id))
        })
        .collect()
}

/// Check that the years given for overrides are unique milestone years
fn check_override_years<I>(years: I, milestone_years: &[u32]) -> Result<()>
where
    I: IntoIterator<Item = u32>,
{
    let mut seen = IndexSet::new();
    for year in years {
        ensure!(
            milestone_years.binary_search(&year).is_ok(),
            "Year {year} is not a milestone year"
        );
        ensure!(seen.insert(year), "Duplicate override for year {year}");
    }

    Ok(())
}

fn build_kind(config: &SubsectorConfig) -> Result<SubsectorKind> {
    match (config.kind, config.load_factor) {
        (SubsectorKindRaw::Standard, None) => Ok(SubsectorKind::Standard),
        (SubsectorKindRaw::Standard, Some(_)) => {
            bail!("load_factor can only be given for transport subsectors")
        }
        (SubsectorKindRaw::Transport, Some(load_factor)) => {
            ensure!(
                load_factor.is_finite() && load_factor > 0.0,
                "load_factor must be greater than zero"
            );
            Ok(SubsectorKind::Transport {
                load_factor: Dimensionless(load_factor),
            })
        }
        (SubsectorKindRaw::Transport, None) => bail!("Transport subsectors require a load_factor"),
    }
}

fn build_subsector(
    config: &SubsectorConfig,
    region_id: RegionID,
    sector_id: SectorID,
    milestone_years: &[u32],
) -> Result<Subsector> {
    ensure!(!config.technologies.is_empty(), "No technologies given");
    check_non_negative(config.base_share_weight, "base_share_weight")?;
    check_override_years(config.periods.iter().map(|p| p.year), milestone_years)?;
    for technology in &config.technologies {
        check_override_years(technology.periods.iter().map(|p| p.year), milestone_years)
            .with_context(|| format!("Invalid configuration for technology {}", technology.id))?;
    }
    let kind = build_kind(config)?;

    let periods = milestone_years
        .iter()
        .map(|year| {
            let overrides = config
                .periods
                .iter()
                .find(|p| p.year == *year)
                .cloned()
                .unwrap_or_default();
            let technologies = config
                .technologies
                .iter()
                .map(|technology| build_technology(technology, &config.fuel, *year))
                .collect();

            PeriodState {
                capacity_limit: Dimensionless(
                    overrides.capacity_limit.unwrap_or(config.capacity_limit),
                ),
                share_weight: Dimensionless(
                    overrides.share_weight.unwrap_or(config.base_share_weight),
                ),
                share_weight_from_input: overrides.share_weight.is_some(),
                logit_exponent: overrides.logit_exponent.unwrap_or(config.logit_exponent),
                fuel_pref_elasticity: overrides
                    .fuel_pref_elasticity
                    .unwrap_or(config.fuel_pref_elasticity),
                do_calibration: overrides.calibration_output.is_some(),
                calibration_output: overrides.calibration_output.map(Energy),
                technologies,
                ..Default::default()
            }
        })
        .collect();

    let mut subsector = Subsector::new(
        config.id.clone(),
        region_id,
        sector_id,
        config.fuel.clone(),
        kind,
        periods,
    );
    subsector.unit.clone_from(&config.unit);
    subsector.tax = MoneyPerEnergy(config.tax);
    subsector.base_share_weight = Dimensionless(config.base_share_weight);

    Ok(subsector)
}

fn build_technology(
    config: &TechnologyConfig,
    subsector_fuel: &CommodityID,
    year: u32,
) -> Technology {
    let overrides = config
        .periods
        .iter()
        .find(|p| p.year == year)
        .cloned()
        .unwrap_or_default();

    let mut technology = Technology::new(
        config.id.clone(),
        config.fuel.clone().unwrap_or_else(|| subsector_fuel.clone()),
        Dimensionless(overrides.efficiency.unwrap_or(config.efficiency)),
        MoneyPerEnergy(overrides.non_fuel_cost.unwrap_or(config.non_fuel_cost)),
    );
    technology.share_weight = Dimensionless(overrides.share_weight.unwrap_or(config.share_weight));
    technology.logit_exponent = config.logit_exponent;
    technology.capture_fraction = Dimensionless(config.capture_fraction);
    technology.emission_coefficients = config
        .emission_coefficients
        .iter()
        .map(|(gas, coeff)| (gas.clone(), EmissionsPerEnergy(*coeff)))
        .collect();
    technology.calibration_output = overrides.calibration_output.map(Energy);
    if let Some(fixed_output) = overrides.fixed_output {
        technology = technology.with_fixed_output(Energy(fixed_output));
    }

    technology
}

impl SubsectorConfig {
    /// Recreate the configuration of a subsector, with its current values for every milestone year.
    ///
    /// Base values are taken from the first period and every year gets an explicit override, so
    /// share weights found by calibration are written out in full.
    pub fn from_subsector(subsector: &Subsector, milestone_years: &[u32]) -> Self {
        let states = subsector.iter_periods().collect_vec();
        let first = states[0];
        let (kind, load_factor) = match subsector.kind {
            SubsectorKind::Standard => (SubsectorKindRaw::Standard, None),
            SubsectorKind::Transport { load_factor } => {
                (SubsectorKindRaw::Transport, Some(load_factor.value()))
            }
        };

        let periods = milestone_years
            .iter()
            .zip(&states)
            .map(|(year, state)| SubsectorPeriodConfig {
                year: *year,
                share_weight: Some(state.share_weight.value()),
                capacity_limit: Some(state.capacity_limit.value()),
                logit_exponent: Some(state.logit_exponent),
                fuel_pref_elasticity: Some(state.fuel_pref_elasticity),
                calibration_output: state.calibration_output.map(Energy::value),
            })
            .collect();

        let technologies = first
            .technologies
            .iter()
            .enumerate()
            .map(|(index, technology)| {
                let periods = milestone_years
                    .iter()
                    .zip(&states)
                    .map(|(year, state)| {
                        let technology = &state.technologies[index];
                        TechnologyPeriodConfig {
                            year: *year,
                            share_weight: Some(technology.share_weight.value()),
                            fixed_output: technology.configured_fixed_output.map(Energy::value),
                            calibration_output: technology.calibration_output.map(Energy::value),
                            non_fuel_cost: Some(technology.non_fuel_cost.value()),
                            efficiency: Some(technology.efficiency.value()),
                        }
                    })
                    .collect();

                TechnologyConfig {
                    id: technology.id.clone(),
                    fuel: Some(technology.fuel.clone()),
                    efficiency: technology.efficiency.value(),
                    non_fuel_cost: technology.non_fuel_cost.value(),
                    share_weight: technology.share_weight.value(),
                    logit_exponent: technology.logit_exponent,
                    capture_fraction: technology.capture_fraction.value(),
                    emission_coefficients: technology
                        .emission_coefficients
                        .iter()
                        .map(|(gas, coeff)| (gas.clone(), coeff.value()))
                        .collect(),
                    periods,
                }
            })
            .collect();

        Self {
            id: subsector.id.clone(),
            fuel: subsector.fuel.clone(),
            unit: subsector.unit.clone(),
            kind,
            load_factor,
            tax: subsector.tax.value(),
            base_share_weight: subsector.base_share_weight.value(),
            logit_exponent: first.logit_exponent,
            capacity_limit: first.capacity_limit.value(),
            fuel_pref_elasticity: first.fuel_pref_elasticity,
            periods,
            technologies,
        }
    }
}
