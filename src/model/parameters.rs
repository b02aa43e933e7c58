//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::commodity::CommodityID;
use crate::input::{input_err_msg, is_sorted_and_unique, read_toml};
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_unit, String, "EJ".to_string());
define_param_default!(default_max_calibration_iterations, u32, 100);
define_param_default!(default_calibration_tolerance, f64, 1e-3);
define_param_default!(default_max_capacity_limit_iterations, u32, 10);

/// Represents the contents of the entire model file.
#[derive(Debug, Deserialize, PartialEq)]
pub struct ModelParameters {
    /// Milestone years, one per simulation period
    pub milestone_years: Vec<u32>,
    /// The region the sector belongs to
    pub region: String,
    /// The sector whose subsectors are modelled
    pub sector: String,
    /// The commodity produced by the sector
    pub product: String,
    /// Unit of the sector's output
    #[serde(default = "default_unit")]
    pub unit: String,
    /// Fuels which count towards primary energy consumption
    #[serde(default)]
    pub primary_fuels: Vec<CommodityID>,
    /// Ratio of GNP per capita to its base year value, one value per milestone year.
    ///
    /// If omitted, a value of 1 is used for every year.
    #[serde(default)]
    pub gnp_per_capita_scaler: Option<Vec<f64>>,
    /// The maximum number of share/calibration passes for a single period
    #[serde(default = "default_max_calibration_iterations")]
    pub max_calibration_iterations: u32,
    /// The relative tolerance within which calibrated outputs are considered converged
    #[serde(default = "default_calibration_tolerance")]
    pub calibration_tolerance: f64,
    /// The maximum number of passes used to resolve capacity limits
    #[serde(default = "default_max_capacity_limit_iterations")]
    pub max_capacity_limit_iterations: u32,
}

/// Check that the `milestone_years` parameter is valid
fn check_milestone_years(years: &[u32]) -> Result<()> {
    ensure!(!years.is_empty(), "`milestone_years` is empty");

    ensure!(
        is_sorted_and_unique(years),
        "`milestone_years` must be composed of unique values in order"
    );

    Ok(())
}

/// Check that the `gnp_per_capita_scaler` parameter is valid
fn check_gnp_per_capita_scaler(scalers: &[f64], num_years: usize) -> Result<()> {
    ensure!(
        scalers.len() == num_years,
        "`gnp_per_capita_scaler` must have one value per milestone year ({num_years})"
    );
    ensure!(
        scalers.iter().all(|scaler| scaler.is_finite() && *scaler > 0.0),
        "`gnp_per_capita_scaler` values must be finite numbers greater than zero"
    );

    Ok(())
}

/// Check that the `calibration_tolerance` parameter is valid
fn check_calibration_tolerance(value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "calibration_tolerance must be a finite number greater than or equal to zero"
    );

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_milestone_years(&self.milestone_years)?;

        if let Some(scalers) = &self.gnp_per_capita_scaler {
            check_gnp_per_capita_scaler(scalers, self.milestone_years.len())?;
        }

        ensure!(
            self.max_calibration_iterations > 0,
            "max_calibration_iterations cannot be zero"
        );
        ensure!(
            self.max_capacity_limit_iterations > 0,
            "max_capacity_limit_iterations cannot be zero"
        );
        check_calibration_tolerance(self.calibration_tolerance)?;

        if self.primary_fuels.is_empty() {
            warn!("No primary fuels given; primary energy consumption will be reported as zero");
        }

        Ok(())
    }
}
