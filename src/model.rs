//! The model represents the static input data provided by the user.
use crate::commodity::{CommodityPrices, GasTaxes};
use crate::input::input_err_msg;
use crate::sector::{RegionID, Sector, SectorID};
use crate::subsector::Subsector;
use crate::subsector::emissions::IndirectEmissionCoefficient;
use crate::units::{Dimensionless, Energy};
use anyhow::{Context, Result, ensure};
use std::path::{Path, PathBuf};

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
#[derive(Debug)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// The sector whose subsectors are simulated
    pub sector: Sector,
    /// Fuel prices for each milestone year, indexed by period
    pub fuel_prices: Vec<CommodityPrices>,
    /// Total sector demand for each milestone year, indexed by period
    pub demand: Vec<Energy>,
    /// Coefficients for indirect (upstream) emissions of fuels
    pub indirect_coefficients: Vec<IndirectEmissionCoefficient>,
    /// Taxes on greenhouse gases for each milestone year, indexed by period
    pub ghg_taxes: Vec<GasTaxes>,
}

impl Model {
    /// Assemble a model from its constituent input data.
    ///
    /// Every subsector is finalised with `complete_init` here, so the returned model is ready to
    /// run.
    pub fn new(
        model_dir: &Path,
        parameters: ModelParameters,
        mut subsectors: Vec<Subsector>,
        fuel_prices: Vec<CommodityPrices>,
        demand: Vec<Energy>,
        indirect_coefficients: Vec<IndirectEmissionCoefficient>,
        ghg_taxes: Vec<GasTaxes>,
    ) -> Result<Self> {
        let num_periods = parameters.milestone_years.len();
        ensure!(
            fuel_prices.len() == num_periods
                && demand.len() == num_periods
                && ghg_taxes.len() == num_periods,
            "Input data must be provided for each of the {num_periods} milestone years"
        );

        for subsector in &mut subsectors {
            subsector
                .complete_init()
                .with_context(|| input_err_msg(model_dir))?;
        }

        let sector = Sector::new(
            SectorID::new(&parameters.sector),
            RegionID::new(&parameters.region),
            subsectors,
        )?;

        Ok(Self {
            model_path: model_dir.to_path_buf(),
            parameters,
            sector,
            fuel_prices,
            demand,
            indirect_coefficients,
            ghg_taxes,
        })
    }

    /// The GNP per capita scaler for the given period (1 if not provided)
    pub fn gnp_per_capita_scaler(&self, period: usize) -> Dimensionless {
        self.parameters
            .gnp_per_capita_scaler
            .as_ref()
            .map_or(Dimensionless(1.0), |scalers| Dimensionless(scalers[period]))
    }
}
