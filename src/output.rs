//! The module responsible for writing output data to disk.
use crate::commodity::{CommodityID, GasID};
use crate::input::subsector::{SubsectorConfig, SubsectorsFile};
use crate::sector::{PeriodSolution, Sector};
use crate::subsector::{Subsector, SubsectorID};
use crate::technology::TechnologyID;
use crate::units::Emissions;
use anyhow::{Context, Result, ensure};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "subsector_results";

/// The output file name for subsector results
const SUBSECTOR_RESULTS_FILE_NAME: &str = "subsector_results.csv";

/// The output file name for technology results
const TECHNOLOGY_RESULTS_FILE_NAME: &str = "technology_results.csv";

/// The output file name for emissions
const EMISSIONS_FILE_NAME: &str = "emissions.csv";

/// The output file name for fuel consumption
const FUEL_CONSUMPTION_FILE_NAME: &str = "fuel_consumption.csv";

/// The output file name for the state of subsectors at the end of each period
const SUBSECTOR_STATE_FILE_NAME: &str = "debug_subsector_state.csv";

/// The output file name for the calibrated subsector configuration
const SUBSECTORS_OUT_FILE_NAME: &str = "subsectors_out.toml";

/// Get the model name from the specified directory path
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data.
///
/// # Returns
///
/// `true` if an existing non-empty folder was overwritten, `false` otherwise.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    let mut overwritten = false;
    if output_dir.is_dir() {
        if output_dir.read_dir()?.next().is_none() {
            // Empty folder, so nothing to overwrite
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder {} already exists and is not empty. Use --overwrite to replace it.",
            output_dir.display()
        );
        fs::remove_dir_all(output_dir)?;
        overwritten = true;
    }

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwritten)
}

/// Represents a row in the subsector results CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SubsectorResultRow {
    milestone_year: u32,
    subsector_id: SubsectorID,
    share: f64,
    output: f64,
    input: f64,
    price: f64,
    fuel_price: f64,
    share_weight: f64,
    carbon_tax_paid: f64,
    primary_energy: f64,
}

impl SubsectorResultRow {
    fn new(milestone_year: u32, period: usize, subsector: &Subsector) -> Result<Self> {
        Ok(Self {
            milestone_year,
            subsector_id: subsector.id.clone(),
            share: subsector.get_share(period)?.value(),
            output: subsector.get_output(period)?.value(),
            input: subsector.get_input(period)?.value(),
            price: subsector.get_price(period)?.value(),
            fuel_price: subsector.get_fuel_price(period)?.value(),
            share_weight: subsector.get_share_weight(period)?.value(),
            carbon_tax_paid: subsector.get_total_carbon_tax_paid(period)?.value(),
            primary_energy: subsector.get_pe_cons(period)?.value(),
        })
    }
}

/// Represents a row in the technology results CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct TechnologyResultRow {
    milestone_year: u32,
    subsector_id: SubsectorID,
    technology_id: TechnologyID,
    fuel: CommodityID,
    share: f64,
    output: f64,
    input: f64,
    cost: f64,
    share_weight: f64,
}

/// Represents a row in the emissions CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct EmissionsRow {
    milestone_year: u32,
    subsector_id: SubsectorID,
    gas: GasID,
    direct: f64,
    indirect: f64,
}

/// Represents a row in the fuel consumption CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct FuelConsumptionRow {
    milestone_year: u32,
    subsector_id: SubsectorID,
    commodity_id: CommodityID,
    consumption: f64,
}

/// Represents a row in the subsector state CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct SubsectorStateRow {
    milestone_year: u32,
    subsector_id: SubsectorID,
    stage: String,
    raw_share: f64,
    share: f64,
    fixed_share: f64,
    cap_limited: bool,
    calibrated: bool,
    iterations: u32,
    converged: bool,
}

/// For writing extra debug information about the model
struct DebugDataWriter {
    subsector_state_writer: csv::Writer<File>,
}

impl DebugDataWriter {
    /// Open CSV files to write debug info to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    fn create(output_path: &Path) -> Result<Self> {
        let file_path = output_path.join(SUBSECTOR_STATE_FILE_NAME);

        Ok(Self {
            subsector_state_writer: csv::Writer::from_path(file_path)?,
        })
    }

    /// Write the state of every subsector at the end of a period
    fn write_subsector_state(
        &mut self,
        milestone_year: u32,
        period: usize,
        sector: &Sector,
        solution: &PeriodSolution,
    ) -> Result<()> {
        for subsector in sector.iter_subsectors() {
            let state = subsector.period_state(period)?;
            let row = SubsectorStateRow {
                milestone_year,
                subsector_id: subsector.id.clone(),
                stage: state.stage.to_string(),
                raw_share: state.raw_share.value(),
                share: state.share.value(),
                fixed_share: state.fixed_share.value(),
                cap_limited: state.cap_limited,
                calibrated: state.calibration_status,
                iterations: solution.iterations,
                converged: solution.converged,
            };
            self.subsector_state_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Flush the underlying streams
    fn flush(&mut self) -> Result<()> {
        self.subsector_state_writer.flush()?;

        Ok(())
    }
}

/// An object for writing the results of each period to file
pub struct DataWriter {
    subsectors_writer: csv::Writer<File>,
    technologies_writer: csv::Writer<File>,
    emissions_writer: csv::Writer<File>,
    fuel_consumption_writer: csv::Writer<File>,
    debug_writer: Option<DebugDataWriter>,
}

impl DataWriter {
    /// Open CSV files to write output data to
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `save_debug_info` - Whether to include extra CSV files for debugging model
    pub fn create(output_path: &Path, save_debug_info: bool) -> Result<Self> {
        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(file_path)
        };

        let debug_writer = if save_debug_info {
            // Create debug CSV files
            Some(DebugDataWriter::create(output_path)?)
        } else {
            None
        };

        Ok(Self {
            subsectors_writer: new_writer(SUBSECTOR_RESULTS_FILE_NAME)?,
            technologies_writer: new_writer(TECHNOLOGY_RESULTS_FILE_NAME)?,
            emissions_writer: new_writer(EMISSIONS_FILE_NAME)?,
            fuel_consumption_writer: new_writer(FUEL_CONSUMPTION_FILE_NAME)?,
            debug_writer,
        })
    }

    /// Write all results for a solved period
    pub fn write_period(
        &mut self,
        milestone_year: u32,
        period: usize,
        sector: &Sector,
        solution: &PeriodSolution,
    ) -> Result<()> {
        self.write_subsectors(milestone_year, period, sector)?;
        self.write_technologies(milestone_year, period, sector)?;
        self.write_emissions(milestone_year, period, sector)?;
        self.write_fuel_consumption(milestone_year, period, sector)?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.write_subsector_state(milestone_year, period, sector, solution)?;
        }

        Ok(())
    }

    /// Write subsector results to a CSV file
    fn write_subsectors(
        &mut self,
        milestone_year: u32,
        period: usize,
        sector: &Sector,
    ) -> Result<()> {
        for subsector in sector.iter_subsectors() {
            let row = SubsectorResultRow::new(milestone_year, period, subsector)?;
            self.subsectors_writer.serialize(row)?;
        }

        Ok(())
    }

    /// Write technology results to a CSV file
    fn write_technologies(
        &mut self,
        milestone_year: u32,
        period: usize,
        sector: &Sector,
    ) -> Result<()> {
        for subsector in sector.iter_subsectors() {
            for technology in subsector.technologies(period)? {
                let row = TechnologyResultRow {
                    milestone_year,
                    subsector_id: subsector.id.clone(),
                    technology_id: technology.id.clone(),
                    fuel: technology.fuel.clone(),
                    share: technology.share().value(),
                    output: technology.output().value(),
                    input: technology.input().value(),
                    cost: technology.cost().value(),
                    share_weight: technology.share_weight.value(),
                };
                self.technologies_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Write direct and indirect emissions to a CSV file
    fn write_emissions(
        &mut self,
        milestone_year: u32,
        period: usize,
        sector: &Sector,
    ) -> Result<()> {
        for subsector in sector.iter_subsectors() {
            let direct = subsector.get_emission(period)?;
            let indirect = subsector.get_em_ind_map(period)?;
            let gases: IndexSet<_> = direct.keys().chain(indirect.keys()).collect();
            for gas in gases {
                let row = EmissionsRow {
                    milestone_year,
                    subsector_id: subsector.id.clone(),
                    gas: gas.clone(),
                    direct: direct.get(gas).copied().unwrap_or(Emissions(0.0)).value(),
                    indirect: indirect.get(gas).copied().unwrap_or(Emissions(0.0)).value(),
                };
                self.emissions_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Write fuel consumption to a CSV file
    fn write_fuel_consumption(
        &mut self,
        milestone_year: u32,
        period: usize,
        sector: &Sector,
    ) -> Result<()> {
        for subsector in sector.iter_subsectors() {
            for (commodity_id, consumption) in subsector.get_fuel_cons(period)? {
                let row = FuelConsumptionRow {
                    milestone_year,
                    subsector_id: subsector.id.clone(),
                    commodity_id: commodity_id.clone(),
                    consumption: consumption.value(),
                };
                self.fuel_consumption_writer.serialize(row)?;
            }
        }

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.subsectors_writer.flush()?;
        self.technologies_writer.flush()?;
        self.emissions_writer.flush()?;
        self.fuel_consumption_writer.flush()?;
        if let Some(wtr) = &mut self.debug_writer {
            wtr.flush()?;
        }

        Ok(())
    }
}

/// Write the subsector configuration, including calibrated share weights, to a TOML file.
///
/// The file has the same format as the `subsectors.toml` input file, so it can be used as the
/// input for a later run.
pub fn write_subsectors_file(
    output_path: &Path,
    sector: &Sector,
    milestone_years: &[u32],
) -> Result<()> {
    let file = SubsectorsFile {
        subsectors: sector
            .iter_subsectors()
            .map(|subsector| SubsectorConfig::from_subsector(subsector, milestone_years))
            .collect(),
    };
    let file_path = output_path.join(SUBSECTORS_OUT_FILE_NAME);
    fs::write(&file_path, toml::to_string(&file)?)
        .with_context(|| format!("Could not write {}", file_path.display()))?;

    Ok(())
}
