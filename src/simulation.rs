//! Functionality for running the subsector share simulation.
use crate::model::Model;
use crate::output::metadata::write_metadata;
use crate::output::{DataWriter, write_subsectors_file};
use crate::sector::{PeriodInputs, SolverOptions};
use anyhow::{Context, Result};
use log::info;
use std::path::Path;

/// Run the simulation.
///
/// Each milestone year is solved in turn. Calibrated share weights are carried forward into later
/// years before those years are solved.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `output_path` - The folder to which output files will be written
/// * `debug_model` - Whether to write additional information (e.g. subsector state) to file
pub fn run(mut model: Model, output_path: &Path, debug_model: bool) -> Result<()> {
    let mut writer = DataWriter::create(output_path, debug_model)?;
    write_metadata(output_path, &model).context("Failed to save metadata")?;

    let options = SolverOptions::from(&model.parameters);
    let years = model.parameters.milestone_years.clone();
    for (period, year) in years.iter().copied().enumerate() {
        info!("Milestone year: {year}");

        let inputs = PeriodInputs {
            demand: model.demand[period],
            fuel_prices: &model.fuel_prices[period],
            ghg_taxes: &model.ghg_taxes[period],
            gnp_per_capita_scaler: model.gnp_per_capita_scaler(period),
            indirect_coefficients: &model.indirect_coefficients,
        };
        let solution = model
            .sector
            .solve_period(period, &inputs, &options)
            .with_context(|| format!("Failed to solve milestone year {year}"))?;

        writer.write_period(year, period, &model.sector, &solution)?;
        model.sector.interpolate_after_calibration(period)?;
    }

    writer.flush()?;
    write_subsectors_file(output_path, &model.sector, &years)?;

    Ok(())
}
