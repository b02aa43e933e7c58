//! Code for writing metadata to file
use crate::model::Model;
use anyhow::Result;
use chrono::prelude::*;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// The output file name for metadata
const METADATA_FILE_NAME: &str = "metadata.toml";

#[derive(Serialize)]
struct Metadata<'a> {
    run: RunMetadata<'a>,
    program: ProgramMetadata,
    model: ModelMetadata<'a>,
}

/// Information about the model run
#[derive(Serialize)]
struct RunMetadata<'a> {
    /// Path to the model which was run
    model_path: &'a Path,
    /// The date and time on which the run started
    datetime: String,
}

impl<'a> RunMetadata<'a> {
    fn new(model_path: &'a Path) -> Self {
        let dt = Local::now();
        Self {
            model_path,
            datetime: dt.to_rfc2822(),
        }
    }
}

#[derive(Serialize)]
struct ProgramMetadata {
    /// The program name
    name: &'static str,
    /// The program version as specified in Cargo.toml
    version: &'static str,
    /// Whether it is a debug build
    is_debug: bool,
}

impl Default for ProgramMetadata {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME"),
            version: env!("CARGO_PKG_VERSION"),
            is_debug: cfg!(debug_assertions),
        }
    }
}

/// Information about the sector which was simulated
#[derive(Serialize)]
struct ModelMetadata<'a> {
    region: &'a str,
    sector: &'a str,
    product: &'a str,
    milestone_years: &'a [u32],
    num_subsectors: usize,
}

impl<'a> ModelMetadata<'a> {
    fn new(model: &'a Model) -> Self {
        Self {
            region: &model.parameters.region,
            sector: &model.parameters.sector,
            product: &model.parameters.product,
            milestone_years: &model.parameters.milestone_years,
            num_subsectors: model.sector.iter_subsectors().count(),
        }
    }
}

/// Write metadata to the specified output path in TOML format
pub fn write_metadata(output_path: &Path, model: &Model) -> Result<()> {
    let metadata = Metadata {
        run: RunMetadata::new(&model.model_path),
        program: ProgramMetadata::default(),
        model: ModelMetadata::new(model),
    };
    let file_path = output_path.join(METADATA_FILE_NAME);
    fs::write(&file_path, toml::to_string(&metadata)?)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::model;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_write_metadata(model: Model) {
        let dir = tempdir().unwrap();
        write_metadata(dir.path(), &model).unwrap();

        let contents = fs::read_to_string(dir.path().join(METADATA_FILE_NAME)).unwrap();
        let value: toml::Table = toml::from_str(&contents).unwrap();
        assert_eq!(value["program"]["name"].as_str(), Some(env!("CARGO_PKG_NAME")));
        assert_eq!(value["model"]["sector"].as_str(), Some("electricity"));
        assert_eq!(value["model"]["num_subsectors"].as_integer(), Some(2));
    }
}
