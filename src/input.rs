//! Common routines for handling input data.
use crate::model::{Model, ModelParameters};
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod demand;
use demand::read_demand;
pub mod emissions;
use emissions::{read_ghg_taxes, read_indirect_emission_coefficients};
pub mod price;
use price::read_fuel_prices;
pub mod subsector;
use subsector::read_subsectors;

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    if vec.is_empty() {
        bail!("CSV file {} cannot be empty", file_path.display());
    }
    Ok(vec.into_iter())
}

/// Read a series of type `T`s from a CSV file.
///
/// A missing file is treated as empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv_optional<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    if !file_path.exists() {
        return Ok(Vec::new().into_iter());
    }

    let vec = read_csv_internal(file_path)?;
    Ok(vec.into_iter())
}

fn read_csv_internal<'a, T: DeserializeOwned + 'a>(file_path: &'a Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;
    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Indicates that the iterator is sorted and contains no duplicates
pub fn is_sorted_and_unique<T, I>(iter: I) -> bool
where
    T: PartialOrd + Clone,
    I: IntoIterator<Item = T>,
{
    iter.into_iter().tuple_windows().all(|(a, b)| a < b)
}

/// Check that a value is a finite proportion in the range [0, 1]
pub fn check_proportion(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && (0.0..=1.0).contains(&value),
        "{name} must be between 0 and 1 (got {value})"
    );

    Ok(())
}

/// Check that a value is finite and non-negative
pub fn check_non_negative(value: f64, name: &str) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number >= 0 (got {value})"
    );

    Ok(())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The static model data or an error if any of the input files are invalid.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let years = &parameters.milestone_years;

    let subsectors = read_subsectors(model_dir, &parameters)?;
    let fuels = subsectors
        .iter()
        .flat_map(|subsector| subsector.iter_fuels())
        .cloned()
        .collect();
    let fuel_prices = read_fuel_prices(model_dir, &fuels, years)?;
    let demand = read_demand(model_dir, years)?;
    let indirect_coefficients = read_indirect_emission_coefficients(model_dir)?;
    let ghg_taxes = read_ghg_taxes(model_dir, years)?;

    Model::new(
        model_dir,
        parameters,
        subsectors,
        fuel_prices,
        demand,
        indirect_coefficients,
        ghg_taxes,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Record {
        id: String,
        value: u32,
    }

    #[test]
    fn test_read_csv() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value\nhello,1\nworld, 2").unwrap();
        }

        let records: Vec<Record> = read_csv(&file_path).unwrap().collect();
        assert_eq!(
            records,
            &[
                Record {
                    id: "hello".to_string(),
                    value: 1,
                },
                Record {
                    id: "world".to_string(),
                    value: 2,
                }
            ]
        );
    }

    #[test]
    fn test_read_csv_empty() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "id,value").unwrap();
        }

        assert!(read_csv::<Record>(&file_path).is_err());
        assert_eq!(read_csv_optional::<Record>(&file_path).unwrap().count(), 0);
    }

    #[test]
    fn test_read_csv_optional_missing() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("missing.csv");
        assert_eq!(read_csv_optional::<Record>(&file_path).unwrap().count(), 0);
    }

    #[test]
    fn test_read_toml() {
        #[derive(Debug, PartialEq, Deserialize)]
        struct Parameters {
            years: Vec<u32>,
        }

        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test.toml");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "years = [1990, 2005]").unwrap();
        }

        let params: Parameters = read_toml(&file_path).unwrap();
        assert_eq!(params.years, [1990, 2005]);

        // Missing file
        assert!(read_toml::<Parameters>(&dir.path().join("none.toml")).is_err());
    }

    #[test]
    fn test_is_sorted_and_unique() {
        assert!(is_sorted_and_unique([1, 2, 3]));
        assert!(is_sorted_and_unique::<u32, _>([]));
        assert!(!is_sorted_and_unique([1, 1]));
        assert!(!is_sorted_and_unique([2, 1]));
    }

    #[test]
    fn test_check_proportion() {
        assert!(check_proportion(0.0, "x").is_ok());
        assert!(check_proportion(1.0, "x").is_ok());
        assert!(check_proportion(1.1, "x").is_err());
        assert!(check_proportion(-0.1, "x").is_err());
        assert!(check_proportion(f64::NAN, "x").is_err());
    }

    #[test]
    fn test_load_model() {
        let model = load_model("demos/simple").unwrap();
        assert_eq!(model.parameters.milestone_years, [2005, 2020, 2035]);
        assert_eq!(model.sector.iter_subsectors().count(), 3);
        assert_eq!(model.demand.len(), 3);
        assert_eq!(model.indirect_coefficients.len(), 2);
        assert!(model.ghg_taxes[0].is_empty());
    }
}
