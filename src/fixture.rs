//! Fixtures for tests

use crate::commodity::{CO2, CommodityPrices, GasID, GasTaxes};
use crate::model::{Model, ModelParameters};
use crate::period::PeriodState;
use crate::sector::{PeriodInputs, Sector, SolverOptions};
use crate::subsector::{Subsector, SubsectorKind};
use crate::technology::Technology;
use crate::units::{Dimensionless, EmissionsPerEnergy, Energy, MoneyPerEnergy};
use indexmap::indexmap;
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

#[fixture]
pub fn technology() -> Technology {
    let mut technology = Technology::new(
        "coal_steam".into(),
        "coal".into(),
        Dimensionless(0.5),
        MoneyPerEnergy(1.0),
    );
    technology.emission_coefficients = indexmap! { GasID::new(CO2) => EmissionsPerEnergy(2.0) };
    technology
}

/// Build a subsector with `num_periods` identical periods, each with the given technologies
pub fn build_subsector(id: &str, technologies: Vec<Technology>, num_periods: usize) -> Subsector {
    let state = PeriodState {
        technologies,
        ..Default::default()
    };
    let mut subsector = Subsector::new(
        id.into(),
        "USA".into(),
        "electricity".into(),
        "coal".into(),
        SubsectorKind::Standard,
        vec![state; num_periods],
    );
    subsector.complete_init().unwrap();
    subsector
}

#[fixture]
pub fn subsector(technology: Technology) -> Subsector {
    let mut igcc = technology.clone();
    igcc.id = "coal_igcc".into();
    build_subsector("coal", vec![technology, igcc], 2)
}

/// A second subsector burning gas, with a single technology
#[fixture]
pub fn gas_subsector(technology: Technology) -> Subsector {
    let mut gas = technology;
    gas.id = "gas_cc".into();
    gas.fuel = "gas".into();
    gas.emission_coefficients = indexmap! { GasID::new(CO2) => EmissionsPerEnergy(1.0) };
    let mut subsector = build_subsector("gas", vec![gas], 2);
    subsector.fuel = "gas".into();
    subsector
}

#[fixture]
pub fn fuel_prices() -> CommodityPrices {
    [
        ("coal".into(), MoneyPerEnergy(2.0)),
        ("gas".into(), MoneyPerEnergy(2.0)),
    ]
    .into_iter()
    .collect()
}

#[fixture]
pub fn sector(subsector: Subsector, gas_subsector: Subsector) -> Sector {
    Sector::new(
        "electricity".into(),
        "USA".into(),
        vec![subsector, gas_subsector],
    )
    .unwrap()
}

/// Total demand for the sector fixture's output
#[fixture]
pub fn demand() -> Energy {
    Energy(100.0)
}

#[fixture]
pub fn options() -> SolverOptions {
    SolverOptions {
        product: "electricity".into(),
        primary_fuels: vec!["coal".into(), "gas".into()],
        max_calibration_iterations: 100,
        calibration_tolerance: 1e-3,
        max_capacity_limit_iterations: 10,
    }
}

/// The sector fixture with its first period solved
#[fixture]
pub fn solved_sector(
    mut sector: Sector,
    demand: Energy,
    fuel_prices: CommodityPrices,
    options: SolverOptions,
) -> Sector {
    let ghg_taxes = GasTaxes::new();
    let inputs = PeriodInputs {
        demand,
        fuel_prices: &fuel_prices,
        ghg_taxes: &ghg_taxes,
        gnp_per_capita_scaler: Dimensionless(1.0),
        indirect_coefficients: &[],
    };
    sector.solve_period(0, &inputs, &options).unwrap();
    sector
}

#[fixture]
pub fn model(
    subsector: Subsector,
    gas_subsector: Subsector,
    fuel_prices: CommodityPrices,
) -> Model {
    let parameters = ModelParameters {
        milestone_years: vec![2010, 2020],
        region: "USA".into(),
        sector: "electricity".into(),
        product: "electricity".into(),
        unit: "EJ".into(),
        primary_fuels: vec!["coal".into(), "gas".into()],
        gnp_per_capita_scaler: None,
        max_calibration_iterations: 100,
        calibration_tolerance: 1e-3,
        max_capacity_limit_iterations: 10,
    };
    Model::new(
        std::path::Path::new("model"),
        parameters,
        vec![subsector, gas_subsector],
        vec![fuel_prices.clone(), fuel_prices],
        vec![Energy(100.0), Energy(120.0)],
        Vec::new(),
        vec![GasTaxes::new(); 2],
    )
    .unwrap()
}
