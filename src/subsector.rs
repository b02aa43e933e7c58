//! Subsectors are groups of competing technologies within a sector.
//!
//! A [`Subsector`] owns one [`PeriodState`] per simulation period, which in turn owns the
//! technologies for that period. The owning sector drives each period through the pipeline
//! described by [`PeriodStage`], using the operations defined across this module's submodules:
//!
//! * [`share`] - logit share calculation, normalisation and capacity limits
//! * [`share_weight`] - share weight interpolation and scaling
//! * [`fixed`] - exogenously fixed supply
//! * [`calibration`] - calibration of share weights to historical outputs
//! * [`allocation`] - distribution of output among technologies
//! * [`emissions`] - emissions and greenhouse gas taxes
use crate::commodity::{CommodityID, CommodityPrices};
use crate::id::define_id_type;
use crate::period::{PeriodStage, PeriodState};
use crate::sector::{RegionID, SectorID};
use crate::technology::{Technology, TechnologyID};
use crate::units::{Dimensionless, Energy, Money, MoneyPerEnergy};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;
use log::debug;

pub mod allocation;
pub mod calibration;
pub mod emissions;
pub mod fixed;
pub mod share;
pub mod share_weight;

define_id_type! {SubsectorID}

/// The default logit exponent for subsectors
pub const DEFAULT_SUBSECTOR_LOGIT_EXPONENT: f64 = -3.0;

/// The variant of a subsector, which determines how prices and demands are converted
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SubsectorKind {
    /// Output is measured in the same units as sector demand
    Standard,
    /// Output is measured in vehicle units, each of which provides `load_factor` units of service
    Transport {
        /// Units of service provided per unit of vehicle output
        load_factor: Dimensionless,
    },
}

impl SubsectorKind {
    /// Convert a cost per unit of subsector output into a price per unit of service
    pub fn service_price(&self, cost: MoneyPerEnergy) -> MoneyPerEnergy {
        match self {
            Self::Standard => cost,
            Self::Transport { load_factor } => cost / *load_factor,
        }
    }

    /// Convert a demand for service into subsector output
    pub fn output_for_service(&self, service: Energy) -> Energy {
        match self {
            Self::Standard => service,
            Self::Transport { load_factor } => service / *load_factor,
        }
    }

    /// Convert subsector output into the service it provides
    pub fn service_for_output(&self, output: Energy) -> Energy {
        match self {
            Self::Standard => output,
            Self::Transport { load_factor } => output * *load_factor,
        }
    }
}

/// Lookup table from technology ID to the technology's index in each period.
///
/// Built once by [`Subsector::complete_init`] and not modified afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechnologyIndex(IndexMap<TechnologyID, usize>);

impl TechnologyIndex {
    /// Build the index from a list of technologies, checking that IDs are unique
    fn build(technologies: &[Technology]) -> Result<Self> {
        let mut map = IndexMap::new();
        for (idx, technology) in technologies.iter().enumerate() {
            ensure!(
                map.insert(technology.id.clone(), idx).is_none(),
                "Duplicate technology ID {}",
                technology.id
            );
        }

        Ok(Self(map))
    }

    /// Get the index of the technology with the given ID
    pub fn get(&self, id: &str) -> Option<usize> {
        self.0.get(id).copied()
    }

    /// The number of technologies
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no technologies
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterate over technology IDs in index order
    pub fn iter_ids(&self) -> impl Iterator<Item = &TechnologyID> {
        self.0.keys()
    }
}

/// A group of competing technologies producing a common output within a sector
#[derive(Debug, Clone, PartialEq)]
pub struct Subsector {
    /// Unique identifier for the subsector (e.g. "coal")
    pub id: SubsectorID,
    /// The region the subsector belongs to
    pub region_id: RegionID,
    /// The sector the subsector belongs to
    pub sector_id: SectorID,
    /// The fuel type of the subsector
    pub fuel: CommodityID,
    /// Unit of the subsector's output
    pub unit: String,
    /// Tax (or subsidy, if negative) added to the subsector price
    pub tax: MoneyPerEnergy,
    /// Share weight used for periods which don't specify one
    pub base_share_weight: Dimensionless,
    /// The variant of the subsector
    pub kind: SubsectorKind,
    periods: Vec<PeriodState>,
    technology_index: TechnologyIndex,
}

impl Subsector {
    /// Create a new subsector from its configuration.
    ///
    /// [`Subsector::complete_init`] must be called before the subsector is used.
    pub fn new(
        id: SubsectorID,
        region_id: RegionID,
        sector_id: SectorID,
        fuel: CommodityID,
        kind: SubsectorKind,
        periods: Vec<PeriodState>,
    ) -> Self {
        Self {
            id,
            region_id,
            sector_id,
            fuel,
            unit: "EJ".into(),
            tax: MoneyPerEnergy(0.0),
            base_share_weight: Dimensionless(1.0),
            kind,
            periods,
            technology_index: TechnologyIndex::default(),
        }
    }

    /// Finalise the subsector after it has been populated from configuration.
    ///
    /// Validates the per-period data and builds the technology lookup table. Every period must
    /// contain the same technologies in the same order.
    pub fn complete_init(&mut self) -> Result<()> {
        ensure!(
            !self.periods.is_empty(),
            "Subsector {} has no periods",
            self.id
        );
        if let SubsectorKind::Transport { load_factor } = self.kind {
            ensure!(
                load_factor.is_finite() && load_factor.value() > 0.0,
                "Load factor for subsector {} must be greater than zero",
                self.id
            );
        }

        let technology_index = TechnologyIndex::build(&self.periods[0].technologies)
            .with_context(|| format!("Invalid technologies for subsector {}", self.id))?;
        ensure!(
            !technology_index.is_empty(),
            "Subsector {} has no technologies",
            self.id
        );

        for (period, state) in self.periods.iter().enumerate() {
            validate_period(state, &technology_index).with_context(|| {
                format!("Invalid data for subsector {} in period {period}", self.id)
            })?;
        }

        debug!(
            "Initialised subsector {} with technologies: {}",
            self.id,
            technology_index.iter_ids().join(", ")
        );
        self.technology_index = technology_index;

        Ok(())
    }

    /// The lookup table for technologies
    pub fn technology_index(&self) -> &TechnologyIndex {
        &self.technology_index
    }

    /// The number of simulation periods
    pub fn num_periods(&self) -> usize {
        self.periods.len()
    }

    /// Iterate over the fuels consumed by the subsector's technologies
    pub fn iter_fuels(&self) -> impl Iterator<Item = &CommodityID> {
        self.periods
            .iter()
            .flat_map(|state| state.technologies.iter().map(|tech| &tech.fuel))
            .collect::<IndexSet<_>>()
            .into_iter()
    }

    /// Get the state for the given period
    pub fn period_state(&self, period: usize) -> Result<&PeriodState> {
        self.periods.get(period).with_context(|| {
            format!(
                "Period {period} is out of range for subsector {} ({} periods)",
                self.id,
                self.periods.len()
            )
        })
    }

    /// Get the state for the given period, mutably
    pub(crate) fn period_state_mut(&mut self, period: usize) -> Result<&mut PeriodState> {
        let num_periods = self.periods.len();
        self.periods.get_mut(period).with_context(|| {
            format!(
                "Period {period} is out of range for subsector {} ({num_periods} periods)",
                self.id
            )
        })
    }

    /// Iterate over the per-period states
    pub fn iter_periods(&self) -> impl Iterator<Item = &PeriodState> {
        self.periods.iter()
    }

    /// The pipeline stage reached in the given period
    pub fn stage(&self, period: usize) -> Result<PeriodStage> {
        Ok(self.period_state(period)?.stage)
    }

    /// The technologies for the given period
    pub fn technologies(&self, period: usize) -> Result<&[Technology]> {
        Ok(&self.period_state(period)?.technologies)
    }

    /// Look up a technology by ID in the given period
    pub fn technology(&self, period: usize, id: &str) -> Result<&Technology> {
        let idx = self
            .technology_index
            .get(id)
            .with_context(|| format!("Unknown technology {id} in subsector {}", self.id))?;
        Ok(&self.period_state(period)?.technologies[idx])
    }

    /// Prepare a period for solving.
    ///
    /// Resets the pipeline stage and derives the calibration status for the period.
    pub fn init_calc(&mut self, period: usize) -> Result<()> {
        let state = self.period_state_mut(period)?;
        state.stage = PeriodStage::Uninitialized;
        state.iterations = 0;
        self.set_calibration_status(period)
    }

    /// Calculate technology costs and shares and the resulting subsector price.
    ///
    /// The price is the share-weighted technology cost (per unit of service for transport
    /// subsectors) plus the subsector tax.
    pub fn calc_price(&mut self, period: usize, fuel_prices: &CommodityPrices) -> Result<()> {
        let id = self.id.clone();
        let kind = self.kind;
        let tax = self.tax;
        let state = self.period_state_mut(period)?;
        state.stage.check_not_terminal("calculate price")?;

        for technology in &mut state.technologies {
            let fuel_price = fuel_prices
                .get(&technology.fuel)
                .with_context(|| format!("Cannot calculate price for subsector {id}"))?;
            technology.calc_cost(fuel_price);
        }
        allocation::calc_tech_shares(&mut state.technologies);

        let cost: MoneyPerEnergy = state
            .technologies
            .iter()
            .map(|tech| tech.cost() * tech.share())
            .sum();
        state.price = kind.service_price(cost) + tax;
        state.fuel_price = state
            .technologies
            .iter()
            .map(|tech| tech.fuel_cost() * tech.share())
            .sum();

        Ok(())
    }

    /// The subsector price
    pub fn get_price(&self, period: usize) -> Result<MoneyPerEnergy> {
        Ok(self.period_state(period)?.price)
    }

    /// The fuel component of the subsector price
    pub fn get_fuel_price(&self, period: usize) -> Result<MoneyPerEnergy> {
        Ok(self.period_state(period)?.fuel_price)
    }

    /// The fuel price weighted by the subsector's share in the previous period (or the current
    /// period, for the first period)
    pub fn get_wt_fuel_price(&self, period: usize) -> Result<MoneyPerEnergy> {
        let lagged = period.saturating_sub(1);
        let share = self.period_state(lagged)?.share;
        Ok(self.period_state(period)?.fuel_price * share)
    }

    /// The subsector output
    pub fn get_output(&self, period: usize) -> Result<Energy> {
        Ok(self.period_state(period)?.output)
    }

    /// The subsector fuel input
    pub fn get_input(&self, period: usize) -> Result<Energy> {
        Ok(self.period_state(period)?.input)
    }

    /// Primary energy consumption, as of the last call to [`Subsector::update_summary`]
    pub fn get_pe_cons(&self, period: usize) -> Result<Energy> {
        Ok(self.period_state(period)?.primary_energy_consumption)
    }

    /// Greenhouse gas taxes paid by the subsector's technologies
    pub fn get_total_carbon_tax_paid(&self, period: usize) -> Result<Money> {
        Ok(self.period_state(period)?.carbon_tax_paid)
    }

    /// Update the reporting summary for the period, which finalises the period.
    ///
    /// # Arguments
    ///
    /// * `period` - The period index
    /// * `primary_fuels` - Fuels which count towards primary energy consumption
    pub fn update_summary(&mut self, period: usize, primary_fuels: &[CommodityID]) -> Result<()> {
        let state = self.period_state_mut(period)?;
        state
            .stage
            .check("update summary", &[PeriodStage::EmissionsComputed])?;

        state.summary.clear_fuel_consumption();
        let mut primary_energy = Energy(0.0);
        for technology in &state.technologies {
            state
                .summary
                .add_fuel_consumption(&technology.fuel, technology.input());
            if primary_fuels.contains(&technology.fuel) {
                primary_energy += technology.input();
            }
        }
        state.primary_energy_consumption = primary_energy;
        state.stage = PeriodStage::SummaryUpdated;

        Ok(())
    }
}

/// Check the data for a single period against the technology index
fn validate_period(state: &PeriodState, technology_index: &TechnologyIndex) -> Result<()> {
    ensure!(
        state.capacity_limit.is_finite() && (0.0..=1.0).contains(&state.capacity_limit.value()),
        "Capacity limit must be between 0 and 1"
    );
    ensure!(
        state.share_weight.is_finite() && state.share_weight.value() >= 0.0,
        "Share weight cannot be negative"
    );
    ensure!(
        state.logit_exponent.is_finite() && state.logit_exponent <= 0.0,
        "Logit exponent must be less than or equal to zero"
    );
    ensure!(
        state.fuel_pref_elasticity.is_finite(),
        "Fuel preference elasticity must be finite"
    );
    if let Some(value) = state.calibration_output {
        ensure!(
            value.is_finite() && value.value() >= 0.0,
            "Calibration output cannot be negative"
        );
    }

    ensure!(
        state.technologies.len() == technology_index.len()
            && state
                .technologies
                .iter()
                .zip(technology_index.iter_ids())
                .all(|(tech, id)| tech.id == *id),
        "Every period must contain the same technologies in the same order"
    );

    for technology in &state.technologies {
        validate_technology(technology)
            .with_context(|| format!("Invalid data for technology {}", technology.id))?;
    }

    Ok(())
}

/// Check that a technology's parameters are valid
fn validate_technology(technology: &Technology) -> Result<()> {
    ensure!(
        technology.efficiency.is_finite() && technology.efficiency.value() > 0.0,
        "Efficiency must be greater than zero"
    );
    ensure!(
        technology.non_fuel_cost.is_finite() && technology.non_fuel_cost.value() >= 0.0,
        "Non-fuel cost cannot be negative"
    );
    ensure!(
        technology.share_weight.is_finite() && technology.share_weight.value() >= 0.0,
        "Share weight cannot be negative"
    );
    ensure!(
        technology.logit_exponent.is_finite() && technology.logit_exponent <= 0.0,
        "Logit exponent must be less than or equal to zero"
    );
    ensure!(
        (0.0..=1.0).contains(&technology.capture_fraction.value()),
        "Capture fraction must be between 0 and 1"
    );
    for value in [technology.configured_fixed_output, technology.calibration_output]
        .into_iter()
        .flatten()
    {
        ensure!(
            value.is_finite() && value.value() >= 0.0,
            "Fixed and calibration outputs cannot be negative"
        );
    }

    Ok(())
}
