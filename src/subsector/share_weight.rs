//! Interpolation and scaling of share weights across periods.
use super::Subsector;
use crate::units::Dimensionless;
use anyhow::{Result, ensure};
use log::debug;

/// Linearly interpolate between two values
fn interpolate(start: Dimensionless, end: Dimensionless, fraction: f64) -> Dimensionless {
    start + (end - start) * Dimensionless(fraction)
}

impl Subsector {
    /// Linearly interpolate subsector and technology share weights between two periods.
    ///
    /// Weights in the periods strictly between `begin` and `end` are replaced; the weights in
    /// `begin` and `end` themselves are unchanged. Does nothing if `end <= begin`.
    pub fn share_weight_interp(&mut self, begin: usize, end: usize) -> Result<()> {
        if end <= begin {
            debug!(
                "Not interpolating share weights for subsector {}: end period {end} is not after \
                begin period {begin}",
                self.id
            );
            return Ok(());
        }

        let start_state = self.period_state(begin)?;
        let end_state = self.period_state(end)?;
        let start_weight = start_state.share_weight;
        let end_weight = end_state.share_weight;
        let tech_weights: Vec<_> = start_state
            .technologies
            .iter()
            .zip(&end_state.technologies)
            .map(|(start, end)| (start.share_weight, end.share_weight))
            .collect();

        let num_steps = (end - begin) as f64;
        for period in (begin + 1)..end {
            let fraction = (period - begin) as f64 / num_steps;
            let state = self.period_state_mut(period)?;
            state.share_weight = interpolate(start_weight, end_weight, fraction);
            for (technology, (start, end)) in state.technologies.iter_mut().zip(&tech_weights) {
                technology.share_weight = interpolate(*start, *end, fraction);
            }
        }

        debug!(
            "Interpolated share weights for subsector {} between periods {begin} and {end}",
            self.id
        );

        Ok(())
    }

    /// Copy subsector and technology share weights from `period` into every later period
    pub fn hold_share_weights(&mut self, period: usize) -> Result<()> {
        let state = self.period_state(period)?;
        let weight = state.share_weight;
        let tech_weights: Vec<_> = state
            .technologies
            .iter()
            .map(|tech| tech.share_weight)
            .collect();

        for state in self.periods.iter_mut().skip(period + 1) {
            state.share_weight = weight;
            for (technology, weight) in state.technologies.iter_mut().zip(&tech_weights) {
                technology.share_weight = *weight;
            }
        }

        Ok(())
    }

    /// Rescale technology share weights so that the mean non-zero weight is one.
    ///
    /// Technology shares are unaffected, as all weights are multiplied by the same factor.
    pub(super) fn share_weight_scale(&mut self, period: usize) -> Result<()> {
        let id = self.id.clone();
        let state = self.period_state_mut(period)?;
        let total: Dimensionless = state
            .technologies
            .iter()
            .map(|tech| tech.share_weight)
            .sum();
        ensure!(
            total.value() >= 0.0,
            "Total technology share weight for subsector {id} in period {period} is negative \
            ({total})"
        );
        if total.value() == 0.0 {
            return Ok(());
        }

        let num_nonzero = state
            .technologies
            .iter()
            .filter(|tech| tech.share_weight.value() > 0.0)
            .count();
        let factor = Dimensionless(num_nonzero as f64) / total;
        for technology in &mut state.technologies {
            technology.scale_share_weight(factor);
        }

        Ok(())
    }

    /// The subsector share weight for the period
    pub fn get_share_weight(&self, period: usize) -> Result<Dimensionless> {
        Ok(self.period_state(period)?.share_weight)
    }

    /// Whether the share weight for the period was given in the input data
    pub fn is_share_weight_from_input(&self, period: usize) -> Result<bool> {
        Ok(self.period_state(period)?.share_weight_from_input)
    }
}
