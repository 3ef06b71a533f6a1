//! Versioned capital market assumption snapshots

use jiff::civil::Date;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use super::asset::AssetClass;
use super::correlation::CorrelationMatrix;
use super::ids::{AssetClassId, AssumptionSetId};
use super::inflation::InflationModel;
use super::regime::RegimeModel;
use crate::error::{LookupError, MatrixError, SimulationError};

/// Immutable snapshot of expected returns, volatilities, correlations,
/// inflation and regime assumptions. Runs reference a snapshot by
/// [`AssumptionSetId`]; updated assumptions get a new version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketAssumptionSet {
    pub id: AssumptionSetId,
    pub as_of: Date,
    pub asset_classes: Vec<AssetClass>,
    /// Ordered the same as `asset_classes`
    pub correlation: CorrelationMatrix,
    #[serde(default)]
    pub inflation: InflationModel,
    /// Annual risk-free rate used for Sharpe/Sortino ratios
    #[serde(default)]
    pub risk_free_rate: f64,
    #[serde(default)]
    pub regimes: Option<RegimeModel>,
}

impl MarketAssumptionSet {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if self.asset_classes.is_empty() {
            return Err(SimulationError::config(format!(
                "assumption set {} has no asset classes",
                self.id
            )));
        }
        let mut seen = FxHashSet::default();
        for asset in &self.asset_classes {
            if !seen.insert(&asset.id) {
                return Err(SimulationError::config(format!(
                    "duplicate asset class {} in assumption set {}",
                    asset.id, self.id
                )));
            }
            asset.validate()?;
        }
        if self.correlation.dim() != self.asset_classes.len() {
            return Err(MatrixError::DimensionMismatch {
                expected: self.asset_classes.len(),
                actual: self.correlation.dim(),
            }
            .into());
        }
        if let Some(pos) = self
            .asset_classes
            .iter()
            .zip(self.correlation.ids())
            .position(|(a, id)| &a.id != id)
        {
            return Err(SimulationError::config(format!(
                "correlation matrix order differs from asset classes at position {pos}"
            )));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(SimulationError::config("risk-free rate must be finite"));
        }
        self.inflation.validate()?;
        if let Some(regimes) = &self.regimes {
            regimes.validate()?;
        }
        Ok(())
    }

    #[must_use]
    pub fn num_assets(&self) -> usize {
        self.asset_classes.len()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<AssetClassId> {
        self.asset_classes.iter().map(|a| a.id.clone()).collect()
    }

    #[must_use]
    pub fn index_of(&self, id: &AssetClassId) -> Option<usize> {
        self.asset_classes.iter().position(|a| &a.id == id)
    }

    pub fn asset(&self, id: &AssetClassId) -> Result<&AssetClass, LookupError> {
        self.asset_classes
            .iter()
            .find(|a| &a.id == id)
            .ok_or_else(|| LookupError::AssetClassNotFound(id.clone()))
    }
}
