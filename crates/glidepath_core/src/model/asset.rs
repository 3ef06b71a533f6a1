//! Asset class definitions
//!
//! An asset class is a category of investable assets sharing a risk/return
//! profile. Returns and volatilities are annualized; conversion to the
//! simulation period happens in the capital market model.

use serde::{Deserialize, Serialize};

use super::ids::AssetClassId;
use crate::error::SimulationError;

/// Broad category used by model portfolios to split equity and bond shares
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum AssetKind {
    #[default]
    Equity,
    FixedIncome,
    RealAsset,
    Cash,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetClass {
    pub id: AssetClassId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: AssetKind,
    /// Expected annual return (e.g. 0.07 for 7%)
    pub expected_return: f64,
    /// Annual volatility (standard deviation of annual returns), must be > 0
    pub volatility: f64,
    #[serde(default)]
    pub dividend_yield: Option<f64>,
}

impl AssetClass {
    #[must_use]
    pub fn new(id: impl Into<AssetClassId>, expected_return: f64, volatility: f64) -> Self {
        Self {
            id: id.into(),
            name: None,
            kind: AssetKind::Equity,
            expected_return,
            volatility,
            dividend_yield: None,
        }
    }

    #[must_use]
    pub fn kind(mut self, kind: AssetKind) -> Self {
        self.kind = kind;
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn dividend_yield(mut self, dividend_yield: f64) -> Self {
        self.dividend_yield = Some(dividend_yield);
        self
    }

    pub fn validate(&self) -> Result<(), SimulationError> {
        if !self.expected_return.is_finite() || self.expected_return <= -1.0 {
            return Err(SimulationError::config(format!(
                "asset class {} has invalid expected return {}",
                self.id, self.expected_return
            )));
        }
        if !self.volatility.is_finite() || self.volatility <= 0.0 {
            return Err(SimulationError::config(format!(
                "asset class {} must have positive finite volatility, got {}",
                self.id, self.volatility
            )));
        }
        if let Some(y) = self.dividend_yield
            && (!y.is_finite() || y < 0.0)
        {
            return Err(SimulationError::config(format!(
                "asset class {} has invalid dividend yield {y}",
                self.id
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_equity_like(&self) -> bool {
        matches!(self.kind, AssetKind::Equity | AssetKind::RealAsset)
    }
}
