//! Fluent construction of market assumption sets, plus a baseline preset

use jiff::civil::Date;

use crate::error::SimulationError;
use crate::model::{
    AssetClass, AssetClassId, AssetKind, AssumptionSetId, CorrelationMatrix, InflationModel,
    MarketAssumptionSet, RegimeModel, build_correlation_matrix,
};

#[derive(Debug, Clone)]
enum CorrelationSpec {
    Pairwise(Vec<(AssetClassId, AssetClassId, f64)>),
    Rows(Vec<Vec<f64>>),
}

/// Builder for [`MarketAssumptionSet`]
#[derive(Debug, Clone)]
pub struct AssumptionSetBuilder {
    id: AssumptionSetId,
    as_of: Option<Date>,
    assets: Vec<AssetClass>,
    correlation: CorrelationSpec,
    inflation: InflationModel,
    risk_free_rate: f64,
    regimes: Option<RegimeModel>,
}

impl AssumptionSetBuilder {
    #[must_use]
    pub fn new(name: impl Into<String>, version: u32) -> Self {
        Self {
            id: AssumptionSetId::new(name, version),
            as_of: None,
            assets: Vec::new(),
            correlation: CorrelationSpec::Pairwise(Vec::new()),
            inflation: InflationModel::None,
            risk_free_rate: 0.0,
            regimes: None,
        }
    }

    /// Long-horizon US capital market assumptions over five broad classes
    #[must_use]
    pub fn us_baseline() -> Self {
        Self::new("us_baseline", 1)
            .as_of(2025, 1, 1)
            .asset(
                AssetClass::new("us_equity", 0.070, 0.160)
                    .name("US Equity")
                    .dividend_yield(0.015),
            )
            .asset(
                AssetClass::new("intl_equity", 0.075, 0.180)
                    .name("International Equity")
                    .dividend_yield(0.028),
            )
            .asset(
                AssetClass::new("us_bonds", 0.045, 0.055)
                    .name("US Aggregate Bonds")
                    .kind(AssetKind::FixedIncome),
            )
            .asset(
                AssetClass::new("tips", 0.040, 0.060)
                    .name("Inflation-Protected Bonds")
                    .kind(AssetKind::FixedIncome),
            )
            .asset(
                AssetClass::new("cash", 0.030, 0.010)
                    .name("Cash")
                    .kind(AssetKind::Cash),
            )
            .correlation("us_equity", "intl_equity", 0.85)
            .correlation("us_equity", "us_bonds", 0.10)
            .correlation("us_equity", "tips", 0.15)
            .correlation("intl_equity", "us_bonds", 0.05)
            .correlation("intl_equity", "tips", 0.10)
            .correlation("us_bonds", "tips", 0.70)
            .correlation("us_bonds", "cash", 0.20)
            .correlation("tips", "cash", 0.10)
            .inflation(InflationModel::US_HISTORICAL_LOG_NORMAL)
            .risk_free_rate(0.03)
    }

    #[must_use]
    pub fn version(mut self, version: u32) -> Self {
        self.id.version = version;
        self
    }

    #[must_use]
    pub fn as_of(mut self, year: i16, month: i8, day: i8) -> Self {
        self.as_of = Some(jiff::civil::date(year, month, day));
        self
    }

    #[must_use]
    pub fn as_of_date(mut self, date: Date) -> Self {
        self.as_of = Some(date);
        self
    }

    #[must_use]
    pub fn asset(mut self, asset: AssetClass) -> Self {
        self.assets.push(asset);
        self
    }

    /// Pairwise correlation estimate; unspecified pairs are uncorrelated.
    /// Replaces any full matrix set with [`Self::correlation_rows`].
    #[must_use]
    pub fn correlation(
        mut self,
        a: impl Into<AssetClassId>,
        b: impl Into<AssetClassId>,
        rho: f64,
    ) -> Self {
        let pair = (a.into(), b.into(), rho);
        match &mut self.correlation {
            CorrelationSpec::Pairwise(pairs) => pairs.push(pair),
            CorrelationSpec::Rows(_) => self.correlation = CorrelationSpec::Pairwise(vec![pair]),
        }
        self
    }

    /// Full correlation matrix in asset order
    #[must_use]
    pub fn correlation_rows(mut self, rows: Vec<Vec<f64>>) -> Self {
        self.correlation = CorrelationSpec::Rows(rows);
        self
    }

    #[must_use]
    pub fn inflation(mut self, inflation: InflationModel) -> Self {
        self.inflation = inflation;
        self
    }

    #[must_use]
    pub fn risk_free_rate(mut self, rate: f64) -> Self {
        self.risk_free_rate = rate;
        self
    }

    #[must_use]
    pub fn regimes(mut self, regimes: RegimeModel) -> Self {
        self.regimes = Some(regimes);
        self
    }

    pub fn build(self) -> Result<MarketAssumptionSet, SimulationError> {
        let as_of = self.as_of.ok_or_else(|| {
            SimulationError::config(format!("assumption set {} needs an as-of date", self.id))
        })?;
        let ids: Vec<AssetClassId> = self.assets.iter().map(|a| a.id.clone()).collect();
        let correlation: CorrelationMatrix = match self.correlation {
            CorrelationSpec::Pairwise(pairs) => CorrelationMatrix::from_pairwise(&ids, &pairs)?,
            CorrelationSpec::Rows(rows) => build_correlation_matrix(&ids, &rows)?,
        };
        let set = MarketAssumptionSet {
            id: self.id,
            as_of,
            asset_classes: self.assets,
            correlation,
            inflation: self.inflation,
            risk_free_rate: self.risk_free_rate,
            regimes: self.regimes,
        };
        set.validate()?;
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_baseline_builds_without_repair() {
        let set = AssumptionSetBuilder::us_baseline().build().unwrap();
        assert_eq!(set.num_assets(), 5);
        assert!(!set.correlation.was_repaired());
        assert_eq!(set.id.to_string(), "us_baseline@v1");
    }

    #[test]
    fn test_missing_as_of_is_rejected() {
        let result = AssumptionSetBuilder::new("x", 1)
            .asset(AssetClass::new("eq", 0.07, 0.15))
            .build();
        assert!(matches!(result, Err(SimulationError::Config(_))));
    }

    #[test]
    fn test_unknown_pair_is_rejected() {
        let result = AssumptionSetBuilder::new("x", 1)
            .as_of(2025, 1, 1)
            .asset(AssetClass::new("eq", 0.07, 0.15))
            .correlation("eq", "bonds", 0.2)
            .build();
        assert!(matches!(result, Err(SimulationError::InvalidMatrix(_))));
    }

    #[test]
    fn test_duplicate_asset_is_rejected() {
        let result = AssumptionSetBuilder::new("x", 1)
            .as_of(2025, 1, 1)
            .asset(AssetClass::new("eq", 0.07, 0.15))
            .asset(AssetClass::new("eq", 0.05, 0.10))
            .build();
        assert!(result.is_err());
    }
}
