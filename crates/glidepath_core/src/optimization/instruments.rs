//! Instrument recommendation
//!
//! Maps each asset class in an allocation to one low-cost fund from a fixed
//! catalog. Candidates are ranked by
//!
//! ```text
//! score = cs * expense_ratio + (1 - cs) * tracking_difference
//! ```
//!
//! where `cs` is the caller's cost sensitivity in [0, 1]. At `cs = 1` this is
//! the lowest-expense fund for the class; lower values trade expense against
//! how closely the fund follows its benchmark. Ties go to the lower expense
//! ratio, then to the alphabetically first identifier.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{LookupError, Result, SimulationError};
use crate::model::{AllocationWeights, AssetClassId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instrument {
    pub id: String,
    pub asset_class: AssetClassId,
    pub name: String,
    /// Annual expense ratio (0.0003 = 3 bps)
    pub expense_ratio: f64,
    /// Absolute annual tracking difference against the asset-class benchmark
    pub tracking_difference: f64,
}

impl Instrument {
    pub fn new(
        id: impl Into<String>,
        asset_class: impl Into<AssetClassId>,
        name: impl Into<String>,
        expense_ratio: f64,
        tracking_difference: f64,
    ) -> Self {
        Self {
            id: id.into(),
            asset_class: asset_class.into(),
            name: name.into(),
            expense_ratio,
            tracking_difference,
        }
    }

    #[must_use]
    pub fn score(&self, cost_sensitivity: f64) -> f64 {
        cost_sensitivity * self.expense_ratio + (1.0 - cost_sensitivity) * self.tracking_difference
    }
}

/// One recommended instrument per asset class, with its allocation weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPick {
    pub instrument: Instrument,
    pub weight: f64,
}

#[derive(Debug, Clone, Default)]
pub struct InstrumentCatalog {
    by_class: FxHashMap<AssetClassId, Vec<Instrument>>,
}

impl InstrumentCatalog {
    pub fn new(instruments: impl IntoIterator<Item = Instrument>) -> Result<Self> {
        let mut catalog = Self::default();
        for instrument in instruments {
            catalog.insert(instrument)?;
        }
        Ok(catalog)
    }

    pub fn insert(&mut self, instrument: Instrument) -> Result<()> {
        let valid = |x: f64| x.is_finite() && x >= 0.0;
        if !valid(instrument.expense_ratio) || !valid(instrument.tracking_difference) {
            return Err(SimulationError::config(format!(
                "instrument {} has invalid cost figures",
                instrument.id
            )));
        }
        self.by_class
            .entry(instrument.asset_class.clone())
            .or_default()
            .push(instrument);
        Ok(())
    }

    pub fn candidates(&self, asset_class: &AssetClassId) -> &[Instrument] {
        self.by_class.get(asset_class).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Best instrument for one asset class
    pub fn best_for(
        &self,
        asset_class: &AssetClassId,
        cost_sensitivity: f64,
    ) -> Result<&Instrument> {
        self.candidates(asset_class)
            .iter()
            .min_by(|a, b| rank(a, b, cost_sensitivity))
            .ok_or_else(|| LookupError::NoInstrument(asset_class.clone()).into())
    }

    /// Pick an instrument for every asset class in `weights`
    pub fn recommend(
        &self,
        weights: &AllocationWeights,
        cost_sensitivity: f64,
    ) -> Result<BTreeMap<AssetClassId, InstrumentPick>> {
        if !(0.0..=1.0).contains(&cost_sensitivity) {
            return Err(SimulationError::config(format!(
                "cost sensitivity must be in [0, 1], got {cost_sensitivity}"
            )));
        }
        weights
            .iter()
            .map(|(class, weight)| {
                let instrument = self.best_for(class, cost_sensitivity)?.clone();
                Ok((class.clone(), InstrumentPick { instrument, weight }))
            })
            .collect()
    }

    /// Built-in table of broad index funds for the baseline asset classes
    #[must_use]
    pub fn builtin() -> Self {
        let rows = [
            ("VTI", "us_equity", "Total US Stock Market ETF", 0.0003, 0.0004),
            ("ITOT", "us_equity", "Core S&P Total US Stock ETF", 0.0003, 0.0006),
            ("SCHB", "us_equity", "US Broad Market ETF", 0.0003, 0.0005),
            ("VXUS", "intl_equity", "Total International Stock ETF", 0.0008, 0.0012),
            ("IXUS", "intl_equity", "Core MSCI Total International ETF", 0.0007, 0.0018),
            ("BND", "us_bonds", "Total Bond Market ETF", 0.0003, 0.0007),
            ("AGG", "us_bonds", "Core US Aggregate Bond ETF", 0.0003, 0.0005),
            ("SCHP", "tips", "US TIPS ETF", 0.0003, 0.0006),
            ("VTIP", "tips", "Short-Term Inflation-Protected ETF", 0.0004, 0.0010),
            ("SGOV", "cash", "0-3 Month Treasury Bond ETF", 0.0009, 0.0002),
            ("BIL", "cash", "1-3 Month T-Bill ETF", 0.0014, 0.0003),
        ];
        let mut catalog = Self::default();
        for (id, class, name, er, td) in rows {
            catalog
                .by_class
                .entry(class.into())
                .or_default()
                .push(Instrument::new(id, class, name, er, td));
        }
        catalog
    }
}

fn rank(a: &Instrument, b: &Instrument, cost_sensitivity: f64) -> Ordering {
    a.score(cost_sensitivity)
        .total_cmp(&b.score(cost_sensitivity))
        .then(a.expense_ratio.total_cmp(&b.expense_ratio))
        .then_with(|| a.id.cmp(&b.id))
}

/// Recommend from the built-in catalog
pub fn recommend_instruments(
    weights: &AllocationWeights,
    cost_sensitivity: f64,
) -> Result<BTreeMap<AssetClassId, InstrumentPick>> {
    InstrumentCatalog::builtin().recommend(weights, cost_sensitivity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pick(weights: &AllocationWeights, cs: f64, class: &str) -> String {
        recommend_instruments(weights, cs).unwrap()[&AssetClassId::from(class)]
            .instrument
            .id
            .clone()
    }

    #[test]
    fn test_cost_sensitivity_changes_pick() {
        let w = AllocationWeights::single("intl_equity");
        assert_eq!(pick(&w, 1.0, "intl_equity"), "IXUS");
        assert_eq!(pick(&w, 0.0, "intl_equity"), "VXUS");
    }

    #[test]
    fn test_full_cost_sensitivity_picks_lowest_expense() {
        let catalog = InstrumentCatalog::builtin();
        for class in ["us_equity", "intl_equity", "us_bonds", "tips", "cash"] {
            let class = AssetClassId::from(class);
            let cheapest = catalog
                .candidates(&class)
                .iter()
                .map(|i| i.expense_ratio)
                .fold(f64::INFINITY, f64::min);
            let best = catalog.best_for(&class, 1.0).unwrap();
            assert_eq!(best.expense_ratio, cheapest, "{class}");
        }
        // Equal expense ratios fall back to the identifier
        assert_eq!(catalog.best_for(&"us_equity".into(), 1.0).unwrap().id, "ITOT");
    }

    #[test]
    fn test_ties_break_by_expense_then_id() {
        let catalog = InstrumentCatalog::new([
            Instrument::new("YYY", "x", "y", 0.0001, 0.0020),
            Instrument::new("ZZZ", "x", "z", 0.0010, 0.0015),
            Instrument::new("BBB", "x", "b", 0.0005, 0.0015),
            Instrument::new("AAA", "x", "a", 0.0005, 0.0015),
        ])
        .unwrap();
        // Score is tracking difference alone at cs = 0
        let best = catalog.best_for(&"x".into(), 0.0).unwrap();
        assert_eq!(best.id, "AAA");
    }

    #[test]
    fn test_every_class_gets_a_pick() {
        let w = AllocationWeights::from_pairs([("us_equity", 0.6), ("us_bonds", 0.4)]).unwrap();
        let picks = recommend_instruments(&w, 0.5).unwrap();
        assert_eq!(picks.len(), 2);
        assert_eq!(picks[&AssetClassId::from("us_equity")].weight, 0.6);
    }

    #[test]
    fn test_missing_class_is_lookup_error() {
        let w = AllocationWeights::single("crypto");
        assert!(matches!(
            recommend_instruments(&w, 0.5),
            Err(SimulationError::Lookup(LookupError::NoInstrument(_)))
        ));
    }

    #[test]
    fn test_cost_sensitivity_range() {
        let w = AllocationWeights::single("us_equity");
        assert!(matches!(
            recommend_instruments(&w, 1.5),
            Err(SimulationError::Config(_))
        ));
    }
}
