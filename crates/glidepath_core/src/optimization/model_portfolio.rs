//! Age- and risk-band model portfolios
//!
//! The bond share follows the "age in bonds" rule shifted by a band offset:
//!
//! ```text
//! bonds% = clamp(clamp(age, 20, 100) + offset, 0, 100)
//! ```
//!
//! The equity and bond sleeves are then split across sub-classes by a
//! [`ModelPortfolioTemplate`].

use serde::{Deserialize, Serialize};

use crate::error::{AllocationError, Result, SimulationError};
use crate::model::{AllocationWeights, AssetClassId, AssetKind, MarketAssumptionSet};

pub const MIN_MODEL_AGE: u32 = 20;
pub const MAX_MODEL_AGE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

impl RiskBand {
    pub const ALL: [RiskBand; 3] = [
        RiskBand::Conservative,
        RiskBand::Moderate,
        RiskBand::Aggressive,
    ];

    /// Percentage points added to the age-based bond share
    #[must_use]
    pub const fn bond_offset(self) -> i32 {
        match self {
            RiskBand::Conservative => 15,
            RiskBand::Moderate => 0,
            RiskBand::Aggressive => -15,
        }
    }
}

impl std::fmt::Display for RiskBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RiskBand::Conservative => "conservative",
            RiskBand::Moderate => "moderate",
            RiskBand::Aggressive => "aggressive",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for RiskBand {
    type Err = SimulationError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(RiskBand::Conservative),
            "moderate" => Ok(RiskBand::Moderate),
            "aggressive" => Ok(RiskBand::Aggressive),
            other => Err(SimulationError::config(format!("unknown risk band '{other}'"))),
        }
    }
}

/// Bond share in [0, 1] for a band and age
#[must_use]
pub fn bond_share(band: RiskBand, age: u32) -> f64 {
    let age = age.clamp(MIN_MODEL_AGE, MAX_MODEL_AGE) as i32;
    let pct = (age + band.bond_offset()).clamp(0, 100);
    f64::from(pct) / 100.0
}

/// Relative split of each sleeve across asset classes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelPortfolioTemplate {
    pub equity: Vec<(AssetClassId, f64)>,
    pub fixed_income: Vec<(AssetClassId, f64)>,
}

impl Default for ModelPortfolioTemplate {
    fn default() -> Self {
        Self {
            equity: vec![("us_equity".into(), 0.6), ("intl_equity".into(), 0.4)],
            fixed_income: vec![("us_bonds".into(), 0.7), ("tips".into(), 0.3)],
        }
    }
}

impl ModelPortfolioTemplate {
    /// Equal-weight sleeves built from an assumption set's asset kinds.
    /// Real assets count as equity; cash is left out.
    pub fn from_assumptions(assumptions: &MarketAssumptionSet) -> Result<Self> {
        let ids_of = |pred: fn(AssetKind) -> bool| -> Vec<(AssetClassId, f64)> {
            assumptions
                .asset_classes
                .iter()
                .filter(|a| pred(a.kind))
                .map(|a| (a.id.clone(), 1.0))
                .collect()
        };
        let template = Self {
            equity: ids_of(|k| matches!(k, AssetKind::Equity | AssetKind::RealAsset)),
            fixed_income: ids_of(|k| k == AssetKind::FixedIncome),
        };
        template.validate()?;
        Ok(template)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, sleeve) in [("equity", &self.equity), ("fixed income", &self.fixed_income)] {
            if sleeve.is_empty() {
                return Err(SimulationError::config(format!("{name} sleeve is empty")));
            }
            for (id, w) in sleeve {
                if !w.is_finite() {
                    return Err(AllocationError::NonFinite { asset: id.clone() }.into());
                }
                if *w < 0.0 {
                    return Err(AllocationError::NegativeWeight {
                        asset: id.clone(),
                        weight: *w,
                    }
                    .into());
                }
            }
            if sleeve.iter().map(|(_, w)| w).sum::<f64>() <= 0.0 {
                return Err(SimulationError::config(format!("{name} sleeve has no weight")));
            }
        }
        Ok(())
    }

    /// Model allocation for a band and age. Asset classes whose share rounds
    /// to zero are omitted.
    pub fn portfolio_for(&self, band: RiskBand, age: u32) -> Result<AllocationWeights> {
        self.validate()?;
        let bonds = bond_share(band, age);
        let mut pairs = Vec::with_capacity(self.equity.len() + self.fixed_income.len());
        for (sleeve, share) in [(&self.equity, 1.0 - bonds), (&self.fixed_income, bonds)] {
            if share <= 0.0 {
                continue;
            }
            let total: f64 = sleeve.iter().map(|(_, w)| w).sum();
            pairs.extend(
                sleeve
                    .iter()
                    .filter(|(_, w)| *w > 0.0)
                    .map(|(id, w)| (id.clone(), share * w / total)),
            );
        }
        Ok(AllocationWeights::from_pairs(pairs)?)
    }
}

/// Model portfolio from the default template
pub fn model_portfolio_for(band: RiskBand, age: u32) -> Result<AllocationWeights> {
    ModelPortfolioTemplate::default().portfolio_for(band, age)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bonds_of(w: &AllocationWeights) -> f64 {
        w.get(&"us_bonds".into()) + w.get(&"tips".into())
    }

    #[test]
    fn test_bond_share_clamps() {
        assert_eq!(bond_share(RiskBand::Moderate, 5), 0.20);
        assert_eq!(bond_share(RiskBand::Moderate, 40), 0.40);
        assert_eq!(bond_share(RiskBand::Conservative, 95), 1.0);
        assert_eq!(bond_share(RiskBand::Aggressive, 20), 0.05);
        assert_eq!(bond_share(RiskBand::Moderate, 120), 1.0);
    }

    #[test]
    fn test_bond_share_monotone_in_age() {
        for band in RiskBand::ALL {
            let mut prev = 0.0;
            for age in 0..=110 {
                let w = model_portfolio_for(band, age).unwrap();
                let b = bonds_of(&w);
                assert!(b >= prev - 1e-12, "{band} age {age}");
                prev = b;
            }
        }
    }

    #[test]
    fn test_bands_are_ordered() {
        for age in [25, 45, 65] {
            let c = bonds_of(&model_portfolio_for(RiskBand::Conservative, age).unwrap());
            let m = bonds_of(&model_portfolio_for(RiskBand::Moderate, age).unwrap());
            let a = bonds_of(&model_portfolio_for(RiskBand::Aggressive, age).unwrap());
            assert!(c > m && m > a);
        }
    }

    #[test]
    fn test_template_split() {
        let w = model_portfolio_for(RiskBand::Moderate, 40).unwrap();
        assert!((w.get(&"us_equity".into()) - 0.36).abs() < 1e-12);
        assert!((w.get(&"intl_equity".into()) - 0.24).abs() < 1e-12);
        assert!((w.get(&"us_bonds".into()) - 0.28).abs() < 1e-12);
        assert!((w.get(&"tips".into()) - 0.12).abs() < 1e-12);
    }

    #[test]
    fn test_all_bonds_omits_equity() {
        let w = model_portfolio_for(RiskBand::Conservative, 90).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w.get(&"us_equity".into()), 0.0);
    }

    #[test]
    fn test_band_parse() {
        assert_eq!("Aggressive".parse::<RiskBand>().unwrap(), RiskBand::Aggressive);
        assert!("reckless".parse::<RiskBand>().is_err());
    }
}
