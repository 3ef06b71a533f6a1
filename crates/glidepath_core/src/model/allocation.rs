//! Allocation weights

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::assumptions::MarketAssumptionSet;
use super::ids::AssetClassId;
use crate::error::AllocationError;

/// Accepted deviation of the weight sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Weights below this are treated as zero when cleaning solver output
const ZERO_WEIGHT: f64 = 1e-12;

/// Target portfolio weights by asset class.
///
/// Always non-negative with a sum within [`WEIGHT_TOLERANCE`] of 1.0 (no
/// leverage, no shorting). Keyed by a sorted map so iteration order is stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<AssetClassId, f64>", into = "BTreeMap<AssetClassId, f64>")]
pub struct AllocationWeights {
    weights: BTreeMap<AssetClassId, f64>,
}

impl TryFrom<BTreeMap<AssetClassId, f64>> for AllocationWeights {
    type Error = AllocationError;

    fn try_from(weights: BTreeMap<AssetClassId, f64>) -> Result<Self, Self::Error> {
        Self::new(weights)
    }
}

impl From<AllocationWeights> for BTreeMap<AssetClassId, f64> {
    fn from(w: AllocationWeights) -> Self {
        w.weights
    }
}

impl AllocationWeights {
    pub fn new(weights: BTreeMap<AssetClassId, f64>) -> Result<Self, AllocationError> {
        if weights.is_empty() {
            return Err(AllocationError::Empty);
        }
        for (asset, &weight) in &weights {
            if !weight.is_finite() {
                return Err(AllocationError::NonFinite {
                    asset: asset.clone(),
                });
            }
            if weight < 0.0 {
                return Err(AllocationError::NegativeWeight {
                    asset: asset.clone(),
                    weight,
                });
            }
        }
        let sum: f64 = weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(AllocationError::SumMismatch { sum });
        }
        Ok(Self { weights })
    }

    pub fn from_pairs<I, K>(pairs: I) -> Result<Self, AllocationError>
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<AssetClassId>,
    {
        let mut weights = BTreeMap::new();
        for (k, w) in pairs {
            *weights.entry(k.into()).or_insert(0.0) += w;
        }
        Self::new(weights)
    }

    /// Build from a solver weight vector: round-off negatives and dust are
    /// zeroed and the rest rescaled to sum to exactly 1.0.
    pub(crate) fn from_solution(
        ids: &[AssetClassId],
        raw: &[f64],
    ) -> Result<Self, AllocationError> {
        let cleaned: Vec<f64> = raw
            .iter()
            .map(|&w| if w < ZERO_WEIGHT { 0.0 } else { w })
            .collect();
        let sum: f64 = cleaned.iter().sum();
        if sum.is_nan() || sum <= 0.0 {
            return Err(AllocationError::SumMismatch { sum });
        }
        let weights = ids
            .iter()
            .cloned()
            .zip(cleaned.iter().map(|w| w / sum))
            .collect();
        Self::new(weights)
    }

    /// Single asset class at 100%
    #[must_use]
    pub fn single(id: impl Into<AssetClassId>) -> Self {
        Self {
            weights: BTreeMap::from([(id.into(), 1.0)]),
        }
    }

    /// Weight of an asset class (0.0 if absent)
    #[must_use]
    pub fn get(&self, id: &AssetClassId) -> f64 {
        self.weights.get(id).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&AssetClassId, f64)> {
        self.weights.iter().map(|(k, v)| (k, *v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.weights.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Dense weight vector in the order of `ids`.
    ///
    /// Fails if the allocation references an asset class not in `ids`.
    pub fn to_vector(&self, ids: &[AssetClassId]) -> Result<Vec<f64>, AllocationError> {
        if let Some(unknown) = self.weights.keys().find(|k| !ids.contains(k)) {
            return Err(AllocationError::UnknownAssetClass(unknown.clone()));
        }
        Ok(ids.iter().map(|id| self.get(id)).collect())
    }

    /// Share held in equity-like asset classes
    pub fn equity_share(&self, assumptions: &MarketAssumptionSet) -> Result<f64, AllocationError> {
        let mut share = 0.0;
        for (id, w) in self.iter() {
            let asset = assumptions
                .asset(id)
                .map_err(|_| AllocationError::UnknownAssetClass(id.clone()))?;
            if asset.is_equity_like() {
                share += w;
            }
        }
        Ok(share)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weights_must_sum_to_one() {
        assert!(AllocationWeights::from_pairs([("eq", 0.6), ("bd", 0.4)]).is_ok());
        assert!(AllocationWeights::from_pairs([("eq", 0.6), ("bd", 0.4000005)]).is_ok());
        assert!(matches!(
            AllocationWeights::from_pairs([("eq", 0.6), ("bd", 0.5)]),
            Err(AllocationError::SumMismatch { .. })
        ));
    }

    #[test]
    fn test_rejects_negative_and_empty() {
        assert!(matches!(
            AllocationWeights::from_pairs([("eq", 1.2), ("bd", -0.2)]),
            Err(AllocationError::NegativeWeight { .. })
        ));
        assert_eq!(
            AllocationWeights::from_pairs(Vec::<(&str, f64)>::new()),
            Err(AllocationError::Empty)
        );
    }

    #[test]
    fn test_to_vector_orders_and_rejects_unknown() {
        let w = AllocationWeights::from_pairs([("eq", 0.7), ("bd", 0.3)]).unwrap();
        let ids = vec![
            AssetClassId::from("bd"),
            AssetClassId::from("cash"),
            AssetClassId::from("eq"),
        ];
        assert_eq!(w.to_vector(&ids).unwrap(), vec![0.3, 0.0, 0.7]);
        assert!(matches!(
            w.to_vector(&ids[..2]),
            Err(AllocationError::UnknownAssetClass(_))
        ));
    }

    #[test]
    fn test_from_solution_cleans_round_off() {
        let ids = vec![AssetClassId::from("a"), AssetClassId::from("b")];
        let w = AllocationWeights::from_solution(&ids, &[-1e-17, 1.0 + 1e-15]).unwrap();
        assert_eq!(w.get(&ids[0]), 0.0);
        assert_eq!(w.get(&ids[1]), 1.0);
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: Result<AllocationWeights, _> = serde_json::from_str(r#"{"eq": 0.5, "bd": 0.5}"#);
        assert!(ok.is_ok());
        let bad: Result<AllocationWeights, _> = serde_json::from_str(r#"{"eq": 0.5}"#);
        assert!(bad.is_err());
    }
}
