//! YAML scenario files
//!
//! A scenario names an assumption set, a portfolio (explicit weights or a
//! model portfolio), a horizon and a cashflow plan in years. It is turned
//! into a [`SimulationConfig`] through the core's builder.
//!
//! ```yaml
//! name: retire-at-65
//! assumptions:
//!   name: us_baseline
//! portfolio:
//!   model:
//!     band: Moderate
//!     age: 45
//! initial_balance: 400000.0
//! years: 50
//! cashflows:
//!   - kind: Contribute
//!     amount: 1500.0
//!     start_year: 0
//!     end_year: 20
//!   - kind: Withdraw
//!     amount: 5000.0
//!     start_year: 20
//!     end_year: 50
//!     inflation_adjusted: true
//! goal:
//!   type: NeverDeplete
//! ```

use std::fs;
use std::path::Path;

use glidepath_core::analysis::{Goal, RiskConfig};
use glidepath_core::config::{SimulationBuilder, SimulationConfig};
use glidepath_core::model::{AllocationWeights, AssumptionSetId, Periodicity, RebalanceFrequency};
use glidepath_core::optimization::{RiskBand, model_portfolio_for};
use glidepath_core::SimulationError;
use serde::{Deserialize, Serialize};

/// Error types for scenario and data directory operations
#[derive(Debug)]
pub enum ScenarioError {
    Io(String),
    Parse(String),
    Serialize(String),
    Invalid(String),
    Simulation(SimulationError),
}

impl std::fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioError::Io(msg) => write!(f, "IO error: {msg}"),
            ScenarioError::Parse(msg) => write!(f, "Parse error: {msg}"),
            ScenarioError::Serialize(msg) => write!(f, "Serialization error: {msg}"),
            ScenarioError::Invalid(msg) => write!(f, "Invalid scenario: {msg}"),
            ScenarioError::Simulation(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Simulation(e) => Some(e),
            _ => None,
        }
    }
}

impl From<SimulationError> for ScenarioError {
    fn from(e: SimulationError) -> Self {
        ScenarioError::Simulation(e)
    }
}

/// Reference to a stored assumption set; no version means the latest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

impl Default for AssumptionRef {
    fn default() -> Self {
        Self {
            name: "us_baseline".to_string(),
            version: None,
        }
    }
}

impl From<&AssumptionSetId> for AssumptionRef {
    fn from(id: &AssumptionSetId) -> Self {
        Self {
            name: id.name.clone(),
            version: Some(id.version),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPortfolioSpec {
    pub band: RiskBand,
    pub age: u32,
}

/// Exactly one of `weights` or `model`.
/// Uses explicit fields rather than a tagged enum to keep the YAML flat.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weights: Option<AllocationWeights>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelPortfolioSpec>,
}

impl PortfolioSpec {
    pub fn resolve(&self) -> Result<AllocationWeights, ScenarioError> {
        match (&self.weights, &self.model) {
            (Some(w), None) => Ok(w.clone()),
            (None, Some(m)) => Ok(model_portfolio_for(m.band, m.age)?),
            (Some(_), Some(_)) => Err(ScenarioError::Invalid(
                "portfolio must set either weights or model, not both".to_string(),
            )),
            (None, None) => Err(ScenarioError::Invalid(
                "portfolio needs weights or a model".to_string(),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CashflowKind {
    Contribute,
    Withdraw,
}

/// Level cashflow per simulation period over `[start_year, end_year)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashflowSpec {
    pub kind: CashflowKind,
    pub amount: f64,
    pub start_year: usize,
    pub end_year: usize,
    /// Grow with the simulated price index
    #[serde(default)]
    pub inflation_adjusted: bool,
}

fn default_paths() -> usize {
    10_000
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub assumptions: AssumptionRef,
    pub portfolio: PortfolioSpec,
    #[serde(default)]
    pub initial_balance: f64,
    pub years: usize,
    #[serde(default)]
    pub periodicity: Periodicity,
    #[serde(default = "default_paths")]
    pub paths: usize,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub rebalance: RebalanceFrequency,
    #[serde(default = "default_true")]
    pub use_regimes: bool,
    #[serde(default)]
    pub cashflows: Vec<CashflowSpec>,
    /// First year of decumulation; defaults to the first withdrawal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decumulate_from_year: Option<usize>,
    #[serde(default)]
    pub goal: Goal,
    #[serde(default)]
    pub risk: RiskConfig,
}

impl Scenario {
    pub fn from_yaml(yaml: &str) -> Result<Self, ScenarioError> {
        serde_saphyr::from_str(yaml)
            .map_err(|e| ScenarioError::Parse(format!("Failed to parse scenario: {e}")))
    }

    pub fn to_yaml(&self) -> Result<String, ScenarioError> {
        serde_saphyr::to_string(self)
            .map_err(|e| ScenarioError::Serialize(format!("Failed to serialize scenario: {e}")))
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ScenarioError::Io(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    pub fn save(&self, path: &Path) -> Result<(), ScenarioError> {
        let yaml = self.to_yaml()?;
        fs::write(path, yaml)
            .map_err(|e| ScenarioError::Io(format!("Failed to write {}: {e}", path.display())))
    }

    /// Mid-career example used by `glidepath init`
    #[must_use]
    pub fn example() -> Self {
        Self {
            name: "example".to_string(),
            assumptions: AssumptionRef::default(),
            portfolio: PortfolioSpec {
                weights: None,
                model: Some(ModelPortfolioSpec {
                    band: RiskBand::Moderate,
                    age: 45,
                }),
            },
            initial_balance: 400_000.0,
            years: 50,
            periodicity: Periodicity::Monthly,
            paths: default_paths(),
            seed: 2025,
            rebalance: RebalanceFrequency::Annual,
            use_regimes: true,
            cashflows: vec![
                CashflowSpec {
                    kind: CashflowKind::Contribute,
                    amount: 1_500.0,
                    start_year: 0,
                    end_year: 20,
                    inflation_adjusted: false,
                },
                CashflowSpec {
                    kind: CashflowKind::Withdraw,
                    amount: 5_000.0,
                    start_year: 20,
                    end_year: 50,
                    inflation_adjusted: true,
                },
            ],
            decumulate_from_year: None,
            goal: Goal::NeverDeplete,
            risk: RiskConfig::default(),
        }
    }

    /// Build the engine configuration.
    ///
    /// `paths` overrides the scenario's path count when given.
    pub fn to_config(&self, paths: Option<usize>) -> Result<SimulationConfig, ScenarioError> {
        let per_year = self.periodicity.periods_per_year() as usize;
        let mut builder = SimulationBuilder::new()
            .allocation(self.portfolio.resolve()?)
            .initial_balance(self.initial_balance)
            .rebalance(self.rebalance)
            .paths(paths.unwrap_or(self.paths))
            .seed(self.seed)
            .years(self.years);
        builder = match self.periodicity {
            Periodicity::Monthly => builder.monthly(),
            Periodicity::Annual => builder.annual(),
        };
        if !self.use_regimes {
            builder = builder.without_regimes();
        }

        for (i, cf) in self.cashflows.iter().enumerate() {
            if cf.start_year > cf.end_year || cf.end_year > self.years {
                return Err(ScenarioError::Invalid(format!(
                    "cashflow {i} spans years {}..{} outside the {}-year horizon",
                    cf.start_year, cf.end_year, self.years
                )));
            }
            let periods = cf.start_year * per_year..cf.end_year * per_year;
            builder = match (cf.kind, cf.inflation_adjusted) {
                (CashflowKind::Contribute, false) => builder.contribute(cf.amount, periods),
                (CashflowKind::Contribute, true) => builder.contribute_real(cf.amount, periods),
                (CashflowKind::Withdraw, false) => builder.withdraw(cf.amount, periods),
                (CashflowKind::Withdraw, true) => builder.withdraw_real(cf.amount, periods),
            };
        }
        if let Some(year) = self.decumulate_from_year {
            builder = builder.decumulate_from(year * per_year);
        }

        Ok(builder.build()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEIGHTS_YAML: &str = r#"
name: sixty-forty
portfolio:
  weights:
    us_equity: 0.6
    us_bonds: 0.4
initial_balance: 100000.0
years: 10
periodicity: Annual
paths: 500
seed: 7
cashflows:
  - kind: Withdraw
    amount: 4000.0
    start_year: 5
    end_year: 10
goal:
  type: TerminalValue
  amount: 50000.0
"#;

    #[test]
    fn test_parse_weights_scenario() {
        let scenario = Scenario::from_yaml(WEIGHTS_YAML).unwrap();
        assert_eq!(scenario.name, "sixty-forty");
        assert_eq!(scenario.assumptions, AssumptionRef::default());
        assert_eq!(scenario.periodicity, Periodicity::Annual);
        assert!(scenario.use_regimes);
        assert_eq!(scenario.goal, Goal::TerminalValue { amount: 50_000.0 });

        let config = scenario.to_config(None).unwrap();
        assert_eq!(config.horizon_periods, 10);
        assert_eq!(config.num_paths, 500);
        assert_eq!(config.seed, 7);
        assert_eq!(config.schedule.amounts[4], 0.0);
        assert_eq!(config.schedule.amounts[5], -4_000.0);
    }

    #[test]
    fn test_paths_override() {
        let scenario = Scenario::from_yaml(WEIGHTS_YAML).unwrap();
        assert_eq!(scenario.to_config(Some(20)).unwrap().num_paths, 20);
    }

    #[test]
    fn test_monthly_years_convert_to_periods() {
        let config = Scenario::example().to_config(None).unwrap();
        assert_eq!(config.horizon_periods, 600);
        assert_eq!(config.schedule.amounts[239], 1_500.0);
        assert!(config.schedule.amounts[240] < 0.0);
    }

    #[test]
    fn test_example_round_trips_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("example.yaml");
        let scenario = Scenario::example();
        scenario.save(&path).unwrap();
        assert_eq!(Scenario::load(&path).unwrap(), scenario);
    }

    #[test]
    fn test_portfolio_must_be_unambiguous() {
        let both = PortfolioSpec {
            weights: Some(AllocationWeights::single("us_equity")),
            model: Some(ModelPortfolioSpec {
                band: RiskBand::Aggressive,
                age: 30,
            }),
        };
        assert!(matches!(both.resolve(), Err(ScenarioError::Invalid(_))));
        assert!(matches!(
            PortfolioSpec::default().resolve(),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_cashflow_outside_horizon_rejected() {
        let mut scenario = Scenario::from_yaml(WEIGHTS_YAML).unwrap();
        scenario.cashflows[0].end_year = 12;
        assert!(matches!(
            scenario.to_config(None),
            Err(ScenarioError::Invalid(_))
        ));
    }

    #[test]
    fn test_invalid_weights_fail_to_parse() {
        let yaml = WEIGHTS_YAML.replace("us_bonds: 0.4", "us_bonds: 0.3");
        assert!(matches!(
            Scenario::from_yaml(&yaml),
            Err(ScenarioError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Scenario::load(&dir.path().join("nope.yaml")),
            Err(ScenarioError::Io(_))
        ));
    }
}
