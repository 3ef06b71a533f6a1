//! Portfolio construction
//!
//! Long-only mean-variance optimization over a [`CapitalMarketModel`]
//! (efficient frontier, minimum-variance and maximum-Sharpe portfolios),
//! rule-based model portfolios by age and risk band, and mapping of an
//! allocation to concrete instruments.
//!
//! [`CapitalMarketModel`]: crate::market::CapitalMarketModel

pub mod frontier;
pub mod instruments;
pub mod model_portfolio;
pub mod qp;

pub use frontier::{
    EfficientFrontier, EfficientFrontierPoint, compute_efficient_frontier, max_sharpe_portfolio,
    min_variance_portfolio,
};
pub use instruments::{Instrument, InstrumentCatalog, InstrumentPick, recommend_instruments};
pub use model_portfolio::{
    MAX_MODEL_AGE, MIN_MODEL_AGE, ModelPortfolioTemplate, RiskBand, bond_share, model_portfolio_for,
};
pub use qp::{MeanVarianceProblem, TARGET_TOLERANCE};
