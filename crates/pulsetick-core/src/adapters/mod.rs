//! Provider adapters.
//!
//! | Adapter | Role |
//! |---------|------|
//! | [`SchwabAdapter`] | Primary live source (bearer-token API) |
//! | [`AlphaVantageAdapter`] | Secondary live source (free-tier REST) |
//! | [`SyntheticSource`] | Deterministic last-resort generator |

mod alphavantage;
mod schwab;
pub mod synthetic;

pub use alphavantage::AlphaVantageAdapter;
pub use schwab::SchwabAdapter;
pub use synthetic::SyntheticSource;
