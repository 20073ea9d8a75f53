//! Exchange integrations for funding rate comparison.
//!
//! ## Extended
//! Public markets endpoint with a per-market funding history fallback.
//!
//! ## Hyperliquid
//! Read-only access to perpetuals asset contexts.
//!
//! Both implement [`RateGateway`], which never fails: upstream errors become
//! empty sample sets.

pub mod extended;
pub mod hyperliquid;
mod traits;

pub use extended::ExtendedClient;
pub use hyperliquid::HyperliquidClient;
pub use traits::*;
