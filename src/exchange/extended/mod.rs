//! Extended exchange integration (comparison side A).
//!
//! Read-only access to Starknet perpetuals funding data for a configured set
//! of `<BASE>-USD` markets.

mod client;
mod types;

pub use client::{ExtendedClient, DEFAULT_MARKETS, MAINNET_API_URL};
pub use types::*;
