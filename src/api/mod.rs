//! Upstream HTTP APIs

pub mod coingecko;
