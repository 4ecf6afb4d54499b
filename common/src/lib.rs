//! FxHub Common Types
//!
//! This crate contains the types shared across the hub: currency codes and
//! the currency registry, the error taxonomy, time helpers and the JSON
//! file persistence layer.

pub mod currency;
pub mod error;
pub mod storage;
pub mod time;

pub use currency::*;
pub use error::*;
pub use time::*;
