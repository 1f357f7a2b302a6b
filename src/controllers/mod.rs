//! Dynamics controllers: pricing, staking, treasury, and volume.

pub mod pricing;
pub mod staking;
pub mod treasury;
pub mod volume;
