//! Card hints to physical cards.

pub mod resolver;

pub use resolver::{CardResolution, CardResolver};
