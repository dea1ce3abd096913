//! Core types for vigil.

mod category;
mod insight;
mod signal;

pub use category::SignalCategory;
pub use insight::*;
pub use signal::*;
