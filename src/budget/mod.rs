//! Budget module - dynamic rate controller and oracle price guard

mod controller;
mod price_guard;

pub use controller::*;
pub use price_guard::*;
