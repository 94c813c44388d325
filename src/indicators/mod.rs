//! Pure numeric indicator functions
//!
//! Stateless transforms over price windows. No shared state, no side effects;
//! every function takes a slice and returns a value (or `None` when the
//! window is too short). Callers own the windows and decide how much history
//! to keep.

pub mod ehlers;
pub mod roc;
pub mod wma;

pub use ehlers::{decycler, super_smoother};
pub use roc::{price_range, roc};
pub use wma::{hma, wma};
