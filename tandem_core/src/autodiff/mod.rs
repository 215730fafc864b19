// tandem_core/src/autodiff/mod.rs

//! Differentiation support. Module values are evaluated on `num_dual` dual numbers: seeding one
//! control with a unit derivative and pushing it through the ego dynamics and the pedestrian
//! prediction yields one column of every derivative at once. Finite differences serve as the
//! Jacobian fallback and as a cross-check in tests.

pub mod dual;
pub mod finite_diff;
pub mod vec2;

pub use dual::{constant, log_sum_exp, max_f64, sum};
pub use num_dual::{Dual64, DualNum};
pub use vec2::Vec2;
