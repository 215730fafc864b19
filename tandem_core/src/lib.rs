// tandem_core/src/lib.rs

// This file defines the public modules of the library.
pub mod agents;
pub mod attention;
pub mod autodiff;
pub mod constants;
pub mod environment;
pub mod error;
pub mod modules;
pub mod prelude;
pub mod session;
pub mod solver;
pub mod types;
