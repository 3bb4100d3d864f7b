//! Handlers 模块

pub mod control;
pub mod devices;
pub mod health;
pub mod locations;
pub mod rules;

pub use control::*;
pub use devices::*;
pub use health::*;
pub use locations::*;
pub use rules::*;
