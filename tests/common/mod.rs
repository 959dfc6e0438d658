pub mod faults;
pub mod fixtures;

pub use faults::*;
pub use fixtures::*;
