//! Systems - logic that operates on components

mod economy;
mod host;

pub use economy::*;
pub use host::*;
