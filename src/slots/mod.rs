//! Station slots: the registry that owns each station's docks and the
//! allocation rules applied when bikes leave and come back.

mod allocation;
mod registry;

pub use allocation::*;
pub use registry::*;
