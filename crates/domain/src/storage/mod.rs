//! Store capabilities consumed by every DOTM component.

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::*;
