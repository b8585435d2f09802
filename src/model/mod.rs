pub mod common;
pub mod filter;
pub mod item;
pub mod provenance;
pub mod taxonomy;

pub use common::*;
pub use filter::*;
pub use item::*;
pub use provenance::*;
pub use taxonomy::*;
