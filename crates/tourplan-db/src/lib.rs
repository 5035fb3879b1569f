pub mod error;
mod migration;
pub mod slots;
pub mod store;

pub use error::{Error, Result};
pub use slots::{SessionSlots, Slot};
pub use store::Store;
