//! Item Catalog
//! Mission: Role-gated item records

pub mod api;
pub mod models;
pub mod store;

pub use models::{Item, ItemPatch, NewItem};
pub use store::ItemStore;
