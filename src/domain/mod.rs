//! Core domain types shared by the services and the controller.

mod item;

pub use item::{ItemId, ListDomain, ListItem};
