//! Listing controller and its event surface.
//!
//! This module contains:
//! - The list filter/sort controller (controller.rs)
//! - Events published to the rendering layer (events.rs)

pub mod controller;
pub mod events;

pub use controller::{ListController, ListingView};
pub use events::{EventBus, ListEvent};
