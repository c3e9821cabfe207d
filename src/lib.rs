//! Filter, sort and URL-state engine for the Volvox blog and product
//! listings.
//!
//! The crate is organised as:
//! - `domain`: listing items and the two listings
//! - `services`: filtering, URL sync, debouncing, preferences, content,
//!   cookie consent
//! - `app`: the [`ListController`] tying the services together
//! - `config`: runtime settings

pub mod app;
pub mod config;
pub mod domain;
pub mod error;
pub mod services;

pub use app::{EventBus, ListController, ListEvent, ListingView};
pub use config::ListingConfig;
pub use domain::{ItemId, ListDomain, ListItem};
pub use error::{ListingError, Result};
pub use services::{apply_filters, FilterState, SortOption, ViewMode};
