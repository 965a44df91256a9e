//! Core types, storage traits and selection/quota logic for the KeaMed
//! learning backend.
//!
//! No HTTP or database code lives here. Storage backends implement the
//! traits in [`store`]; the services in [`quiz`] and [`limits`] are generic
//! over them.

pub mod account;
pub mod error;
pub mod exam;
pub mod gap;
pub mod labeling;
pub mod limits;
pub mod question;
pub mod quiz;
pub mod selector;
pub mod store;
pub mod usage;

pub use error::{Error, Result};
