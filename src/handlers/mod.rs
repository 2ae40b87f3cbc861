//! HTTP handlers, one module per resource.

pub mod cities;
pub mod common;
pub mod floods;
pub mod infrastructure;
pub mod reports;
