//! Configuration module for gridquery.
//!
//! Handles resolver and query-planning settings.

mod settings;

pub use settings::{QuerySettings, ResolverSettings, Settings, SettingsError};
