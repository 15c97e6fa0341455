pub mod config;
pub mod controller;
pub mod document;
pub mod errors;
pub mod logger;
pub mod query;
pub mod store;

pub use config::AppConfig;
pub use controller::{
    Controller, ControllerOptions, Event, EventKind, Hooks, LanguageMatch, MultiLanguageController,
    MultiLanguageOptions,
};
pub use errors::ControllerError;
pub use query::{FilterInput, SearchConfig, SearchOptions};
pub use store::{DocumentStore, FindOptions, MemoryStore};

/// Initializes logging from `log4rs.yaml` when one is present.
///
/// This function should be called once, before any controller is created.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    logger::init()?;
    Ok(())
}
