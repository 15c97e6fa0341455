mod core;
mod hooks;
mod multi_language;
mod ops;

pub use self::core::{Controller, ControllerOptions, CustomStages};
pub use hooks::{Event, EventKind, Hooks, Listener};
pub use multi_language::{LANGUAGE_FIELD, LanguageMatch, MultiLanguageController, MultiLanguageOptions, language_stages};
