use super::hooks::{Event, EventKind, Hooks};
use crate::errors::ControllerError;
use crate::query::{self, AggregateBuilder, SearchConfig, SearchOptions};
use crate::store::DocumentStore;
use std::fmt;
use std::sync::Arc;

/// Produces the custom stages spliced between the pre- and post-match stages.
pub type CustomStages = Arc<dyn Fn(&SearchOptions) -> AggregateBuilder + Send + Sync>;

/// Construction options of a [`Controller`].
#[derive(Clone, Default)]
pub struct ControllerOptions {
    pub search: SearchConfig,
    pub build_aggregate: Option<CustomStages>,
}

impl fmt::Debug for ControllerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerOptions")
            .field("search", &self.search)
            .field("build_aggregate", &self.build_aggregate.is_some())
            .finish()
    }
}

impl ControllerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn search_fields<I, T>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.search.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub const fn auto_regexp_search(mut self, on: bool) -> Self {
        self.search.auto_regexp_search = on;
        self
    }

    #[must_use]
    pub fn post_match_keywords<I, T>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.search.post_match_keywords = keywords.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn build_aggregate<F>(mut self, f: F) -> Self
    where
        F: Fn(&SearchOptions) -> AggregateBuilder + Send + Sync + 'static,
    {
        self.build_aggregate = Some(Arc::new(f));
        self
    }
}

/// CRUD, search and count over one collection of a [`DocumentStore`].
pub struct Controller<S: DocumentStore + ?Sized> {
    pub(crate) store: Arc<S>,
    pub(crate) name: String,
    pub(crate) config: SearchConfig,
    pub(crate) build_aggregate: Option<CustomStages>,
    pub(crate) hooks: Hooks,
}

impl<S: DocumentStore + ?Sized> fmt::Debug for Controller<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("hooks", &self.hooks)
            .finish_non_exhaustive()
    }
}

impl<S: DocumentStore + ?Sized> Controller<S> {
    /// # Errors
    /// `InvalidCollection` when the store has no name.
    pub fn new(store: Arc<S>, options: ControllerOptions) -> Result<Self, ControllerError> {
        Self::new_with_hooks(store, options, Hooks::new())
    }

    /// Like [`Controller::new`] with listeners registered up front, so they
    /// observe the `created` event.
    ///
    /// # Errors
    /// `InvalidCollection` when the store has no name, or a `created` listener error.
    pub fn new_with_hooks(store: Arc<S>, options: ControllerOptions, hooks: Hooks) -> Result<Self, ControllerError> {
        let name = store.name().to_string();
        if name.trim().is_empty() {
            return Err(ControllerError::InvalidCollection("collection cannot be empty".into()));
        }
        let controller =
            Self { store, name, config: options.search, build_aggregate: options.build_aggregate, hooks };
        controller.hooks.emit(&Event::Created)?;
        log::debug!("created controller [{}] with {:?}", controller.name, controller.config);
        Ok(controller)
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    #[must_use]
    pub const fn search_config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn set_search_config(&mut self, config: SearchConfig) {
        log::debug!("[{}] search config replaced: {config:?}", self.name);
        self.config = config;
    }

    #[must_use]
    pub const fn search_config_mut(&mut self) -> &mut SearchConfig {
        &mut self.config
    }

    #[must_use]
    pub const fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn on<F>(&self, kind: EventKind, f: F) -> &Self
    where
        F: Fn(&Event<'_>) -> Result<(), ControllerError> + Send + Sync + 'static,
    {
        self.hooks.on(kind, f);
        self
    }

    pub fn once<F>(&self, kind: EventKind, f: F) -> &Self
    where
        F: Fn(&Event<'_>) -> Result<(), ControllerError> + Send + Sync + 'static,
    {
        self.hooks.once(kind, f);
        self
    }

    /// Stages supplied by the configured `build_aggregate` hook; empty without one.
    #[must_use]
    pub fn custom_stages(&self, options: &SearchOptions) -> AggregateBuilder {
        self.build_aggregate.as_ref().map_or_else(AggregateBuilder::new, |f| f(options))
    }

    /// # Errors
    /// Propagates normalizer failures such as `InvalidOperator`.
    pub fn compute_pre_query(&self, options: &SearchOptions) -> Result<AggregateBuilder, ControllerError> {
        query::compute_pre_query(&self.config, options)
    }

    /// # Errors
    /// Propagates normalizer failures such as `InvalidOperator`.
    pub fn compute_post_query(&self, options: &SearchOptions) -> Result<Option<AggregateBuilder>, ControllerError> {
        query::compute_post_query(&self.config, options)
    }

    #[must_use]
    pub fn compute_sort(&self, sort: Option<&str>) -> Option<AggregateBuilder> {
        query::compute_sort(sort)
    }

    #[must_use]
    pub fn compute_option(&self, page: Option<u64>, page_size: Option<u64>) -> Option<AggregateBuilder> {
        query::compute_option(page, page_size)
    }

    /// # Errors
    /// Propagates normalizer failures such as `InvalidOperator`.
    pub fn compute_pipeline(&self, options: &SearchOptions) -> Result<AggregateBuilder, ControllerError> {
        query::compute_pipeline(&self.config, options, self.custom_stages(options))
    }
}
