// Submodules for separation of concerns
mod compile;
mod normalize;
mod pair;
mod pipeline;
mod search;
pub mod update;

// Public API re-exports
pub use compile::{
    FilterInput, SearchConfig, SearchOptions, compute_pipeline, compute_post_query,
    compute_pre_query,
};
pub use normalize::{FORBIDDEN_OPERATORS, normalize};
pub use pair::{Pair, Pairs, find_next_pair};
pub use pipeline::{
    AggregateBuilder, Order, SortSpec, Stage, compute_option, compute_sort, parse_sort,
};
pub use search::transform_regexp_search;
