#![no_main]
use docctl::query::{SearchConfig, SearchOptions, compute_pipeline, AggregateBuilder};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        // Compiling any filter/search/sort text should not panic
        let config = SearchConfig {
            search_fields: vec!["a".into(), "stats.b".into()],
            auto_regexp_search: data.first().is_some_and(|b| b & 1 == 1),
            post_match_keywords: vec!["stats.".into()],
        };
        let opts = SearchOptions::new().search(s).filter(s).sort(s).page(2, 10);
        let _ = compute_pipeline(&config, &opts, AggregateBuilder::new());
    }
});
