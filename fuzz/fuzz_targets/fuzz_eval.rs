#![no_main]
use docctl::query::{SearchConfig, SearchOptions, compute_pre_query};
use docctl::store::run_pipeline;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 8192 { return; }
    if let Ok(s) = std::str::from_utf8(data) {
        let Ok(pre) = compute_pre_query(&SearchConfig::default(), &SearchOptions::new().filter(s)) else { return };
        // A tiny collection with a few shapes to exercise eval paths
        let docs = vec![
            bson::doc!{"a": 1, "b": 2, "name": "x"},
            bson::doc!{"a": 10, "b": -5, "name": "y", "nested": {"z": 3}},
            bson::doc!{"active": true, "tags": ["p", "q"]},
        ];
        let _ = run_pipeline("fuzz", &docs, &pre.to_documents());
    }
});
