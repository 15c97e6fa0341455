use docctl::query::{Pairs, find_next_pair, normalize, parse_sort};
use proptest::prelude::*;
use serde_json::Value;

proptest! {
    #[test]
    fn prop_next_pair_never_panics(text in ".{0,64}", start in 0usize..80) {
        let pair = find_next_pair(&text, start);
        prop_assert_eq!(pair.start_index, start);
        if pair.end_index != 0 {
            prop_assert!(pair.end_index > start);
            prop_assert!(pair.end_index <= text.len());
        }
    }

    #[test]
    fn prop_pairs_advance_and_terminate(text in "[a-z0-9:,{}\\[\\]\"$. ]{0,64}") {
        let mut last_end = 0usize;
        let mut count = 0usize;
        for pair in Pairs::new(&text) {
            prop_assert!(pair.start_index >= last_end);
            prop_assert!(pair.end_index > pair.start_index);
            last_end = pair.end_index;
            count += 1;
        }
        prop_assert!(count <= text.len() + 1);
    }

    #[test]
    fn prop_simple_pairs_round_trip(kv in proptest::collection::vec(("[a-z][a-z0-9.]{0,8}", "[a-z0-9]{1,8}"), 1..8)) {
        let text = kv.iter().map(|(k, v)| format!("{k}:{v}")).collect::<Vec<_>>().join(",");
        let got: Vec<(String, String)> = Pairs::new(&text).map(|p| (p.key, p.value)).collect();
        prop_assert_eq!(got, kv);
    }

    #[test]
    fn prop_plain_words_stay_strings(word in "[g-z]{1,12}") {
        prop_assume!(!word.eq_ignore_ascii_case("true") && !word.eq_ignore_ascii_case("false"));
        prop_assert_eq!(normalize(&Value::String(word.clone())).unwrap(), bson::Bson::String(word));
    }

    #[test]
    fn prop_integers_normalize_to_themselves(n in any::<i64>()) {
        let got = normalize(&Value::String(n.to_string())).unwrap();
        let back = match got {
            bson::Bson::Int32(i) => i64::from(i),
            bson::Bson::Int64(i) => i,
            other => return Err(TestCaseError::fail(format!("not an integer: {other:?}"))),
        };
        prop_assert_eq!(back, n);
    }

    #[test]
    fn prop_normalize_is_idempotent_on_scalars(n in any::<i64>(), b in any::<bool>(), word in "[g-z]{1,12}") {
        for raw in [Value::from(n), Value::from(b), Value::String(word)] {
            let once = normalize(&raw).unwrap();
            let twice = normalize(&once.clone().into_relaxed_extjson()).unwrap();
            prop_assert_eq!(once, twice);
        }
    }

    #[test]
    fn prop_sort_fields_are_never_empty(spec in "[-+a-z, ]{0,32}") {
        for key in parse_sort(&spec) {
            prop_assert!(!key.field.is_empty());
            prop_assert_eq!(key.field.trim(), key.field.as_str());
        }
    }
}
