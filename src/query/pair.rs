//! Tokenizer for the flat `key:value,key:value` filter grammar.

const KEY_VALUE_DELIMITER: char = ':';
const PAIR_DELIMITER: char = ',';

/// One `key:value` unit extracted from a filter string.
///
/// `end_index` is the byte offset just after the terminating comma, or `0`
/// when the value never reached a top-level comma.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pair {
    pub start_index: usize,
    pub end_index: usize,
    pub key: String,
    pub value: String,
}

impl Pair {
    /// Both key and value are empty: the tokenizer ran past the last pair.
    #[must_use]
    pub fn is_end(&self) -> bool {
        self.key.is_empty() && self.value.is_empty()
    }
}

const fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '$'
}

/// Extracts the next pair from `text` starting at byte offset `start_index`.
///
/// Characters outside `[A-Za-z0-9.$]` before the `:` are skipped. Inside the
/// value, `{`/`[` and `}`/`]` track nesting so commas inside embedded JSON do
/// not terminate the pair.
#[must_use]
pub fn find_next_pair(text: &str, start_index: usize) -> Pair {
    let mut pair = Pair { start_index, ..Pair::default() };
    let Some(rest) = text.get(start_index..) else {
        return pair;
    };
    let mut found_key = false;
    let mut nested: i64 = 0;

    for (offset, c) in rest.char_indices() {
        if !found_key {
            if is_key_char(c) {
                pair.key.push(c);
            } else if c == KEY_VALUE_DELIMITER {
                found_key = true;
            }
            continue;
        }
        match c {
            '{' | '[' => nested += 1,
            '}' | ']' => nested -= 1,
            _ => {}
        }
        if nested == 0 && c == PAIR_DELIMITER {
            pair.end_index = start_index + offset + c.len_utf8();
            break;
        }
        pair.value.push(c);
    }
    pair
}

/// Iterates the pairs of a filter string, appending the trailing comma the
/// tokenizer needs when it is missing.
///
/// A pair whose value never returns to nesting depth zero ends the iteration
/// and is not yielded.
pub struct Pairs {
    text: String,
    pos: usize,
    done: bool,
}

impl Pairs {
    #[must_use]
    pub fn new(text: &str) -> Self {
        let mut text = text.to_owned();
        if !text.ends_with(PAIR_DELIMITER) {
            text.push(PAIR_DELIMITER);
        }
        Self { text, pos: 0, done: false }
    }
}

impl Iterator for Pairs {
    type Item = Pair;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos > self.text.len() {
            return None;
        }
        let pair = find_next_pair(&self.text, self.pos);
        if pair.is_end() {
            self.done = true;
            return None;
        }
        if pair.end_index == 0 {
            log::debug!("unterminated filter pair dropped: key={:?}", pair.key);
            self.done = true;
            return None;
        }
        self.pos = pair.end_index;
        Some(pair)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_skips_disallowed_characters() {
        let p = find_next_pair(" fo-o :bar,", 0);
        assert_eq!(p.key, "foo");
        assert_eq!(p.value, "bar");
        assert_eq!(p.end_index, 11);
    }

    #[test]
    fn empty_input_is_the_end_pair() {
        let p = find_next_pair("", 0);
        assert_eq!(p, Pair::default());
        assert!(p.is_end());
    }

    #[test]
    fn key_without_colon_has_empty_value() {
        let p = find_next_pair("foo", 0);
        assert_eq!(p.key, "foo");
        assert_eq!(p.value, "");
        assert_eq!(p.end_index, 0);
        assert!(!p.is_end());
    }

    #[test]
    fn nested_json_value_is_kept_whole() {
        let p = find_next_pair(r#"foo:{"a":["1","2"]},"#, 0);
        assert_eq!(p.key, "foo");
        assert_eq!(p.value, r#"{"a":["1","2"]}"#);
        assert_eq!(p.end_index, 20);
    }

    #[test]
    fn out_of_range_start_is_empty() {
        let p = find_next_pair("foo:bar,", 42);
        assert!(p.is_end());
        assert_eq!(p.start_index, 42);
        assert_eq!(p.end_index, 0);
    }

    #[test]
    fn pairs_appends_trailing_comma() {
        let pairs: Vec<(String, String)> =
            Pairs::new("a:1,b:2").map(|p| (p.key, p.value)).collect();
        assert_eq!(pairs, vec![("a".into(), "1".into()), ("b".into(), "2".into())]);
    }

    #[test]
    fn pairs_stops_on_unbalanced_value() {
        let pairs: Vec<Pair> = Pairs::new("a:1,b:{\"x\":1").collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].key, "a");
    }

    #[test]
    fn multibyte_values_keep_byte_offsets() {
        let text = "name:café,city:zürich,";
        let first = find_next_pair(text, 0);
        assert_eq!(first.value, "café");
        let second = find_next_pair(text, first.end_index);
        assert_eq!(second.key, "city");
        assert_eq!(second.value, "zürich");
        assert_eq!(second.end_index, text.len());
    }
}
