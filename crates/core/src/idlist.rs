//! Semicolon-delimited id lists.
//!
//! Tag rows store their graph edges and tagged files as serialized lists:
//! every element is followed by a `;`, so `[2, 5]` serializes to `"2;5;"`
//! and the empty list to `""`. The same format carries tag-name lists on
//! the wire.

use std::fmt::Display;

/// Serialize a list, each element followed by the separator.
pub fn join<T: Display>(items: &[T]) -> String {
    let mut out = String::new();
    for item in items {
        let text = item.to_string();
        if !text.is_empty() {
            out.push_str(&text);
            out.push(';');
        }
    }
    out
}

/// Split a serialized list back into its elements, dropping empties.
pub fn split(serialized: &str) -> Vec<String> {
    serialized
        .split(';')
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a serialized list of integer ids, dropping anything unparsable.
pub fn split_ids(serialized: &str) -> Vec<i64> {
    serialized
        .split(';')
        .filter_map(|part| part.parse().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_appends_trailing_separator() {
        assert_eq!(join(&[2i64, 5, 9]), "2;5;9;");
        assert_eq!(join::<i64>(&[]), "");
    }

    #[test]
    fn split_roundtrip() {
        assert_eq!(split_ids(&join(&[2i64, 5, 9])), vec![2, 5, 9]);
        assert_eq!(split_ids(""), Vec::<i64>::new());
        assert_eq!(split_ids("7;"), vec![7]);
    }

    #[test]
    fn split_drops_empties_and_garbage() {
        assert_eq!(split(";;a;;b;"), vec!["a", "b"]);
        assert_eq!(split_ids("1;x;3;"), vec![1, 3]);
    }
}
