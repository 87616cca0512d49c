//! Flatten/expand of dotted-path JSON trees, and deep substring search.
//!
//! Mounting paths (see the glossary) are dotted keys where an array index
//! is suffixed onto the preceding segment as `[0]`, never its own segment —
//! `comments[0].content`, not `comments.[0].content`. `flatten`/`expand` are
//! exact inverses of each other for any tree built from objects, arrays and
//! scalars.

use indexmap::IndexMap;
use serde_json::Value as Json;

/// Flatten a JSON tree into an ordered map of dotted paths to scalar leaves.
pub fn flatten(value: &Json) -> IndexMap<String, Json> {
    let mut out = IndexMap::new();
    flatten_into(value, String::new(), &mut out);
    out
}

fn flatten_into(value: &Json, prefix: String, out: &mut IndexMap<String, Json>) {
    match value {
        Json::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_into(child, path, out);
            }
        }
        Json::Array(items) if !items.is_empty() => {
            for (i, child) in items.iter().enumerate() {
                let path = format!("{prefix}[{i}]");
                flatten_into(child, path, out);
            }
        }
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}

/// Inverse of [`flatten`]: rebuild a nested JSON tree from dotted paths.
pub fn expand(flat: &IndexMap<String, Json>) -> Json {
    let mut root = Json::Object(serde_json::Map::new());
    for (path, value) in flat {
        let segments = split_path(path);
        set_path(&mut root, &segments, value.clone());
    }
    root
}

#[derive(Debug, Clone)]
enum Segment {
    Key(String),
    Index(usize),
}

fn split_path(path: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        let mut remaining = part;
        // Pull off a leading key (if any) followed by zero or more `[n]` index suffixes.
        if let Some(bracket) = remaining.find('[') {
            let (key, rest) = remaining.split_at(bracket);
            if !key.is_empty() {
                segments.push(Segment::Key(key.to_string()));
            }
            remaining = rest;
            while let Some(end) = remaining.find(']') {
                let idx_str = &remaining[1..end];
                if let Ok(idx) = idx_str.parse::<usize>() {
                    segments.push(Segment::Index(idx));
                }
                remaining = &remaining[end + 1..];
            }
        } else {
            segments.push(Segment::Key(remaining.to_string()));
        }
    }
    segments
}

fn set_path(node: &mut Json, segments: &[Segment], value: Json) {
    let Some((head, tail)) = segments.split_first() else {
        *node = value;
        return;
    };

    match head {
        Segment::Key(key) => {
            if !node.is_object() {
                *node = Json::Object(serde_json::Map::new());
            }
            let map = node.as_object_mut().expect("just ensured object");
            let entry = map
                .entry(key.clone())
                .or_insert_with(|| default_for(tail));
            set_path(entry, tail, value);
        }
        Segment::Index(idx) => {
            if !node.is_array() {
                *node = Json::Array(Vec::new());
            }
            let arr = node.as_array_mut().expect("just ensured array");
            while arr.len() <= *idx {
                arr.push(default_for(tail));
            }
            set_path(&mut arr[*idx], tail, value);
        }
    }
}

fn default_for(remaining: &[Segment]) -> Json {
    match remaining.first() {
        Some(Segment::Index(_)) => Json::Array(Vec::new()),
        Some(Segment::Key(_)) => Json::Object(serde_json::Map::new()),
        None => Json::Null,
    }
}

/// Recursively search all string leaves of a JSON tree for `needle`.
pub fn contains_substring(value: &Json, needle: &str) -> bool {
    match value {
        Json::String(s) => s.contains(needle),
        Json::Object(map) => map.values().any(|v| contains_substring(v, needle)),
        Json::Array(items) => items.iter().any(|v| contains_substring(v, needle)),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_nested_object() {
        let value = json!({"a": {"b": 1, "c": "x"}});
        let flat = flatten(&value);
        assert_eq!(flat.get("a.b"), Some(&json!(1)));
        assert_eq!(flat.get("a.c"), Some(&json!("x")));
    }

    #[test]
    fn flatten_array_uses_bracket_suffix() {
        let value = json!({"comments": [{"content": "hi"}]});
        let flat = flatten(&value);
        assert_eq!(flat.get("comments[0].content"), Some(&json!("hi")));
    }

    #[test]
    fn flatten_expand_round_trips() {
        let value = json!({"a": {"b": [1, 2, {"c": "x"}]}});
        let flat = flatten(&value);
        let rebuilt = expand(&flat);
        assert_eq!(rebuilt, value);
    }

    #[test]
    fn contains_substring_searches_all_leaves() {
        let value = json!({"a": ["needle", {"b": "haystack"}]});
        assert!(contains_substring(&value, "needle"));
        assert!(contains_substring(&value, "stack"));
        assert!(!contains_substring(&value, "missing"));
    }
}
