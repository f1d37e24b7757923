use std::collections::HashMap;

use serde_json::{Map, Value};

// Not derived via thiserror: the `source` field name would be inferred as the
// error's source cause, which `usize` cannot be.
#[derive(Debug)]
pub enum MergeError {
    LengthMismatch { target: usize, source: usize },
    NotAnObject { index: usize },
}

impl std::fmt::Display for MergeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeError::LengthMismatch { target, source } => write!(
                f,
                "Top-level collections differ in length ({target} vs {source}); cannot align by position"
            ),
            MergeError::NotAnObject { index } => {
                write!(f, "Top-level element {index} is not an object")
            }
        }
    }
}

impl std::error::Error for MergeError {}

/// Fills gaps in `target` from `source`, in place.
///
/// The two collections are aligned positionally at the top level (they must
/// describe the same logical entities, in the same order), so their lengths
/// must match. Inside each pair of objects the merge is fill-only:
///
/// - keys absent from the target are copied over (deep copy);
/// - object values recurse;
/// - lists whose source elements are all objects carrying `id_key` are merged
///   by that id rather than by position, appending unmatched source elements;
/// - anything else is replaced only when the target value [`is_missing`].
///
/// `source` is never mutated, and values copied out of it are independent
/// clones.
pub fn merge_missing_by_id(
    target: &mut [Value],
    source: &[Value],
    id_key: &str,
) -> Result<(), MergeError> {
    if target.len() != source.len() {
        return Err(MergeError::LengthMismatch {
            target: target.len(),
            source: source.len(),
        });
    }

    for (index, (a, b)) in target.iter_mut().zip(source).enumerate() {
        match (a, b) {
            (Value::Object(ma), Value::Object(mb)) => merge_object(ma, mb, id_key),
            _ => return Err(MergeError::NotAnObject { index }),
        }
    }

    Ok(())
}

fn merge_object(target: &mut Map<String, Value>, source: &Map<String, Value>, id_key: &str) {
    for (key, vb) in source {
        if !target.contains_key(key) {
            target.insert(key.clone(), vb.clone());
            continue;
        }
        let Some(va) = target.get_mut(key) else {
            continue;
        };

        match (va, vb) {
            (Value::Object(ma), Value::Object(mb)) => merge_object(ma, mb, id_key),
            (Value::Array(la), Value::Array(lb)) if is_id_keyed_list(lb, id_key) => {
                merge_list_by_id(la, lb, id_key);
            }
            (va, vb) => {
                if is_missing(va) {
                    *va = vb.clone();
                }
            }
        }
    }
}

fn is_id_keyed_list(list: &[Value], id_key: &str) -> bool {
    list.iter()
        .all(|item| item.as_object().is_some_and(|obj| obj.contains_key(id_key)))
}

/// Aligns `target` with `source` by id. Matched elements merge recursively;
/// unmatched source elements are appended in source order. The lookup covers
/// only the original target elements, so a freshly appended element can never
/// be matched by a later source element with the same id.
fn merge_list_by_id(target: &mut Vec<Value>, source: &[Value], id_key: &str) {
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, item) in target.iter().enumerate() {
        if let Some(id) = item.as_object().and_then(|obj| obj.get(id_key)) {
            // Elements without the id are left untouched and never matched.
            // On duplicate ids the last occurrence wins.
            index.insert(id.to_string(), i);
        }
    }

    for item_b in source {
        let Some(ob) = item_b.as_object() else {
            continue;
        };
        let Some(id) = ob.get(id_key) else {
            continue;
        };
        match index.get(&id.to_string()) {
            Some(&i) => {
                if let Some(ma) = target[i].as_object_mut() {
                    merge_object(ma, ob, id_key);
                }
            }
            None => target.push(item_b.clone()),
        }
    }
}

/// Whether a value counts as "empty" for merge purposes: null, `""`, an empty
/// list, an empty object, or numeric zero. Deliberately narrower than falsy:
/// `false` is a real value and is never overwritten. Numeric zero counting as
/// missing is inherited behavior (a zero already in the target gets replaced).
pub fn is_missing(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(_) => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merge_pair(a: Value, b: Value) -> Value {
        let mut target = vec![a];
        merge_missing_by_id(&mut target, &[b], "id").unwrap();
        target.pop().unwrap()
    }

    #[test]
    fn test_missing_predicate() {
        assert!(is_missing(&Value::Null));
        assert!(is_missing(&json!("")));
        assert!(is_missing(&json!([])));
        assert!(is_missing(&json!({})));
        assert!(is_missing(&json!(0)));
        assert!(is_missing(&json!(0.0)));

        assert!(!is_missing(&json!(false)));
        assert!(!is_missing(&json!(true)));
        assert!(!is_missing(&json!(1)));
        assert!(!is_missing(&json!(-3.5)));
        assert!(!is_missing(&json!("x")));
        assert!(!is_missing(&json!([0])));
        assert!(!is_missing(&json!({"k": null})));
    }

    #[test]
    fn test_length_mismatch_is_an_error() {
        let mut target = vec![json!({"id": "a"})];
        let source = vec![json!({"id": "a"}), json!({"id": "b"})];
        let err = merge_missing_by_id(&mut target, &source, "id").unwrap_err();
        assert!(matches!(
            err,
            MergeError::LengthMismatch {
                target: 1,
                source: 2
            }
        ));

        let mut target = vec![json!({}), json!({})];
        let err = merge_missing_by_id(&mut target, &[], "id").unwrap_err();
        assert!(matches!(err, MergeError::LengthMismatch { .. }));
    }

    #[test]
    fn test_non_object_top_level_is_an_error() {
        let mut target = vec![json!([1, 2])];
        let source = vec![json!({"id": "a"})];
        let err = merge_missing_by_id(&mut target, &source, "id").unwrap_err();
        assert!(matches!(err, MergeError::NotAnObject { index: 0 }));

        let mut target = vec![json!({"id": "a"})];
        let source = vec![json!("scalar")];
        let err = merge_missing_by_id(&mut target, &source, "id").unwrap_err();
        assert!(matches!(err, MergeError::NotAnObject { index: 0 }));
    }

    #[test]
    fn test_present_values_are_never_overwritten() {
        let merged = merge_pair(
            json!({"name": "Song", "explicit": false, "popularity": 10}),
            json!({"name": "Other", "explicit": true, "popularity": 99}),
        );
        assert_eq!(merged["name"], "Song");
        assert_eq!(merged["explicit"], false);
        assert_eq!(merged["popularity"], 10);
    }

    #[test]
    fn test_missing_values_are_filled() {
        let merged = merge_pair(
            json!({"name": "", "duration_ms": 0, "href": null}),
            json!({"name": "Song", "duration_ms": 200, "href": "spotify:x", "extra": 7}),
        );
        assert_eq!(merged["name"], "Song");
        assert_eq!(merged["duration_ms"], 200);
        assert_eq!(merged["href"], "spotify:x");
        assert_eq!(merged["extra"], 7);
    }

    #[test]
    fn test_copied_values_are_independent_of_source() {
        let source = vec![json!({"id": "a", "album": {"images": [{"url": "u"}]}})];
        let mut target = vec![json!({"id": "a"})];
        merge_missing_by_id(&mut target, &source, "id").unwrap();
        assert_eq!(target[0]["album"], source[0]["album"]);

        // Mutating the copy must not show through to the source.
        target[0]["album"]["images"][0]["url"] = json!("changed");
        assert_eq!(source[0]["album"]["images"][0]["url"], "u");
    }

    #[test]
    fn test_nested_objects_recurse() {
        let merged = merge_pair(
            json!({"album": {"name": "A", "release_date": ""}}),
            json!({"album": {"name": "B", "release_date": "2001", "label": "L"}}),
        );
        assert_eq!(merged["album"]["name"], "A");
        assert_eq!(merged["album"]["release_date"], "2001");
        assert_eq!(merged["album"]["label"], "L");
    }

    #[test]
    fn test_lists_merge_by_id_not_position() {
        let merged = merge_pair(
            json!({"artists": [
                {"id": "a1", "name": "First"},
                {"id": "a2", "name": ""},
            ]}),
            json!({"artists": [
                {"id": "a2", "name": "Second", "genres": ["pop"]},
                {"id": "a1", "uri": "spotify:a1"},
            ]}),
        );
        let artists = merged["artists"].as_array().unwrap();
        assert_eq!(artists.len(), 2);
        assert_eq!(artists[0]["id"], "a1");
        assert_eq!(artists[0]["name"], "First");
        assert_eq!(artists[0]["uri"], "spotify:a1");
        assert_eq!(artists[1]["name"], "Second");
        assert_eq!(artists[1]["genres"], json!(["pop"]));
    }

    #[test]
    fn test_unmatched_source_elements_are_appended_in_order() {
        let merged = merge_pair(
            json!({"items": [{"id": "x"}]}),
            json!({"items": [{"id": "n2"}, {"id": "x", "v": 1}, {"id": "n1"}]}),
        );
        let items = merged["items"].as_array().unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0], json!({"id": "x", "v": 1}));
        assert_eq!(items[1]["id"], "n2");
        assert_eq!(items[2]["id"], "n1");
    }

    #[test]
    fn test_appended_elements_are_not_rematched() {
        // Two source elements with the same unseen id: both must be appended,
        // the second must not merge into the first one's fresh copy.
        let merged = merge_pair(
            json!({"items": []}),
            json!({"items": [{"id": "dup", "a": 1}, {"id": "dup", "b": 2}]}),
        );
        let items = merged["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], json!({"id": "dup", "a": 1}));
        assert_eq!(items[1], json!({"id": "dup", "b": 2}));
    }

    #[test]
    fn test_target_elements_without_id_are_left_alone() {
        let merged = merge_pair(
            json!({"items": [{"name": "anonymous"}, {"id": "a", "name": ""}]}),
            json!({"items": [{"id": "a", "name": "Named"}]}),
        );
        let items = merged["items"].as_array().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], json!({"name": "anonymous"}));
        assert_eq!(items[1]["name"], "Named");
    }

    #[test]
    fn test_list_without_ids_falls_back_to_missing_check() {
        // Source list elements lack the id key, so the list is treated as an
        // opaque value: kept when the target has one, copied when it is empty.
        let merged = merge_pair(
            json!({"markets": ["US"], "images": []}),
            json!({"markets": ["US", "DE"], "images": [{"url": "u"}]}),
        );
        assert_eq!(merged["markets"], json!(["US"]));
        assert_eq!(merged["images"], json!([{"url": "u"}]));
    }

    #[test]
    fn test_shape_mismatch_keeps_target_value() {
        let merged = merge_pair(
            json!({"field": {"nested": 1}}),
            json!({"field": [1, 2, 3]}),
        );
        assert_eq!(merged["field"], json!({"nested": 1}));
    }

    #[test]
    fn test_zero_is_overwritten_end_to_end() {
        // Documented quirk: a literal 0 in the target counts as missing.
        let mut target = vec![
            json!({"id": "t1", "name": "Song", "disc_number": 0}),
            json!({"id": "t2"}),
        ];
        let source = vec![
            json!({"id": "t1", "name": "Other", "disc_number": 2, "duration_ms": 200}),
            json!({"id": "t2", "name": "Song2", "disc_number": 2}),
        ];
        merge_missing_by_id(&mut target, &source, "id").unwrap();

        assert_eq!(
            target[0],
            json!({"id": "t1", "name": "Song", "disc_number": 2, "duration_ms": 200})
        );
        assert_eq!(
            target[1],
            json!({"id": "t2", "name": "Song2", "disc_number": 2})
        );
    }
}
