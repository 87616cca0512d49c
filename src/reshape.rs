//! Result reshaping (C6 `formatResults`, §4.6 steps 1-5): turns the driver's
//! raw row sets back into nested records, folds joined rows, and attaches
//! pagination cursors.

use crate::error::CompileResult;
use crate::flatten::expand;
use crate::instructions::select::LoadedField;
use crate::pagination::encode_cursor;
use crate::query::{OrderedBy, QueryKind};
use indexmap::IndexMap;
use serde_json::Value as Json;

/// Everything `format_results` needs about the query that produced `rows`,
/// carried over from the [`crate::compose::CompiledQuery`] that compiled it.
pub struct ResultShape<'a> {
    pub kind: QueryKind,
    pub is_single_record: bool,
    pub loaded_fields: &'a [LoadedField],
    pub ordered_by: &'a OrderedBy,
    pub limited_to: Option<u32>,
    pub paging_backwards: bool,
}

/// The default page size (§4.4.5): `LIMIT <pageSize + 1>` probes for a next page.
pub const PAGE_SIZE: usize = 100;

/// Step 2: normalise one driver-returned row into a positional value list.
fn normalize_row(row: &Json) -> Vec<Json> {
    match row {
        Json::Array(items) => items.clone(),
        Json::Object(map) => map.values().cloned().collect(),
        other => vec![other.clone()],
    }
}

/// Step 3: assign a row's values at their fields' mounting paths, collapsing
/// a joined group to `null`/`[]` when its head row has `id = null`.
fn assign_row(loaded_fields: &[LoadedField], row: &Json) -> Json {
    let values = normalize_row(row);
    let mut flat: IndexMap<String, Json> = IndexMap::new();
    for (field, value) in loaded_fields.iter().zip(values.into_iter()) {
        flat.insert(field.mounting_path.clone(), value);
    }

    let null_array_groups: Vec<String> = flat
        .keys()
        .filter_map(|k| k.strip_suffix("[0].id").map(str::to_string))
        .filter(|prefix| matches!(flat.get(&format!("{prefix}[0].id")), Some(Json::Null)))
        .collect();
    for prefix in null_array_groups {
        let marker = format!("{prefix}[0].");
        flat.retain(|k, _| !k.starts_with(&marker));
        flat.insert(prefix, Json::Array(Vec::new()));
    }

    let null_object_groups: Vec<String> = flat
        .keys()
        .filter_map(|k| k.strip_suffix(".id").map(str::to_string))
        .filter(|prefix| matches!(flat.get(&format!("{prefix}.id")), Some(Json::Null)))
        .collect();
    for prefix in null_object_groups {
        let marker = format!("{prefix}.");
        flat.retain(|k, _| !k.starts_with(&marker));
        flat.insert(prefix, Json::Null);
    }

    expand(&flat)
}

/// Step 4: fold consecutive rows sharing a primary `id` into one record,
/// appending join-array values de-duplicated by inner `id`.
fn fold_rows(records: Vec<Json>) -> Vec<Json> {
    let mut out: Vec<Json> = Vec::with_capacity(records.len());
    for record in records {
        let id = record.get("id").cloned();
        let merged = id.is_some()
            && out
                .last()
                .is_some_and(|last: &Json| last.get("id").cloned() == id);
        if merged {
            merge_join_arrays(out.last_mut().expect("checked above"), &record);
        } else {
            out.push(record);
        }
    }
    out
}

fn merge_join_arrays(dst: &mut Json, src: &Json) {
    let (Json::Object(dst_map), Json::Object(src_map)) = (dst, src) else {
        return;
    };
    for (key, src_value) in src_map.iter() {
        let Json::Array(src_items) = src_value else {
            continue;
        };
        let dst_value = dst_map
            .entry(key.clone())
            .or_insert_with(|| Json::Array(Vec::new()));
        let Json::Array(dst_items) = dst_value else {
            continue;
        };
        for item in src_items {
            let item_id = item.get("id").and_then(Json::as_str);
            let already_present = item_id
                .is_some_and(|id| dst_items.iter().any(|e| e.get("id").and_then(Json::as_str) == Some(id)));
            if !already_present {
                dst_items.push(item.clone());
            }
        }
    }
}

/// The top-level mounting-path segment each loaded field was assigned at,
/// in first-seen order — reported back as `modelFields` for multi-record reads.
fn model_fields(loaded_fields: &[LoadedField]) -> Vec<String> {
    let mut seen = Vec::new();
    for field in loaded_fields {
        let head = field
            .mounting_path
            .split(['.', '['])
            .next()
            .unwrap_or(&field.mounting_path)
            .to_string();
        if !seen.contains(&head) {
            seen.push(head);
        }
    }
    seen
}

/// Reshape one query's (already `returning`-filtered) row set into its
/// output shape: `{record}`, `{records, moreBefore?, moreAfter?, modelFields}`,
/// or `{amount}` for `count`.
pub fn format_results(shape: &ResultShape, rows: &[Json]) -> CompileResult<Json> {
    if shape.kind == QueryKind::Count {
        let amount = rows
            .first()
            .map(normalize_row)
            .and_then(|v| v.into_iter().next())
            .unwrap_or(Json::from(0));
        return Ok(serde_json::json!({ "amount": amount }));
    }

    let assigned: Vec<Json> = rows.iter().map(|row| assign_row(shape.loaded_fields, row)).collect();
    let mut records = fold_rows(assigned);

    if shape.is_single_record {
        return Ok(serde_json::json!({ "record": records.into_iter().next() }));
    }

    // `Get` always probes one extra row at the (possibly default) page size
    // (§4.4.6); other multi-record kinds only do so when `limitedTo` was given.
    let probes_next_page = shape.kind == QueryKind::Get || shape.limited_to.is_some();
    let mut more_before = None;
    let mut more_after = None;
    if probes_next_page {
        let page_size = shape.limited_to.unwrap_or(PAGE_SIZE as u32) as usize;
        if records.len() > page_size {
            if shape.paging_backwards {
                records.remove(0);
                if let Some(first) = records.first() {
                    more_before = Some(encode_cursor(first, shape.ordered_by)?);
                }
            } else {
                records.pop();
                if let Some(last) = records.last() {
                    more_after = Some(encode_cursor(last, shape.ordered_by)?);
                }
            }
        }
    }

    Ok(serde_json::json!({
        "records": records,
        "moreBefore": more_before,
        "moreAfter": more_after,
        "modelFields": model_fields(shape.loaded_fields),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(path: &str) -> LoadedField {
        LoadedField {
            mounting_path: path.to_string(),
            select_sql: format!("\"{path}\""),
        }
    }

    #[test]
    fn assigns_plain_row_into_nested_record() {
        let fields = vec![field("id"), field("ronin.createdAt")];
        let row = json!(["acc_1", "2022-11-04T15:19:53.779Z"]);
        let record = assign_row(&fields, &row);
        assert_eq!(
            record,
            json!({"id": "acc_1", "ronin": {"createdAt": "2022-11-04T15:19:53.779Z"}})
        );
    }

    #[test]
    fn null_join_head_collapses_to_empty_array() {
        let fields = vec![field("id"), field("comments[0].id"), field("comments[0].content")];
        let row = json!(["pos_1", null, null]);
        let record = assign_row(&fields, &row);
        assert_eq!(record, json!({"id": "pos_1", "comments": []}));
    }

    #[test]
    fn null_object_head_collapses_to_null() {
        let fields = vec![field("id"), field("author.id"), field("author.name")];
        let row = json!(["pos_1", null, null]);
        let record = assign_row(&fields, &row);
        assert_eq!(record, json!({"id": "pos_1", "author": null}));
    }

    #[test]
    fn folds_consecutive_rows_sharing_id_and_dedupes_join_array() {
        let fields = vec![field("id"), field("comments[0].id"), field("comments[0].content")];
        let rows = vec![
            json!(["pos_1", "com_1", "first"]),
            json!(["pos_1", "com_2", "second"]),
            json!(["pos_1", "com_1", "first"]),
        ];
        let assigned: Vec<Json> = rows.iter().map(|r| assign_row(&fields, r)).collect();
        let folded = fold_rows(assigned);
        assert_eq!(folded.len(), 1);
        assert_eq!(
            folded[0],
            json!({"id": "pos_1", "comments": [{"id": "com_1", "content": "first"}, {"id": "com_2", "content": "second"}]})
        );
    }

    #[test]
    fn count_unwraps_scalar() {
        let shape = ResultShape {
            kind: QueryKind::Count,
            is_single_record: false,
            loaded_fields: &[],
            ordered_by: &OrderedBy::default(),
            limited_to: None,
            paging_backwards: false,
        };
        let out = format_results(&shape, &[json!([3])]).unwrap();
        assert_eq!(out, json!({"amount": 3}));
    }

    #[test]
    fn multi_record_pops_extra_probe_row_and_emits_more_after() {
        let fields = vec![field("id"), field("handle")];
        let rows: Vec<Json> = (0..3)
            .map(|i| json!([format!("acc_{i}"), format!("user{i}")]))
            .collect();
        let shape = ResultShape {
            kind: QueryKind::Get,
            is_single_record: false,
            loaded_fields: &fields,
            ordered_by: &OrderedBy {
                ascending: vec!["handle".to_string()],
                descending: vec![],
            },
            limited_to: Some(2),
            paging_backwards: false,
        };
        let out = format_results(&shape, &rows).unwrap();
        let records = out.get("records").unwrap().as_array().unwrap();
        assert_eq!(records.len(), 2);
        assert!(out.get("moreAfter").unwrap().is_string());
        assert!(out.get("moreBefore").unwrap().is_null());
    }
}
