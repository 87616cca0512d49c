//! `using` / `for` (§4.4.7): preset splicing.

use crate::error::CompileResult;
use crate::model::Model;
use crate::query::{Instructions, OrderedBy, UsingPresets};
use indexmap::IndexMap;
use serde_json::Value as Json;

/// The sentinel a preset's stored instructions use to mark "substitute the
/// caller's argument here" (`using: {preset: arg}` form).
const VALUE: &str = "VALUE";

/// Splice every preset named in `instructions.using` into `instructions`,
/// in list order, and return the merged result. A query without `using`
/// passes through unchanged.
pub fn apply_presets(model: &Model, instructions: Option<Instructions>) -> CompileResult<Option<Instructions>> {
    let Some(mut instructions) = instructions else {
        return Ok(None);
    };
    let Some(using) = instructions.using.take() else {
        return Ok(Some(instructions));
    };

    let slugs: Vec<(String, Option<Json>)> = match using {
        UsingPresets::List(list) => list.into_iter().map(|slug| (slug, None)).collect(),
        UsingPresets::Map(map) => map.into_iter().collect(),
    };

    for (slug, arg) in slugs {
        let preset = crate::model::get_preset(model, &slug)?;
        let substituted = substitute_value(&preset.instructions, arg.as_ref());
        let preset_instructions = Instructions::from_json(&substituted)?;
        merge_into(&mut instructions, preset_instructions);
    }

    Ok(Some(instructions))
}

/// Replace every occurrence of the bare `"VALUE"` string with the caller's
/// supplied argument (or drop it, as `null`, when no argument was given).
fn substitute_value(json: &Json, arg: Option<&Json>) -> Json {
    match json {
        Json::String(s) if s == VALUE => arg.cloned().unwrap_or(Json::Null),
        Json::Array(items) => Json::Array(items.iter().map(|v| substitute_value(v, arg)).collect()),
        Json::Object(map) => Json::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_value(v, arg)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Merge a preset's parsed instructions into the query's: objects are
/// shallow-extended, arrays concatenated, absent members assigned.
fn merge_into(target: &mut Instructions, preset: Instructions) {
    target.with = merge_with(target.with.take(), preset.with);
    target.to = merge_index_map(target.to.take(), preset.to);
    target.selecting = merge_vec(target.selecting.take(), preset.selecting);
    target.including = merge_index_map(target.including.take(), preset.including);
    target.ordered_by = merge_ordered_by(std::mem::take(&mut target.ordered_by), preset.ordered_by);
    target.before = target.before.take().or(preset.before);
    target.after = target.after.take().or(preset.after);
    target.limited_to = target.limited_to.or(preset.limited_to);
}

/// Preset keys take precedence in both ordering and value: a spliced preset's
/// `with` filter is the outer conjunct, so it lands first in the compiled
/// `WHERE` clause, and the caller can't override it by naming the same key.
fn merge_with(existing: Option<Json>, preset: Option<Json>) -> Option<Json> {
    match (existing, preset) {
        (Some(Json::Object(a)), Some(Json::Object(mut b))) => {
            for (k, v) in a {
                b.entry(k).or_insert(v);
            }
            Some(Json::Object(b))
        }
        (Some(a), None) => Some(a),
        (None, b) => b,
        (Some(a), Some(_)) => Some(a),
    }
}

fn merge_index_map(
    existing: Option<IndexMap<String, Json>>,
    preset: Option<IndexMap<String, Json>>,
) -> Option<IndexMap<String, Json>> {
    match (existing, preset) {
        (Some(mut a), Some(b)) => {
            for (k, v) in b {
                a.insert(k, v);
            }
            Some(a)
        }
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn merge_vec(existing: Option<Vec<String>>, preset: Option<Vec<String>>) -> Option<Vec<String>> {
    match (existing, preset) {
        (Some(mut a), Some(b)) => {
            a.extend(b);
            Some(a)
        }
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

fn merge_ordered_by(mut existing: OrderedBy, preset: OrderedBy) -> OrderedBy {
    existing.ascending.extend(preset.ascending);
    existing.descending.extend(preset.descending);
    existing
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Preset;
    use serde_json::json;

    #[test]
    fn unknown_preset_errors() {
        let model = Model::bare("account");
        let mut instructions = Instructions::default();
        instructions.using = Some(UsingPresets::List(vec!["missing".to_string()]));
        let err = apply_presets(&model, Some(instructions)).unwrap_err();
        assert_eq!(err.code(), "PRESET_NOT_FOUND");
    }

    #[test]
    fn preset_with_merges_shallow() {
        let mut model = Model::bare("member");
        model.presets.push(Preset {
            slug: "specificTeam".to_string(),
            instructions: json!({"with": {"team": "tea_1"}}),
        });
        let mut instructions = Instructions::default();
        instructions.with = Some(json!({"account": "acc_1"}));
        instructions.using = Some(UsingPresets::List(vec!["specificTeam".to_string()]));

        let merged = apply_presets(&model, Some(instructions)).unwrap().unwrap();
        let with = merged.with.unwrap();
        assert_eq!(with["account"], json!("acc_1"));
        assert_eq!(with["team"], json!("tea_1"));

        // preset keys precede the caller's own keys (§8 scenario 4)
        let keys: Vec<&String> = with.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["team", "account"]);
    }

    #[test]
    fn value_symbol_is_substituted_from_argument() {
        let mut model = Model::bare("member");
        model.presets.push(Preset {
            slug: "byTeam".to_string(),
            instructions: json!({"with": {"team": "VALUE"}}),
        });
        let mut instructions = Instructions::default();
        let mut using = IndexMap::new();
        using.insert("byTeam".to_string(), Some(json!("tea_9")));
        instructions.using = Some(UsingPresets::Map(using));

        let merged = apply_presets(&model, Some(instructions)).unwrap().unwrap();
        assert_eq!(merged.with.unwrap()["team"], json!("tea_9"));
    }

    #[test]
    fn no_using_passes_through_unchanged() {
        let model = Model::bare("account");
        let mut instructions = Instructions::default();
        instructions.limited_to = Some(5);
        let merged = apply_presets(&model, Some(instructions)).unwrap().unwrap();
        assert_eq!(merged.limited_to, Some(5));
    }
}
