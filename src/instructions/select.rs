//! `selecting` (§4.4.3, first half): column projection.

use crate::error::{CompileError, CompileResult};
use crate::model::{get_field_from_model, Field, Model};
use crate::query::QueryKind;
use std::collections::HashSet;

/// One projected column: its SQL selector and the dotted output path rows
/// are reshaped into (§6, "mounting path").
#[derive(Debug, Clone)]
pub struct LoadedField {
    pub mounting_path: String,
    pub select_sql: String,
}

/// The outcome of resolving a query's `selecting` member.
pub struct Selection {
    /// Always populated (with the model's defaulted fields when `selecting`
    /// is absent) so result reshaping has a field list to assign against.
    pub loaded_fields: Vec<LoadedField>,
    /// Whether the caller supplied an explicit `selecting` list. When false
    /// the composer emits a bare `*` instead of spelling out every column.
    pub explicit: bool,
}

pub fn resolve_selection(
    model: &Model,
    selecting: Option<&[String]>,
    kind: QueryKind,
) -> CompileResult<Selection> {
    if matches!(kind, QueryKind::Count) {
        return Ok(Selection {
            loaded_fields: Vec::new(),
            explicit: false,
        });
    }

    let explicit = selecting.is_some();
    let fields = match selecting {
        None => model.fields.iter().collect::<Vec<_>>(),
        Some(list) => resolve_selecting_list(model, list)?,
    };

    let loaded_fields = fields
        .into_iter()
        .map(|field| loaded_field_for(model, field))
        .collect::<CompileResult<Vec<_>>>()?;

    Ok(Selection {
        loaded_fields,
        explicit,
    })
}

fn loaded_field_for(model: &Model, field: &Field) -> CompileResult<LoadedField> {
    let selector = get_field_from_model(model, &field.slug, "", true)?.expect("field exists");
    Ok(LoadedField {
        mounting_path: field.slug.clone(),
        select_sql: format!("{} as \"{}\"", selector.read, field.slug),
    })
}

/// Expand a `selecting` list: `**`/`*` means "every field", `!slug` excludes
/// a field (used by the default many-link presets: `['**','!source','!target']`).
fn resolve_selecting_list<'a>(model: &'a Model, list: &[String]) -> CompileResult<Vec<&'a Field>> {
    let excluded: HashSet<&str> = list
        .iter()
        .filter_map(|item| item.strip_prefix('!'))
        .collect();

    let mut result: Vec<&Field> = Vec::new();
    let mut seen: HashSet<&str> = HashSet::new();

    for item in list {
        if item.starts_with('!') {
            continue;
        }
        if item == "*" || item == "**" {
            for field in &model.fields {
                if !excluded.contains(field.slug.as_str()) && seen.insert(field.slug.as_str()) {
                    result.push(field);
                }
            }
        } else if !excluded.contains(item.as_str()) {
            let field = model
                .field(item)
                .ok_or_else(|| CompileError::field_not_found(&model.slug, item))?;
            if seen.insert(field.slug.as_str()) {
                result.push(field);
            }
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldType;

    fn model() -> Model {
        let mut m = Model::bare("account");
        m.fields.push(Field::new("handle", FieldType::String));
        m.fields.push(Field::new("email", FieldType::String));
        m
    }

    #[test]
    fn no_selecting_defaults_to_all_fields_not_explicit() {
        let m = model();
        let selection = resolve_selection(&m, None, QueryKind::Get).unwrap();
        assert!(!selection.explicit);
        assert_eq!(selection.loaded_fields.len(), 2);
    }

    #[test]
    fn wildcard_with_exclusions() {
        let m = model();
        let list = vec!["**".to_string(), "!email".to_string()];
        let selection = resolve_selection(&m, Some(&list), QueryKind::Get).unwrap();
        assert_eq!(selection.loaded_fields.len(), 1);
        assert_eq!(selection.loaded_fields[0].mounting_path, "handle");
    }

    #[test]
    fn unknown_field_errors() {
        let m = model();
        let list = vec!["missing".to_string()];
        assert!(resolve_selection(&m, Some(&list), QueryKind::Get).is_err());
    }
}
