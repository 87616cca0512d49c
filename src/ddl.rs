//! DDL lowering (C3, §4.3): rewrites `create`/`alter`/`drop` meta-queries
//! into DML against the root `model` table, pushing physical schema changes
//! as dependency statements.

use crate::compose::Statement;
use crate::error::{CompileError, CompileResult};
use crate::ident::Ident;
use crate::idgen::RandomSource;
use crate::model::{
    add_default_model_attributes, add_default_model_fields, add_default_model_presets,
    associative_model_slug, get_model_by_slug, get_model_by_slug_mut, get_system_models,
    ComputedKind, Field, Index, Model, Trigger, TriggerAction,
};
use crate::query::{Instructions, Query, QueryBody, QueryKind};
use indexmap::IndexMap;
use serde_json::json;
use serde_json::Value as Json;

/// The result of lowering one DDL query: physical dependency statements,
/// and the DML left to compile against `ronin_schema` (`None` when creating
/// the root model itself, which records no metadata about itself).
pub struct DdlLowering {
    pub dependencies: Vec<Statement>,
    pub dml: Option<Query>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Field,
    Index,
    Trigger,
    Preset,
}

impl EntityKind {
    fn from_str(s: &str) -> CompileResult<EntityKind> {
        Ok(match s {
            "field" => EntityKind::Field,
            "index" => EntityKind::Index,
            "trigger" => EntityKind::Trigger,
            "preset" => EntityKind::Preset,
            other => {
                return Err(CompileError::invalid_model_value(format!(
                    "unknown model entity kind: {other}"
                )))
            }
        })
    }

    /// The plural `ronin_schema` column this entity kind's list is stored under.
    fn column(self) -> &'static str {
        match self {
            EntityKind::Field => "fields",
            EntityKind::Index => "indexes",
            EntityKind::Trigger => "triggers",
            EntityKind::Preset => "presets",
        }
    }
}

/// A parsed `create`/`alter`/`drop` meta-query body.
pub enum DdlOperation {
    CreateModel(Json),
    AlterModelTo {
        slug: String,
        to: Json,
    },
    DropModel {
        slug: String,
    },
    AlterCreateEntity {
        slug: String,
        kind: EntityKind,
        entity: Json,
    },
    AlterAlterEntity {
        slug: String,
        kind: EntityKind,
        name: String,
        to: Json,
    },
    AlterDropEntity {
        slug: String,
        kind: EntityKind,
        name: String,
    },
}

impl DdlOperation {
    pub fn from_json(kind: QueryKind, value: &Json) -> CompileResult<DdlOperation> {
        let obj = value
            .as_object()
            .ok_or_else(|| CompileError::invalid_model_value("DDL query value must be an object"))?;
        let model_value = obj
            .get("model")
            .ok_or_else(|| CompileError::invalid_model_value("DDL query must target `model`"))?;

        match kind {
            QueryKind::Create => Ok(DdlOperation::CreateModel(model_value.clone())),
            QueryKind::Drop => {
                let slug = extract_slug(model_value)?;
                Ok(DdlOperation::DropModel { slug })
            }
            QueryKind::Alter => parse_alter(model_value),
            _ => unreachable!("DdlOperation::from_json called with a non-DDL kind"),
        }
    }
}

fn extract_slug(model_value: &Json) -> CompileResult<String> {
    let obj = model_value
        .as_object()
        .ok_or_else(|| CompileError::invalid_model_value("model reference must be an object"))?;
    let with = obj
        .get("with")
        .and_then(Json::as_object)
        .ok_or_else(|| CompileError::invalid_model_value("model reference requires `with.slug`"))?;
    with.get("slug")
        .and_then(Json::as_str)
        .map(str::to_string)
        .ok_or_else(|| CompileError::invalid_model_value("model reference requires `with.slug`"))
}

fn parse_alter(model_value: &Json) -> CompileResult<DdlOperation> {
    let obj = model_value
        .as_object()
        .ok_or_else(|| CompileError::invalid_model_value("`alter.model` must be an object"))?;
    let slug = extract_slug(model_value)?;

    if let Some(to) = obj.get("to") {
        return Ok(DdlOperation::AlterModelTo {
            slug,
            to: to.clone(),
        });
    }
    if let Some(create) = obj.get("create").and_then(Json::as_object) {
        let (kind_str, entity) = create
            .iter()
            .next()
            .ok_or_else(|| CompileError::invalid_model_value("`create` must name one entity kind"))?;
        return Ok(DdlOperation::AlterCreateEntity {
            slug,
            kind: EntityKind::from_str(kind_str)?,
            entity: entity.clone(),
        });
    }
    if let Some(alter) = obj.get("alter").and_then(Json::as_object) {
        let (kind_str, spec) = alter
            .iter()
            .next()
            .ok_or_else(|| CompileError::invalid_model_value("`alter` must name one entity kind"))?;
        let spec_obj = spec
            .as_object()
            .ok_or_else(|| CompileError::invalid_model_value("entity alter spec must be an object"))?;
        let name = spec_obj
            .get("slug")
            .and_then(Json::as_str)
            .ok_or_else(|| CompileError::invalid_model_value("entity alter spec requires `slug`"))?
            .to_string();
        let to = spec_obj.get("to").cloned().unwrap_or(Json::Null);
        return Ok(DdlOperation::AlterAlterEntity {
            slug,
            kind: EntityKind::from_str(kind_str)?,
            name,
            to,
        });
    }
    if let Some(drop) = obj.get("drop").and_then(Json::as_object) {
        let (kind_str, name_json) = drop
            .iter()
            .next()
            .ok_or_else(|| CompileError::invalid_model_value("`drop` must name one entity kind"))?;
        let name = name_json
            .as_str()
            .ok_or_else(|| CompileError::invalid_model_value("entity drop spec must be a slug string"))?
            .to_string();
        return Ok(DdlOperation::AlterDropEntity {
            slug,
            kind: EntityKind::from_str(kind_str)?,
            name,
        });
    }

    Err(CompileError::invalid_model_value(
        "`alter.model` must carry one of `to`/`create`/`alter`/`drop`",
    ))
}

pub fn transform_meta_query(
    operation: &DdlOperation,
    models: &mut Vec<Model>,
    random: &mut dyn RandomSource,
) -> CompileResult<DdlLowering> {
    match operation {
        DdlOperation::CreateModel(model_json) => create_model(model_json, models, random),
        DdlOperation::DropModel { slug } => drop_model(slug, models),
        DdlOperation::AlterModelTo { slug, to } => alter_model_to(slug, to, models),
        DdlOperation::AlterCreateEntity { slug, kind, entity } => {
            alter_create_entity(slug, *kind, entity, models)
        }
        DdlOperation::AlterAlterEntity { slug, kind, name, to } => {
            alter_alter_entity(slug, *kind, name, to, models)
        }
        DdlOperation::AlterDropEntity { slug, kind, name } => {
            alter_drop_entity(slug, *kind, name, models)
        }
    }
}

fn create_model(
    model_json: &Json,
    models: &mut Vec<Model>,
    random: &mut dyn RandomSource,
) -> CompileResult<DdlLowering> {
    let mut model = Model::from_json(model_json)?;
    if model.slug == "model" {
        // The root model already exists in every compile; creating it again
        // records no metadata about itself (§4.3).
        return Ok(DdlLowering {
            dependencies: Vec::new(),
            dml: None,
        });
    }

    add_default_model_attributes(&mut model, true, random);
    add_default_model_fields(&mut model);

    let mut dependencies = vec![create_table_statement(&model)];
    for index in &model.indexes {
        dependencies.push(create_index_statement(&model, index)?);
    }
    for trigger in &model.triggers {
        dependencies.push(create_trigger_statement(&model, trigger));
    }

    let mut system_models = get_system_models(&model);
    for assoc in &mut system_models {
        add_default_model_attributes(assoc, true, random);
        add_default_model_fields(assoc);
        dependencies.push(create_table_statement(assoc));
    }

    let snapshot: Vec<Model> = models.iter().cloned().chain(std::iter::once(model.clone())).collect();
    add_default_model_presets(&snapshot, &mut model);

    models.push(model.clone());
    models.extend(system_models);

    let dml = simple_dml(QueryKind::Add, None, instructions_with_to(model.to_json()));
    Ok(DdlLowering { dependencies, dml: Some(dml) })
}

fn drop_model(slug: &str, models: &mut Vec<Model>) -> CompileResult<DdlLowering> {
    let target = get_model_by_slug(models, slug)?.clone();
    let mut dependencies = vec![Statement {
        statement: format!("DROP TABLE {}", Ident::new(&target.table)?.to_sql()),
        params: Vec::new(),
        returning: false,
    }];

    let assoc_slugs: Vec<String> = target
        .fields
        .iter()
        .filter(|f| f.is_many_link())
        .map(|f| associative_model_slug(&target.slug, &f.slug))
        .collect();

    for assoc_slug in &assoc_slugs {
        if let Ok(assoc) = get_model_by_slug(models, assoc_slug) {
            dependencies.push(Statement {
                statement: format!("DROP TABLE {}", Ident::new(&assoc.table)?.to_sql()),
                params: Vec::new(),
                returning: false,
            });
        }
    }

    models.retain(|m| m.slug != target.slug && !assoc_slugs.contains(&m.slug));

    let dml = simple_dml(
        QueryKind::Remove,
        Some(json!({ "slug": target.slug })),
        Instructions::default(),
    );
    Ok(DdlLowering { dependencies, dml: Some(dml) })
}

fn alter_model_to(slug: &str, to: &Json, models: &mut Vec<Model>) -> CompileResult<DdlLowering> {
    let model = get_model_by_slug_mut(models, slug)?;
    let old_table = model.table.clone();

    if let Some(name) = to.get("name").and_then(Json::as_str) {
        model.name = name.to_string();
    }
    if let Some(name) = to.get("pluralName").and_then(Json::as_str) {
        model.plural_name = name.to_string();
    }
    if let Some(plural_slug) = to.get("pluralSlug").and_then(Json::as_str) {
        model.plural_slug = plural_slug.to_string();
        model.table = crate::case::to_snake_case(plural_slug);
    }

    let new_table = model.table.clone();
    let mut dependencies = Vec::new();
    if old_table != new_table {
        dependencies.push(Statement {
            statement: format!(
                "ALTER TABLE {} RENAME TO {}",
                Ident::new(&old_table)?.to_sql(),
                Ident::new(&new_table)?.to_sql()
            ),
            params: Vec::new(),
            returning: false,
        });
    }

    let dml = simple_dml(
        QueryKind::Set,
        Some(json!({ "slug": slug })),
        instructions_with_to(to.clone()),
    );
    Ok(DdlLowering { dependencies, dml: Some(dml) })
}

fn alter_create_entity(
    slug: &str,
    kind: EntityKind,
    entity: &Json,
    models: &mut Vec<Model>,
) -> CompileResult<DdlLowering> {
    let model = get_model_by_slug_mut(models, slug)?;
    let mut dependencies = Vec::new();

    match kind {
        EntityKind::Field => {
            let field = Field::from_json(entity)?;
            if model.field(&field.slug).is_some() {
                return Err(CompileError::existing_model_entity(slug, "field", &field.slug));
            }
            if !field.is_many_link() {
                dependencies.push(Statement {
                    statement: format!(
                        "ALTER TABLE {} ADD COLUMN {}",
                        Ident::new(&model.table)?.to_sql(),
                        column_def(&field)?
                    ),
                    params: Vec::new(),
                    returning: false,
                });
            }
            model.fields.push(field);
        }
        EntityKind::Index => {
            let index = Index::from_json(entity)?;
            if model.index(&index.slug).is_some() {
                return Err(CompileError::existing_model_entity(slug, "index", &index.slug));
            }
            dependencies.push(create_index_statement(model, &index)?);
            model.indexes.push(index);
        }
        EntityKind::Trigger => {
            let trigger = Trigger::from_json(entity)?;
            if model.trigger(&trigger.slug).is_some() {
                return Err(CompileError::existing_model_entity(slug, "trigger", &trigger.slug));
            }
            dependencies.push(create_trigger_statement(model, &trigger));
            model.triggers.push(trigger);
        }
        EntityKind::Preset => {
            let preset_slug = entity
                .get("slug")
                .and_then(Json::as_str)
                .ok_or_else(|| CompileError::invalid_model_value("preset.slug is required"))?
                .to_string();
            if model.preset(&preset_slug).is_some() {
                return Err(CompileError::existing_model_entity(slug, "preset", &preset_slug));
            }
            let instructions = entity.get("instructions").cloned().unwrap_or(Json::Null);
            model.presets.push(crate::model::Preset {
                slug: preset_slug,
                instructions,
            });
        }
    }

    let updated_column = entities_to_json(model, kind);
    let dml = simple_dml(
        QueryKind::Set,
        Some(json!({ "slug": slug })),
        instructions_with_to(json!({ kind.column(): updated_column })),
    );
    Ok(DdlLowering { dependencies, dml: Some(dml) })
}

fn alter_alter_entity(
    slug: &str,
    kind: EntityKind,
    name: &str,
    to: &Json,
    models: &mut Vec<Model>,
) -> CompileResult<DdlLowering> {
    let model = get_model_by_slug_mut(models, slug)?;
    let mut dependencies = Vec::new();

    match kind {
        EntityKind::Field => {
            let existing = model
                .field(name)
                .cloned()
                .ok_or_else(|| CompileError::field_not_found(slug, name))?;
            let mut updated = Field::from_json(to)?;
            if updated.slug.is_empty() {
                updated.slug = existing.slug.clone();
            }
            if !existing.is_many_link() && updated.slug != existing.slug {
                dependencies.push(Statement {
                    statement: format!(
                        "ALTER TABLE {} RENAME COLUMN {} TO {}",
                        Ident::new(&model.table)?.to_sql(),
                        Ident::new(&existing.slug)?.to_sql(),
                        Ident::new(&updated.slug)?.to_sql()
                    ),
                    params: Vec::new(),
                    returning: false,
                });
            }
            let position = model.fields.iter().position(|f| f.slug == existing.slug).expect("found above");
            model.fields[position] = updated;
        }
        EntityKind::Index => {
            let existing = model
                .index(name)
                .ok_or_else(|| CompileError::index_not_found(slug, name))?
                .clone();
            dependencies.push(Statement {
                statement: format!("DROP INDEX {}", Ident::new(&crate::case::to_snake_case(&existing.slug))?.to_sql()),
                params: Vec::new(),
                returning: false,
            });
            let mut updated = Index::from_json(to)?;
            if updated.slug.is_empty() {
                updated.slug = existing.slug.clone();
            }
            dependencies.push(create_index_statement(model, &updated)?);
            let position = model.indexes.iter().position(|i| i.slug == existing.slug).expect("found above");
            model.indexes[position] = updated;
        }
        EntityKind::Trigger => {
            let existing = model
                .trigger(name)
                .ok_or_else(|| CompileError::trigger_not_found(slug, name))?
                .clone();
            dependencies.push(Statement {
                statement: format!("DROP TRIGGER {}", Ident::new(&crate::case::to_snake_case(&existing.slug))?.to_sql()),
                params: Vec::new(),
                returning: false,
            });
            let mut updated = Trigger::from_json(to)?;
            if updated.slug.is_empty() {
                updated.slug = existing.slug.clone();
            }
            dependencies.push(create_trigger_statement(model, &updated));
            let position = model.triggers.iter().position(|t| t.slug == existing.slug).expect("found above");
            model.triggers[position] = updated;
        }
        EntityKind::Preset => {
            let position = model
                .presets
                .iter()
                .position(|p| p.slug == name)
                .ok_or_else(|| CompileError::preset_not_found(slug, name))?;
            let new_slug = to.get("slug").and_then(Json::as_str).unwrap_or(name).to_string();
            let instructions = to.get("instructions").cloned().unwrap_or(Json::Null);
            model.presets[position] = crate::model::Preset {
                slug: new_slug,
                instructions,
            };
        }
    }

    let updated_column = entities_to_json(model, kind);
    let dml = simple_dml(
        QueryKind::Set,
        Some(json!({ "slug": slug })),
        instructions_with_to(json!({ kind.column(): updated_column })),
    );
    Ok(DdlLowering { dependencies, dml: Some(dml) })
}

fn alter_drop_entity(
    slug: &str,
    kind: EntityKind,
    name: &str,
    models: &mut Vec<Model>,
) -> CompileResult<DdlLowering> {
    let model = get_model_by_slug_mut(models, slug)?;
    let mut dependencies = Vec::new();

    match kind {
        EntityKind::Field => {
            let field = model
                .field(name)
                .cloned()
                .ok_or_else(|| CompileError::field_not_found(slug, name))?;
            if field.is_system() {
                return Err(CompileError::required_model_entity(slug, name));
            }
            if field.is_many_link() {
                let assoc_slug = associative_model_slug(slug, &field.slug);
                if let Ok(assoc) = get_model_by_slug(models, &assoc_slug) {
                    dependencies.push(Statement {
                        statement: format!("DROP TABLE {}", Ident::new(&assoc.table)?.to_sql()),
                        params: Vec::new(),
                        returning: false,
                    });
                }
                models.retain(|m| m.slug != assoc_slug);
            } else {
                let model = get_model_by_slug_mut(models, slug)?;
                dependencies.push(Statement {
                    statement: format!(
                        "ALTER TABLE {} DROP COLUMN {}",
                        Ident::new(&model.table)?.to_sql(),
                        Ident::new(name)?.to_sql()
                    ),
                    params: Vec::new(),
                    returning: false,
                });
            }
            let model = get_model_by_slug_mut(models, slug)?;
            model.fields.retain(|f| f.slug != name);
        }
        EntityKind::Index => {
            let index = model
                .index(name)
                .cloned()
                .ok_or_else(|| CompileError::index_not_found(slug, name))?;
            dependencies.push(Statement {
                statement: format!("DROP INDEX {}", Ident::new(&crate::case::to_snake_case(&index.slug))?.to_sql()),
                params: Vec::new(),
                returning: false,
            });
            model.indexes.retain(|i| i.slug != name);
        }
        EntityKind::Trigger => {
            let trigger = model
                .trigger(name)
                .cloned()
                .ok_or_else(|| CompileError::trigger_not_found(slug, name))?;
            dependencies.push(Statement {
                statement: format!("DROP TRIGGER {}", Ident::new(&crate::case::to_snake_case(&trigger.slug))?.to_sql()),
                params: Vec::new(),
                returning: false,
            });
            model.triggers.retain(|t| t.slug != name);
        }
        EntityKind::Preset => {
            if model.preset(name).is_none() {
                return Err(CompileError::preset_not_found(slug, name));
            }
            model.presets.retain(|p| p.slug != name);
        }
    }

    let model = get_model_by_slug(models, slug)?;
    let updated_column = entities_to_json(model, kind);
    let dml = simple_dml(
        QueryKind::Set,
        Some(json!({ "slug": slug })),
        instructions_with_to(json!({ kind.column(): updated_column })),
    );
    Ok(DdlLowering { dependencies, dml: Some(dml) })
}

fn entities_to_json(model: &Model, kind: EntityKind) -> Json {
    match kind {
        EntityKind::Field => Json::Array(
            model
                .fields
                .iter()
                .filter(|f| !f.is_system())
                .map(Field::to_json)
                .collect(),
        ),
        EntityKind::Index => Json::Array(model.indexes.iter().map(Index::to_json).collect()),
        EntityKind::Trigger => Json::Array(model.triggers.iter().map(Trigger::to_json).collect()),
        EntityKind::Preset => Json::Object(
            model
                .presets
                .iter()
                .map(|p| (p.slug.clone(), p.instructions.clone()))
                .collect(),
        ),
    }
}

fn instructions_with_to(to: Json) -> Instructions {
    let mut instructions = Instructions::default();
    if let Json::Object(map) = to {
        instructions.to = Some(map.into_iter().collect::<IndexMap<_, _>>());
    }
    instructions
}

fn simple_dml(kind: QueryKind, with: Option<Json>, mut instructions: Instructions) -> Query {
    if let Some(with) = with {
        instructions.with = Some(with);
    }
    Query {
        kind,
        body: QueryBody::Dml {
            model: "model".to_string(),
            instructions: Some(instructions),
        },
    }
}

fn create_table_statement(model: &Model) -> Statement {
    let columns: Vec<String> = model
        .fields
        .iter()
        .filter(|f| !f.is_many_link())
        .map(|f| column_def(f).unwrap_or_else(|_| format!("\"{}\" TEXT", f.slug)))
        .collect();
    Statement {
        statement: format!(
            "CREATE TABLE {} ({})",
            Ident::new(&model.table).expect("validated table name"),
            columns.join(", ")
        ),
        params: Vec::new(),
        returning: false,
    }
}

fn column_def(field: &Field) -> CompileResult<String> {
    let ident = Ident::new(&field.slug)?;
    let mut def = format!("{ident} {}", field.r#type.sqlite_type());
    if field.slug == "id" {
        def.push_str(" PRIMARY KEY");
    }
    if field.unique && field.slug != "id" {
        def.push_str(" UNIQUE");
    }
    if let Some(computed) = &field.computed_as {
        let storage = match computed.kind {
            ComputedKind::Stored => "STORED",
            ComputedKind::Virtual => "VIRTUAL",
        };
        def.push_str(&format!(" GENERATED ALWAYS AS ({}) {storage}", computed.value));
        return Ok(def);
    }
    if let Some(default) = &field.default_value {
        match default {
            crate::symbol::Symbol::Expression(expr) => def.push_str(&format!(" DEFAULT ({expr})")),
            crate::symbol::Symbol::Literal(json) => {
                let value = crate::value::Value::try_from(json)?;
                def.push_str(&format!(" DEFAULT {}", value.render_inline()));
            }
            crate::symbol::Symbol::SubQuery(_) => {
                return Err(CompileError::invalid_model_value(
                    "a field default cannot be a sub-query",
                ))
            }
        }
    }
    if field.required && field.slug != "id" {
        def.push_str(" NOT NULL");
    }
    if let Some(check) = &field.check {
        def.push_str(&format!(" CHECK ({check})"));
    }
    Ok(def)
}

fn create_index_statement(model: &Model, index: &Index) -> CompileResult<Statement> {
    if index.fields.is_empty() {
        return Err(CompileError::invalid_model_value("index.fields must not be empty"));
    }
    let cols = index
        .fields
        .iter()
        .map(|f| Ident::new(f).map(|i| i.to_sql()))
        .collect::<CompileResult<Vec<_>>>()?
        .join(", ");
    let unique = if index.unique { "UNIQUE " } else { "" };
    let mut sql = format!(
        "CREATE {unique}INDEX {} ON {} ({cols})",
        Ident::new(crate::case::to_snake_case(&index.slug))?,
        Ident::new(&model.table)?
    );
    if let Some(filter) = &index.filter {
        sql.push_str(&format!(" WHERE {filter}"));
    }
    Ok(Statement {
        statement: sql,
        params: Vec::new(),
        returning: false,
    })
}

fn create_trigger_statement(model: &Model, trigger: &Trigger) -> Statement {
    let when = match trigger.when {
        crate::model::TriggerWhen::Before => "BEFORE",
        crate::model::TriggerWhen::After => "AFTER",
    };
    let needs_row_scope = trigger.filter.is_some() || !trigger.fields.is_empty();
    let for_each_row = if needs_row_scope { " FOR EACH ROW" } else { "" };
    let parent_alias = if trigger.action == TriggerAction::Delete {
        "OLD"
    } else {
        "NEW"
    };
    let when_clause = trigger
        .filter
        .as_ref()
        .and_then(Json::as_str)
        .map(|expr| {
            format!(
                " WHEN {}",
                crate::symbol::resolve_field_tokens(expr, "", parent_alias, "")
            )
        })
        .unwrap_or_default();

    let body = trigger
        .effects
        .iter()
        .map(|effect| effect.to_string())
        .collect::<Vec<_>>()
        .join("; ");

    Statement {
        statement: format!(
            "CREATE TRIGGER {} {when} {}{for_each_row}{when_clause} ON {} BEGIN {body}; END",
            Ident::new(crate::case::to_snake_case(&trigger.slug)).expect("validated trigger slug"),
            trigger.action.as_sql(),
            Ident::new(&model.table).expect("validated table name"),
        ),
        params: Vec::new(),
        returning: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idgen::SeededSource;
    use crate::model::build_model_list;

    #[test]
    fn create_model_emits_table_and_schema_insert() {
        let mut models = build_model_list(Vec::new(), &mut SeededSource::new(1)).unwrap();
        let operation = DdlOperation::CreateModel(json!({
            "slug": "account",
            "fields": [{"slug": "handle", "type": "string", "required": true}],
        }));
        let mut random = SeededSource::new(2);
        let lowering = transform_meta_query(&operation, &mut models, &mut random).unwrap();

        assert!(lowering.dependencies[0].statement.starts_with("CREATE TABLE \"accounts\" ("));
        assert!(get_model_by_slug(&models, "account").is_ok());
        let dml = lowering.dml.unwrap();
        assert!(matches!(dml.kind, QueryKind::Add));
    }

    #[test]
    fn drop_model_removes_table_and_model() {
        let mut models = build_model_list(Vec::new(), &mut SeededSource::new(1)).unwrap();
        let create = DdlOperation::CreateModel(json!({ "slug": "account" }));
        transform_meta_query(&create, &mut models, &mut SeededSource::new(2)).unwrap();

        let drop = DdlOperation::DropModel { slug: "account".to_string() };
        let lowering = transform_meta_query(&drop, &mut models, &mut SeededSource::new(3)).unwrap();
        assert_eq!(lowering.dependencies[0].statement, "DROP TABLE \"accounts\"");
        assert!(get_model_by_slug(&models, "account").is_err());
    }

    #[test]
    fn dropping_system_field_is_rejected() {
        let mut models = build_model_list(Vec::new(), &mut SeededSource::new(1)).unwrap();
        let create = DdlOperation::CreateModel(json!({ "slug": "account" }));
        transform_meta_query(&create, &mut models, &mut SeededSource::new(2)).unwrap();

        let drop_field = DdlOperation::AlterDropEntity {
            slug: "account".to_string(),
            kind: EntityKind::Field,
            name: "id".to_string(),
        };
        let err = transform_meta_query(&drop_field, &mut models, &mut SeededSource::new(3)).unwrap_err();
        assert_eq!(err.code(), "REQUIRED_MODEL_ENTITY");
    }

    #[test]
    fn from_json_parses_create_alter_drop_shapes() {
        let create = DdlOperation::from_json(QueryKind::Create, &json!({ "model": { "slug": "account" } })).unwrap();
        assert!(matches!(create, DdlOperation::CreateModel(_)));

        let alter = DdlOperation::from_json(
            QueryKind::Alter,
            &json!({ "model": { "with": {"slug": "account"}, "to": {"name": "Account"} } }),
        )
        .unwrap();
        assert!(matches!(alter, DdlOperation::AlterModelTo { .. }));

        let drop = DdlOperation::from_json(QueryKind::Drop, &json!({ "model": { "with": {"slug": "account"} } })).unwrap();
        assert!(matches!(drop, DdlOperation::DropModel { .. }));
    }

    #[test]
    fn index_field_list_must_not_be_empty() {
        let err = Index::from_json(&json!({"slug": "byHandle", "fields": []})).unwrap_err();
        assert_eq!(err.code(), "INVALID_MODEL_VALUE");
    }
}
