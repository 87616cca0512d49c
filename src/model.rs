//! The model (schema) layer: in-memory model objects, slug lookup, field
//! resolution, default-attribute/field/preset injection, and the
//! associative/root system models.

use crate::case::{pluralize, to_camel_case, to_snake_case, to_title_case};
use crate::error::{CompileError, CompileResult};
use crate::idgen::{generate_model_id, RandomSource};
use crate::query::Instructions;
use crate::symbol::Symbol;
use serde_json::json;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Date,
    Json,
    Blob,
    Link,
}

impl FieldType {
    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Date => "date",
            FieldType::Json => "json",
            FieldType::Blob => "blob",
            FieldType::Link => "link",
        }
    }

    /// The SQLite column type used when materialising a column for this field.
    pub fn sqlite_type(self) -> &'static str {
        match self {
            FieldType::String | FieldType::Link => "TEXT",
            FieldType::Number => "REAL",
            FieldType::Boolean => "BOOLEAN",
            FieldType::Date => "DATETIME",
            FieldType::Json => "TEXT",
            FieldType::Blob => "BLOB",
        }
    }

    pub fn is_json_like(self) -> bool {
        matches!(self, FieldType::Json | FieldType::Blob)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkKind {
    One,
    Many,
}

#[derive(Debug, Clone, Default)]
pub struct LinkActions {
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ComputedAs {
    pub kind: ComputedKind,
    pub value: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputedKind {
    Virtual,
    Stored,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub slug: String,
    pub r#type: FieldType,
    pub unique: bool,
    pub required: bool,
    pub default_value: Option<Symbol>,
    pub collation: Option<String>,
    pub increment: bool,
    pub check: Option<String>,
    pub computed_as: Option<ComputedAs>,
    // `link`-only:
    pub target: Option<String>,
    pub kind: Option<LinkKind>,
    pub actions: LinkActions,
}

impl Field {
    pub fn new(slug: impl Into<String>, r#type: FieldType) -> Self {
        Self {
            slug: slug.into(),
            r#type,
            unique: false,
            required: false,
            default_value: None,
            collation: None,
            increment: false,
            check: None,
            computed_as: None,
            target: None,
            kind: None,
            actions: LinkActions::default(),
        }
    }

    pub fn with_default(mut self, expr: impl Into<String>) -> Self {
        self.default_value = Some(Symbol::Expression(expr.into()));
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn is_system(&self) -> bool {
        self.slug == "id" || self.slug.starts_with("ronin.")
    }

    pub fn is_many_link(&self) -> bool {
        self.r#type == FieldType::Link && self.kind == Some(LinkKind::Many)
    }

    pub fn from_json(json: &serde_json::Value) -> CompileResult<Field> {
        let obj = json
            .as_object()
            .ok_or_else(|| CompileError::invalid_model_value("field must be an object"))?;
        let slug = obj
            .get("slug")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompileError::invalid_model_value("field.slug is required"))?;
        let type_str = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompileError::invalid_model_value("field.type is required"))?;
        let r#type = FieldType::from_str(type_str)
            .ok_or_else(|| CompileError::invalid_model_value(format!("unknown field type: {type_str}")))?;

        let mut field = Field::new(slug, r#type);
        field.unique = obj.get("unique").and_then(|v| v.as_bool()).unwrap_or(false);
        field.required = obj.get("required").and_then(|v| v.as_bool()).unwrap_or(false);
        field.increment = obj.get("increment").and_then(|v| v.as_bool()).unwrap_or(false);
        if let Some(v) = obj.get("defaultValue") {
            field.default_value = Some(Symbol::from_json(v)?);
        }
        if let Some(v) = obj.get("collation").and_then(|v| v.as_str()) {
            field.collation = Some(v.to_string());
        }
        if let Some(v) = obj.get("check").and_then(|v| v.as_str()) {
            field.check = Some(v.to_string());
        }
        if let Some(computed) = obj.get("computedAs").and_then(|v| v.as_object()) {
            let kind = match computed.get("kind").and_then(|v| v.as_str()) {
                Some("stored") => ComputedKind::Stored,
                _ => ComputedKind::Virtual,
            };
            let value = computed
                .get("value")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            field.computed_as = Some(ComputedAs { kind, value });
        }
        if r#type == FieldType::Link {
            field.target = obj.get("target").and_then(|v| v.as_str()).map(str::to_string);
            field.kind = match obj.get("kind").and_then(|v| v.as_str()) {
                Some("many") => Some(LinkKind::Many),
                _ => Some(LinkKind::One),
            };
            if let Some(actions) = obj.get("actions").and_then(|v| v.as_object()) {
                field.actions.on_delete = actions.get("onDelete").and_then(|v| v.as_str()).map(str::to_string);
                field.actions.on_update = actions.get("onUpdate").and_then(|v| v.as_str()).map(str::to_string);
            }
        }
        Ok(field)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut out = serde_json::Map::new();
        out.insert("slug".to_string(), json!(self.slug));
        out.insert("type".to_string(), json!(self.r#type.as_str()));
        if self.unique {
            out.insert("unique".to_string(), json!(true));
        }
        if self.required {
            out.insert("required".to_string(), json!(true));
        }
        if let Some(target) = &self.target {
            out.insert("target".to_string(), json!(target));
            out.insert(
                "kind".to_string(),
                json!(if self.kind == Some(LinkKind::Many) { "many" } else { "one" }),
            );
        }
        serde_json::Value::Object(out)
    }
}

impl FieldType {
    fn from_str(s: &str) -> Option<FieldType> {
        Some(match s {
            "string" => FieldType::String,
            "number" => FieldType::Number,
            "boolean" => FieldType::Boolean,
            "date" => FieldType::Date,
            "json" => FieldType::Json,
            "blob" => FieldType::Blob,
            "link" => FieldType::Link,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Index {
    pub slug: String,
    pub unique: bool,
    pub fields: Vec<String>,
    pub filter: Option<String>,
}

impl Index {
    pub fn from_json(json: &serde_json::Value) -> CompileResult<Index> {
        let obj = json
            .as_object()
            .ok_or_else(|| CompileError::invalid_model_value("index must be an object"))?;
        let slug = obj
            .get("slug")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompileError::invalid_model_value("index.slug is required"))?
            .to_string();
        let fields = obj
            .get("fields")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if fields.is_empty() {
            return Err(CompileError::invalid_model_value("index.fields must not be empty"));
        }
        Ok(Index {
            slug,
            unique: obj.get("unique").and_then(|v| v.as_bool()).unwrap_or(false),
            fields,
            filter: obj.get("filter").and_then(|v| v.as_str()).map(str::to_string),
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "slug": self.slug,
            "unique": self.unique,
            "fields": self.fields,
            "filter": self.filter,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    Insert,
    Update,
    Delete,
}

impl TriggerAction {
    pub fn as_sql(self) -> &'static str {
        match self {
            TriggerAction::Insert => "INSERT",
            TriggerAction::Update => "UPDATE",
            TriggerAction::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Trigger {
    pub slug: String,
    pub action: TriggerAction,
    pub when: TriggerWhen,
    pub fields: Vec<String>,
    pub filter: Option<serde_json::Value>,
    pub effects: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerWhen {
    Before,
    After,
}

impl Trigger {
    pub fn from_json(json: &serde_json::Value) -> CompileResult<Trigger> {
        let obj = json
            .as_object()
            .ok_or_else(|| CompileError::invalid_model_value("trigger must be an object"))?;
        let slug = obj
            .get("slug")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompileError::invalid_model_value("trigger.slug is required"))?
            .to_string();
        let action = match obj.get("action").and_then(|v| v.as_str()) {
            Some("INSERT") => TriggerAction::Insert,
            Some("UPDATE") => TriggerAction::Update,
            Some("DELETE") => TriggerAction::Delete,
            _ => return Err(CompileError::invalid_model_value("trigger.action must be INSERT/UPDATE/DELETE")),
        };
        let when = match obj.get("when").and_then(|v| v.as_str()) {
            Some("AFTER") => TriggerWhen::After,
            _ => TriggerWhen::Before,
        };
        let fields = obj
            .get("fields")
            .and_then(|v| v.as_array())
            .map(|items| items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        if !fields.is_empty() && action != TriggerAction::Update {
            return Err(CompileError::invalid_model_value(
                "a trigger targeting fields must use action = UPDATE",
            ));
        }
        let effects = obj
            .get("effects")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        Ok(Trigger {
            slug,
            action,
            when,
            fields,
            filter: obj.get("filter").cloned(),
            effects,
        })
    }

    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "slug": self.slug,
            "action": self.action.as_sql(),
            "when": if self.when == TriggerWhen::After { "AFTER" } else { "BEFORE" },
            "fields": self.fields,
            "filter": self.filter,
            "effects": self.effects,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Preset {
    pub slug: String,
    pub instructions: serde_json::Value,
}

#[derive(Debug, Clone, Default)]
pub struct SystemMarker {
    pub model: bool,
    pub association_slug: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Identifiers {
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone)]
pub struct Model {
    pub id: Option<String>,
    pub slug: String,
    pub plural_slug: String,
    pub name: String,
    pub plural_name: String,
    pub table: String,
    pub id_prefix: String,
    pub identifiers: Identifiers,
    pub fields: Vec<Field>,
    pub indexes: Vec<Index>,
    pub triggers: Vec<Trigger>,
    pub presets: Vec<Preset>,
    pub system: Option<SystemMarker>,
}

impl Model {
    /// Construct a bare model with only a slug, as a caller may supply (§6).
    pub fn bare(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            id: None,
            slug,
            plural_slug: String::new(),
            name: String::new(),
            plural_name: String::new(),
            table: String::new(),
            id_prefix: String::new(),
            identifiers: Identifiers::default(),
            fields: Vec::new(),
            indexes: Vec::new(),
            triggers: Vec::new(),
            presets: Vec::new(),
            system: None,
        }
    }

    pub fn field(&self, slug: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.slug == slug)
    }

    pub fn field_mut(&mut self, slug: &str) -> Option<&mut Field> {
        self.fields.iter_mut().find(|f| f.slug == slug)
    }

    pub fn index(&self, slug: &str) -> Option<&Index> {
        self.indexes.iter().find(|i| i.slug == slug)
    }

    pub fn trigger(&self, slug: &str) -> Option<&Trigger> {
        self.triggers.iter().find(|t| t.slug == slug)
    }

    pub fn preset(&self, slug: &str) -> Option<&Preset> {
        self.presets.iter().find(|p| p.slug == slug)
    }

    pub fn is_system(&self) -> bool {
        self.system.as_ref().is_some_and(|s| s.model)
    }

    /// Parse a caller-supplied model definition (§6: "minimum being `{ slug
    /// }`; all other attributes are defaulted"). Used by DDL `create`/`alter`
    /// to turn the wire JSON into a [`Model`] before defaulting.
    pub fn from_json(json: &serde_json::Value) -> CompileResult<Model> {
        let obj = json
            .as_object()
            .ok_or_else(|| CompileError::invalid_model_value("model must be an object"))?;
        let slug = obj
            .get("slug")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompileError::invalid_model_value("model.slug is required"))?;

        let mut model = Model::bare(slug);
        if let Some(v) = obj.get("pluralSlug").and_then(|v| v.as_str()) {
            model.plural_slug = v.to_string();
        }
        if let Some(v) = obj.get("name").and_then(|v| v.as_str()) {
            model.name = v.to_string();
        }
        if let Some(v) = obj.get("pluralName").and_then(|v| v.as_str()) {
            model.plural_name = v.to_string();
        }
        if let Some(v) = obj.get("table").and_then(|v| v.as_str()) {
            model.table = v.to_string();
        }
        if let Some(v) = obj.get("idPrefix").and_then(|v| v.as_str()) {
            model.id_prefix = v.to_string();
        }
        if let Some(identifiers) = obj.get("identifiers").and_then(|v| v.as_object()) {
            if let Some(v) = identifiers.get("name").and_then(|v| v.as_str()) {
                model.identifiers.name = v.to_string();
            }
            if let Some(v) = identifiers.get("slug").and_then(|v| v.as_str()) {
                model.identifiers.slug = v.to_string();
            }
        }
        if let Some(fields) = obj.get("fields").and_then(|v| v.as_array()) {
            for field_json in fields {
                model.fields.push(Field::from_json(field_json)?);
            }
        }
        if let Some(indexes) = obj.get("indexes").and_then(|v| v.as_array()) {
            for index_json in indexes {
                model.indexes.push(Index::from_json(index_json)?);
            }
        }
        if let Some(triggers) = obj.get("triggers").and_then(|v| v.as_array()) {
            for trigger_json in triggers {
                model.triggers.push(Trigger::from_json(trigger_json)?);
            }
        }
        if let Some(presets) = obj.get("presets").and_then(|v| v.as_object()) {
            for (slug, instructions) in presets {
                model.presets.push(Preset {
                    slug: slug.clone(),
                    instructions: instructions.clone(),
                });
            }
        }
        Ok(model)
    }

    /// Serialise this model back into the `ronin_schema` row shape (§6).
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "name": self.name,
            "pluralName": self.plural_name,
            "slug": self.slug,
            "pluralSlug": self.plural_slug,
            "idPrefix": self.id_prefix,
            "table": self.table,
            "identifiers.name": self.identifiers.name,
            "identifiers.slug": self.identifiers.slug,
            "fields": self
                .fields
                .iter()
                .filter(|f| !f.is_system())
                .map(Field::to_json)
                .collect::<Vec<_>>(),
            "indexes": self.indexes.iter().map(Index::to_json).collect::<Vec<_>>(),
            "triggers": self.triggers.iter().map(Trigger::to_json).collect::<Vec<_>>(),
            "presets": self
                .presets
                .iter()
                .map(|p| (p.slug.clone(), p.instructions.clone()))
                .collect::<serde_json::Map<_, _>>(),
        })
    }
}

/// `getModelBySlug`: look up a model by its singular or plural slug.
pub fn get_model_by_slug<'a>(models: &'a [Model], slug: &str) -> CompileResult<&'a Model> {
    models
        .iter()
        .find(|m| m.slug == slug || m.plural_slug == slug)
        .ok_or_else(|| CompileError::model_not_found(slug))
}

pub fn get_model_by_slug_mut<'a>(
    models: &'a mut [Model],
    slug: &str,
) -> CompileResult<&'a mut Model> {
    models
        .iter_mut()
        .find(|m| m.slug == slug || m.plural_slug == slug)
        .ok_or_else(|| CompileError::model_not_found(slug))
}

/// The resolved SQL shape for a selected/written field path.
#[derive(Debug, Clone)]
pub struct FieldSelector {
    /// The expression to use when reading this path (`json_extract(...)` for
    /// nested json/blob paths, a plain qualified identifier otherwise).
    pub read: String,
    /// The expression to use when writing this path.
    pub write: String,
    pub field: Field,
}

/// `getFieldFromModel`: resolve a (possibly dotted) field path against a model.
///
/// `alias` is the current table alias/prefix (may be empty for an
/// unqualified reference). When `should_throw` is false, an unresolved path
/// returns `Ok(None)` instead of `FIELD_NOT_FOUND`.
pub fn get_field_from_model(
    model: &Model,
    path: &str,
    alias: &str,
    should_throw: bool,
) -> CompileResult<Option<FieldSelector>> {
    if let Some(field) = model.field(path) {
        return Ok(Some(FieldSelector {
            read: crate::ident::qualified(alias, path)?,
            write: crate::ident::qualified(alias, path)?,
            field: field.clone(),
        }));
    }

    if let Some((head, tail)) = path.split_once('.') {
        if let Some(field) = model.field(head) {
            if field.r#type.is_json_like() {
                let head_ref = crate::ident::qualified(alias, head)?;
                let read = format!("json_extract({head_ref}, '$.{tail}')");
                let write = crate::ident::qualified(alias, path)?;
                return Ok(Some(FieldSelector {
                    read,
                    write,
                    field: field.clone(),
                }));
            }
        }
    }

    if should_throw {
        Err(CompileError::field_not_found(&model.slug, path))
    } else {
        Ok(None)
    }
}

/// The six system fields every model carries, in order (§3 invariant).
pub fn system_fields(id_prefix: &str) -> Vec<Field> {
    vec![
        Field::new("id", FieldType::String)
            .required()
            .with_default(format!(
                "'{id_prefix}_' || lower(substr(hex(randomblob(12)), 1, 16))"
            )),
        Field::new("ronin.locked", FieldType::Boolean),
        Field::new("ronin.createdAt", FieldType::Date)
            .required()
            .with_default("strftime('%Y-%m-%dT%H:%M:%f', 'now') || 'Z'"),
        Field::new("ronin.createdBy", FieldType::String),
        Field::new("ronin.updatedAt", FieldType::Date)
            .required()
            .with_default("strftime('%Y-%m-%dT%H:%M:%f', 'now') || 'Z'"),
        Field::new("ronin.updatedBy", FieldType::String),
    ]
}

/// `addDefaultModelAttributes`: fill in missing derived attributes.
pub fn add_default_model_attributes(
    model: &mut Model,
    is_new: bool,
    source: &mut dyn RandomSource,
) {
    if model.plural_slug.is_empty() {
        model.plural_slug = pluralize(&model.slug);
    }
    if model.name.is_empty() {
        model.name = to_title_case(&model.slug);
    }
    if model.plural_name.is_empty() {
        model.plural_name = to_title_case(&model.plural_slug);
    }
    if model.id_prefix.is_empty() {
        model.id_prefix = model.slug.chars().take(3).collect::<String>().to_lowercase();
    }
    if model.table.is_empty() {
        model.table = to_snake_case(&model.plural_slug);
    }
    if model.identifiers.slug.is_empty() {
        model.identifiers.slug = default_identifier(model);
    }
    if model.identifiers.name.is_empty() {
        model.identifiers.name = model.identifiers.slug.clone();
    }
    if is_new && model.id.is_none() {
        model.id = Some(generate_model_id(source));
    }
}

fn default_identifier(model: &Model) -> String {
    for candidate in ["name", "slug", "handle"] {
        if let Some(field) = model.field(candidate) {
            if field.r#type == FieldType::String && field.required {
                return field.slug.clone();
            }
        }
    }
    "id".to_string()
}

/// `addDefaultModelFields`: prepend the six system fields, unless present.
pub fn add_default_model_fields(model: &mut Model) {
    let existing: std::collections::HashSet<&str> =
        model.fields.iter().map(|f| f.slug.as_str()).collect();
    let prefix = model.id_prefix.clone();
    let mut defaults: Vec<Field> = system_fields(&prefix)
        .into_iter()
        .filter(|f| !existing.contains(f.slug.as_str()))
        .collect();
    defaults.extend(std::mem::take(&mut model.fields));
    model.fields = defaults;
}

/// Camel-case the associative model slug `ronin_link_<source>_<field>`.
pub fn associative_model_slug(source_slug: &str, field_slug: &str) -> String {
    to_camel_case(&format!("ronin_link_{source_slug}_{field_slug}"))
}

/// `getSystemModels`: the associative models synthesised for `model`'s
/// `many`-kind link fields.
pub fn get_system_models(model: &Model) -> Vec<Model> {
    model
        .fields
        .iter()
        .filter(|f| f.is_many_link())
        .map(|f| {
            let slug = associative_model_slug(&model.slug, &f.slug);
            let mut assoc = Model::bare(slug.clone());
            // The associative slug already encodes plurality (`...Comments`);
            // pluralising it again would double-pluralise the table name.
            assoc.plural_slug = slug;
            let mut source = Field::new("source", FieldType::Link);
            source.target = Some(model.slug.clone());
            source.kind = Some(LinkKind::One);
            let mut target = Field::new("target", FieldType::Link);
            target.target = f.target.clone();
            target.kind = Some(LinkKind::One);
            assoc.fields = vec![source, target];
            assoc.system = Some(SystemMarker {
                model: true,
                association_slug: Some(f.slug.clone()),
            });
            assoc
        })
        .collect()
}

/// `addDefaultModelPresets`: synthesise link-navigation presets.
pub fn add_default_model_presets(all: &[Model], model: &mut Model) {
    let mut presets = Vec::new();

    for field in &model.fields {
        if field.r#type != FieldType::Link || field.slug.starts_with("ronin.") {
            continue;
        }
        match field.kind {
            Some(LinkKind::One) => {
                let Some(target) = &field.target else { continue };
                presets.push(Preset {
                    slug: field.slug.clone(),
                    instructions: json!({
                        "including": {
                            field.slug.clone(): {
                                "QUERY": {
                                    "get": {
                                        target.clone(): {
                                            "with": { "id": { "EXPRESSION": format!("FIELD_PARENT{}", field.slug) } }
                                        }
                                    }
                                }
                            }
                        }
                    }),
                });
            }
            Some(LinkKind::Many) => {
                let assoc_slug = associative_model_slug(&model.slug, &field.slug);
                let Some(target) = &field.target else { continue };
                presets.push(Preset {
                    slug: field.slug.clone(),
                    instructions: json!({
                        "including": {
                            field.slug.clone(): {
                                "QUERY": {
                                    "get": {
                                        assoc_slug: {
                                            "with": { "source": { "EXPRESSION": "FIELD_PARENTid" } },
                                            "including": {
                                                "target": {
                                                    "QUERY": { "get": { target.clone(): null } }
                                                }
                                            },
                                            "selecting": ["**", "!source", "!target"]
                                        }
                                    }
                                }
                            }
                        }
                    }),
                });
            }
            None => {}
        }
    }

    for other in all {
        if other.slug == model.slug || other.is_system() {
            continue;
        }
        for field in &other.fields {
            if field.r#type == FieldType::Link && field.target.as_deref() == Some(&model.slug) {
                let preset_slug = other.plural_slug.clone();
                presets.push(Preset {
                    slug: preset_slug,
                    instructions: json!({
                        "including": {
                            other.plural_slug.clone(): {
                                "QUERY": {
                                    "get": {
                                        other.plural_slug.clone(): {
                                            "with": { field.slug.clone(): { "EXPRESSION": "FIELD_PARENTid" } }
                                        }
                                    }
                                }
                            }
                        }
                    }),
                });
            }
        }
    }

    for preset in presets {
        if model.preset(&preset.slug).is_none() {
            model.presets.push(preset);
        }
    }
}

/// Resolve a preset by slug, per `PRESET_NOT_FOUND` on miss.
pub fn get_preset<'a>(model: &'a Model, slug: &str) -> CompileResult<&'a Preset> {
    model
        .preset(slug)
        .ok_or_else(|| CompileError::preset_not_found(&model.slug, slug))
}

/// The built-in root model (`model`, table `ronin_schema`) that stores every
/// other model's metadata (§3 invariant — present in every compile).
pub fn root_model() -> Model {
    let mut model = Model::bare("model");
    model.plural_slug = "models".to_string();
    model.name = "Model".to_string();
    model.plural_name = "Models".to_string();
    model.table = "ronin_schema".to_string();
    model.id_prefix = "mod".to_string();
    model.identifiers = Identifiers {
        name: "name".to_string(),
        slug: "slug".to_string(),
    };
    model.system = Some(SystemMarker {
        model: true,
        association_slug: None,
    });
    model.fields = vec![
        Field::new("name", FieldType::String).required(),
        Field::new("pluralName", FieldType::String).required(),
        Field::new("slug", FieldType::String).required(),
        Field::new("pluralSlug", FieldType::String).required(),
        Field::new("idPrefix", FieldType::String).required(),
        Field::new("table", FieldType::String).required(),
        Field::new("identifiers.name", FieldType::String).required(),
        Field::new("identifiers.slug", FieldType::String).required(),
        {
            let mut f = Field::new("fields", FieldType::Json);
            f.default_value = Some(Symbol::Literal(json!("{}")));
            f
        },
        {
            let mut f = Field::new("indexes", FieldType::Json);
            f.default_value = Some(Symbol::Literal(json!("{}")));
            f
        },
        {
            let mut f = Field::new("triggers", FieldType::Json);
            f.default_value = Some(Symbol::Literal(json!("{}")));
            f
        },
        {
            let mut f = Field::new("presets", FieldType::Json);
            f.default_value = Some(Symbol::Literal(json!("{}")));
            f
        },
    ];
    add_default_model_fields(&mut model);
    model
}

/// Build the full, defaulted model list for a compile: the root model,
/// every caller-supplied model (defaulted), and every system model their
/// `many`-kind link fields imply.
pub fn build_model_list(
    user_models: Vec<Model>,
    source: &mut dyn RandomSource,
) -> CompileResult<Vec<Model>> {
    let mut models = vec![root_model()];

    let mut defaulted: Vec<Model> = user_models
        .into_iter()
        .map(|mut m| {
            add_default_model_attributes(&mut m, m.id.is_none(), source);
            add_default_model_fields(&mut m);
            m
        })
        .collect();

    let mut system_models = Vec::new();
    for model in &defaulted {
        system_models.extend(get_system_models(model));
    }
    for mut assoc in system_models {
        add_default_model_attributes(&mut assoc, true, source);
        add_default_model_fields(&mut assoc);
        defaulted.push(assoc);
    }

    let snapshot = defaulted.clone();
    for model in &mut defaulted {
        add_default_model_presets(&snapshot, model);
    }

    models.extend(defaulted);
    let _ = &models; // root model counted in invariant below
    Ok(models)
}

/// `Instructions` that a `using`/`for` merge needs but which do not matter
/// to model resolution are out of scope here; this module only resolves
/// slugs and fields.
pub fn require_instructions(instructions: &Option<Instructions>) -> CompileResult<&Instructions> {
    instructions
        .as_ref()
        .ok_or_else(|| CompileError::missing_instruction("instructions required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idgen::SeededSource;

    fn account_model() -> Model {
        let mut m = Model::bare("account");
        m.fields.push(Field::new("handle", FieldType::String).required());
        m
    }

    #[test]
    fn default_attributes_fill_table_and_prefix() {
        let mut source = SeededSource::new(1);
        let mut m = account_model();
        add_default_model_attributes(&mut m, true, &mut source);
        assert_eq!(m.plural_slug, "accounts");
        assert_eq!(m.table, "accounts");
        assert_eq!(m.id_prefix, "acc");
        assert_eq!(m.identifiers.slug, "handle");
    }

    #[test]
    fn default_fields_prepend_system_fields_in_order() {
        let mut source = SeededSource::new(1);
        let mut m = account_model();
        add_default_model_attributes(&mut m, true, &mut source);
        add_default_model_fields(&mut m);
        let slugs: Vec<&str> = m.fields.iter().map(|f| f.slug.as_str()).collect();
        assert_eq!(
            slugs,
            vec![
                "id",
                "ronin.locked",
                "ronin.createdAt",
                "ronin.createdBy",
                "ronin.updatedAt",
                "ronin.updatedBy",
                "handle",
            ]
        );
    }

    #[test]
    fn model_idempotence() {
        let mut source = SeededSource::new(1);
        let mut m = account_model();
        add_default_model_attributes(&mut m, true, &mut source);
        add_default_model_fields(&mut m);
        let once = m.clone();
        add_default_model_attributes(&mut m, false, &mut source);
        add_default_model_fields(&mut m);
        assert_eq!(m.fields.len(), once.fields.len());
        assert_eq!(m.table, once.table);
    }

    #[test]
    fn get_field_from_model_resolves_json_path() {
        let mut m = Model::bare("account");
        m.fields.push(Field::new("meta", FieldType::Json));
        let selector = get_field_from_model(&m, "meta.theme", "", true)
            .unwrap()
            .unwrap();
        assert_eq!(selector.read, "json_extract(\"meta\", '$.theme')");
    }

    #[test]
    fn get_model_by_slug_matches_plural() {
        let models = vec![{
            let mut m = account_model();
            m.plural_slug = "accounts".to_string();
            m
        }];
        assert!(get_model_by_slug(&models, "accounts").is_ok());
        assert!(get_model_by_slug(&models, "missing").is_err());
    }
}
