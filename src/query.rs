//! Query and instruction data types — the JSON-shaped input this crate compiles.
//!
//! A query on the wire is a single-key JSON object (`{"get": {...}}`). This
//! module turns that shape into [`Query`]; nested instruction members
//! (`with`, `to`, `including`, …) are kept close to their JSON form
//! (`serde_json::Value`, order-preserving via the `preserve_order` feature)
//! since the instruction handlers in [`crate::instructions`] interpret their
//! own sub-shapes rather than this module pre-parsing every variant.

use crate::ddl::DdlOperation;
use crate::error::{CompileError, CompileResult};
use indexmap::IndexMap;
use serde_json::Value as Json;

/// The pseudo-model slug that expands into one query per model (§4.6).
pub const ALL_MODEL_SLUG: &str = "all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Get,
    Set,
    Add,
    Remove,
    Count,
    Create,
    Alter,
    Drop,
}

impl QueryKind {
    pub fn as_str(self) -> &'static str {
        match self {
            QueryKind::Get => "get",
            QueryKind::Set => "set",
            QueryKind::Add => "add",
            QueryKind::Remove => "remove",
            QueryKind::Count => "count",
            QueryKind::Create => "create",
            QueryKind::Alter => "alter",
            QueryKind::Drop => "drop",
        }
    }

    fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "get" => QueryKind::Get,
            "set" => QueryKind::Set,
            "add" => QueryKind::Add,
            "remove" => QueryKind::Remove,
            "count" => QueryKind::Count,
            "create" => QueryKind::Create,
            "alter" => QueryKind::Alter,
            "drop" => QueryKind::Drop,
            _ => return None,
        })
    }

    pub fn is_ddl(self) -> bool {
        matches!(self, QueryKind::Create | QueryKind::Alter | QueryKind::Drop)
    }

    /// Verb per §4.5: get/count → SELECT, set → UPDATE, add → INSERT, remove → DELETE.
    pub fn verb(self) -> &'static str {
        match self {
            QueryKind::Get | QueryKind::Count => "SELECT",
            QueryKind::Set => "UPDATE",
            QueryKind::Add => "INSERT INTO",
            QueryKind::Remove => "DELETE FROM",
            QueryKind::Create | QueryKind::Alter | QueryKind::Drop => {
                unreachable!("DDL queries are lowered before verb selection")
            }
        }
    }
}

/// A fully-parsed query: kind + the DML target/instructions or DDL operation.
#[derive(Debug, Clone)]
pub struct Query {
    pub kind: QueryKind,
    pub body: QueryBody,
}

#[derive(Debug, Clone)]
pub enum QueryBody {
    Dml {
        model: String,
        instructions: Option<Instructions>,
    },
    Ddl(DdlOperation),
}

impl Query {
    /// Parse a single-key query object, e.g. `{"get": {"account": {...}}}`.
    pub fn from_json(json: &Json) -> CompileResult<Query> {
        let obj = json.as_object().ok_or_else(|| {
            CompileError::invalid_with_value("query must be a single-key object")
        })?;
        if obj.len() != 1 {
            return Err(CompileError::invalid_with_value(
                "query object must have exactly one key (the query kind)",
            ));
        }
        let (kind_str, value) = obj.iter().next().expect("len == 1");
        let kind = QueryKind::from_str(kind_str)
            .ok_or_else(|| CompileError::invalid_with_value(format!("unknown query kind: {kind_str}")))?;

        if kind.is_ddl() {
            return Ok(Query {
                kind,
                body: QueryBody::Ddl(DdlOperation::from_json(kind, value)?),
            });
        }

        let model_obj = value.as_object().ok_or_else(|| {
            CompileError::invalid_with_value(format!(
                "`{kind_str}` query value must be an object keyed by model slug"
            ))
        })?;
        if model_obj.len() != 1 {
            return Err(CompileError::invalid_with_value(format!(
                "`{kind_str}` query value must have exactly one model key"
            )));
        }
        let (model, instructions_json) = model_obj.iter().next().expect("len == 1");
        let instructions = match instructions_json {
            Json::Null => None,
            other => Some(Instructions::from_json(other)?),
        };

        Ok(Query {
            kind,
            body: QueryBody::Dml {
                model: model.clone(),
                instructions,
            },
        })
    }
}

/// The optional-member instruction bag attached to a DML query (§3).
#[derive(Debug, Clone, Default)]
pub struct Instructions {
    pub with: Option<Json>,
    pub to: Option<IndexMap<String, Json>>,
    pub selecting: Option<Vec<String>>,
    pub including: Option<IndexMap<String, Json>>,
    pub ordered_by: OrderedBy,
    pub before: Option<String>,
    pub after: Option<String>,
    pub limited_to: Option<u32>,
    pub using: Option<UsingPresets>,
}

#[derive(Debug, Clone, Default)]
pub struct OrderedBy {
    pub ascending: Vec<String>,
    pub descending: Vec<String>,
}

impl OrderedBy {
    pub fn is_empty(&self) -> bool {
        self.ascending.is_empty() && self.descending.is_empty()
    }

    pub fn has_field(&self, field: &str) -> bool {
        self.ascending.iter().any(|f| f == field) || self.descending.iter().any(|f| f == field)
    }
}

#[derive(Debug, Clone)]
pub enum UsingPresets {
    List(Vec<String>),
    Map(IndexMap<String, Option<Json>>),
}

impl Instructions {
    pub(crate) fn from_json(json: &Json) -> CompileResult<Instructions> {
        let obj = json
            .as_object()
            .ok_or_else(|| CompileError::invalid_with_value("instructions must be an object"))?;

        let mut instructions = Instructions::default();

        if let Some(with) = obj.get("with") {
            instructions.with = Some(with.clone());
        }
        if let Some(to) = obj.get("to") {
            let to_obj = to
                .as_object()
                .ok_or_else(|| CompileError::invalid_to_value("`to` must be an object"))?;
            instructions.to = Some(to_obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        }
        if let Some(selecting) = obj.get("selecting") {
            let list = selecting
                .as_array()
                .ok_or_else(|| CompileError::invalid_with_value("`selecting` must be an array"))?;
            instructions.selecting = Some(
                list.iter()
                    .map(|v| {
                        v.as_str().map(str::to_string).ok_or_else(|| {
                            CompileError::invalid_with_value("`selecting` entries must be strings")
                        })
                    })
                    .collect::<CompileResult<Vec<_>>>()?,
            );
        }
        if let Some(including) = obj.get("including") {
            let inc_obj = including
                .as_object()
                .ok_or_else(|| CompileError::invalid_with_value("`including` must be an object"))?;
            instructions.including =
                Some(inc_obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect());
        }
        if let Some(ordered_by) = obj.get("orderedBy") {
            let ob_obj = ordered_by.as_object().ok_or_else(|| {
                CompileError::invalid_with_value("`orderedBy` must be an object")
            })?;
            instructions.ordered_by = OrderedBy {
                ascending: string_list(ob_obj.get("ascending"))?,
                descending: string_list(ob_obj.get("descending"))?,
            };
        }
        if let Some(before) = obj.get("before") {
            instructions.before = Some(
                before
                    .as_str()
                    .ok_or_else(|| CompileError::invalid_with_value("`before` must be a string"))?
                    .to_string(),
            );
        }
        if let Some(after) = obj.get("after") {
            instructions.after = Some(
                after
                    .as_str()
                    .ok_or_else(|| CompileError::invalid_with_value("`after` must be a string"))?
                    .to_string(),
            );
        }
        if let Some(limited_to) = obj.get("limitedTo") {
            let n = limited_to.as_u64().ok_or_else(|| {
                CompileError::invalid_with_value("`limitedTo` must be a positive integer")
            })?;
            if n == 0 || n > 1000 {
                return Err(CompileError::invalid_with_value(
                    "`limitedTo` must be between 1 and 1000",
                ));
            }
            instructions.limited_to = Some(n as u32);
        }
        if let Some(using) = obj.get("using").or_else(|| obj.get("for")) {
            instructions.using = Some(if let Some(list) = using.as_array() {
                UsingPresets::List(
                    list.iter()
                        .map(|v| {
                            v.as_str().map(str::to_string).ok_or_else(|| {
                                CompileError::invalid_with_value("`using` entries must be strings")
                            })
                        })
                        .collect::<CompileResult<Vec<_>>>()?,
                )
            } else if let Some(map) = using.as_object() {
                UsingPresets::Map(
                    map.iter()
                        .map(|(k, v)| (k.clone(), (!v.is_null()).then(|| v.clone())))
                        .collect(),
                )
            } else if let Some(slug) = using.as_str() {
                // `for: <slug>` on an `all`-pseudo-model query restricts the
                // expansion (§4.6); elsewhere a bare string names one preset.
                UsingPresets::List(vec![slug.to_string()])
            } else {
                return Err(CompileError::invalid_with_value(
                    "`using` must be a list, object, or string",
                ));
            });
        }

        Ok(instructions)
    }
}

fn string_list(json: Option<&Json>) -> CompileResult<Vec<String>> {
    match json {
        None => Ok(Vec::new()),
        Some(Json::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| CompileError::invalid_with_value("orderedBy entries must be strings"))
            })
            .collect(),
        Some(_) => Err(CompileError::invalid_with_value(
            "orderedBy.ascending/descending must be arrays",
        )),
    }
}
