//! Cell rendering by declared field shape.
//!
//! A task's fields are mapped to a [`FieldShape`] once, when its first page
//! arrives; after that every cell of that field goes through the same
//! renderer regardless of what an individual value looks like.

use std::collections::HashMap;

use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldShape {
    Scalar,
    List,
    KeyValue,
}

impl FieldShape {
    /// Shape guess for a field nobody declared, taken from a sample value.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Object(_) => FieldShape::KeyValue,
            Value::Array(_) => FieldShape::List,
            _ => FieldShape::Scalar,
        }
    }

    pub fn render(&self, value: &Value) -> String {
        match (self, value) {
            (FieldShape::KeyValue, Value::Object(map)) => map
                .iter()
                .map(|(k, v)| format!("{}: {}", k, render_scalar(v)))
                .collect::<Vec<_>>()
                .join("\n"),
            (FieldShape::List, Value::Array(items)) => {
                items.iter().map(render_scalar).collect::<Vec<_>>().join("\n")
            }
            _ => render_scalar(value),
        }
    }
}

/// Strings verbatim, numbers and booleans as text, nested values as JSON.
pub fn render_scalar(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Which kind of row a schema describes; outputs and analysis cases of the
/// same task have different fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    Output,
    Case,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskSchema {
    fields: Vec<(String, FieldShape)>,
}

impl TaskSchema {
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn shape_of(&self, field: &str) -> FieldShape {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, shape)| *shape)
            .unwrap_or(FieldShape::Scalar)
    }

    pub fn render_row(&self, fields: &Map<String, Value>) -> Vec<String> {
        self.fields
            .iter()
            .map(|(name, shape)| fields.get(name).map(|v| shape.render(v)).unwrap_or_default())
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct RendererRegistry {
    declared: HashMap<String, HashMap<String, FieldShape>>,
    resolved: HashMap<(String, RowKind), TaskSchema>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the shapes of tasks whose outputs are known to nest.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        for field in ["predicted_answers", "answers", "true_answers"] {
            registry.declare("qa-extractive", field, FieldShape::KeyValue);
        }
        registry.declare("qa-multiple-choice", "options", FieldShape::List);
        registry.declare("qa-multiple-choice", "predicted_answers", FieldShape::KeyValue);
        registry.declare("qa-multiple-choice", "true_answers", FieldShape::KeyValue);
        registry.declare("named-entity-recognition", "tokens", FieldShape::List);
        registry.declare("named-entity-recognition", "true_tags", FieldShape::List);
        registry.declare("named-entity-recognition", "pred_tags", FieldShape::List);
        registry
    }

    pub fn declare(&mut self, task: &str, field: &str, shape: FieldShape) {
        self.declared
            .entry(task.to_string())
            .or_default()
            .insert(field.to_string(), shape);
        self.resolved.retain(|(t, _), _| t != task);
    }

    pub fn cached(&self, task: &str, kind: RowKind) -> Option<&TaskSchema> {
        self.resolved.get(&(task.to_string(), kind))
    }

    /// Schema for `task`, built from `sample` the first time and cached.
    ///
    /// Field order follows `sample`; `skip` names fields rendered elsewhere
    /// (the id column).
    pub fn resolve(&mut self, task: &str, kind: RowKind, sample: &Map<String, Value>, skip: &str) -> &TaskSchema {
        let declared = self.declared.get(task);
        self.resolved.entry((task.to_string(), kind)).or_insert_with(|| TaskSchema {
            fields: sample
                .iter()
                .filter(|(name, _)| name.as_str() != skip)
                .map(|(name, value)| {
                    let shape = declared
                        .and_then(|d| d.get(name).copied())
                        .unwrap_or_else(|| FieldShape::infer(value));
                    (name.clone(), shape)
                })
                .collect(),
        })
    }
}
