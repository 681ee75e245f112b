//! Input documents produced by the model and the IMR produced from them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::FilterNode;

/// Area of interest. Fields the compiler does not interpret pass through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Area {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Coordinate payload; never emitted for bounding-box areas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Area {
    #[must_use]
    pub fn is_bbox(&self) -> bool {
        self.kind == crate::BBOX_AREA_TYPE
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(untagged)]
pub enum EntityId {
    Index(u64),
    Label(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "{index}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self::Index(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PropertyDescriptor {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<crate::FilterValue>,
}

impl PropertyDescriptor {
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn constrained(
        name: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<crate::FilterValue>,
    ) -> Self {
        Self {
            name: name.into(),
            operator: Some(operator.into()),
            value: Some(value.into()),
        }
    }

    /// Whether the model supplied an operator or value for this property.
    #[must_use]
    pub const fn is_constrained(&self) -> bool {
        self.operator.is_some() || self.value.is_some()
    }
}

/// One entity as described by the model. Only `name` is mandatory; nameless
/// entities are dropped by the assembler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct EntityDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<PropertyDescriptor>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minpoints: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maxdistance: Option<Value>,
}

impl EntityDescriptor {
    #[must_use]
    pub fn named(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_properties(mut self, properties: Vec<PropertyDescriptor>) -> Self {
        self.properties = Some(properties);
        self
    }
}

/// A spatial relation between entities; only `type` is interpreted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RelationDescriptor {
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// The repaired model output, before assembly.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ImrDocument {
    pub area: Area,
    #[serde(default)]
    pub entities: Vec<EntityDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relations: Option<Vec<RelationDescriptor>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Standalone match over nodes, ways and relations.
    #[default]
    Nwr,
    /// Spatial grouping of at least `minPoints` matches within `maxDistance`.
    Cluster,
}

impl NodeKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nwr => "nwr",
            Self::Cluster => "cluster",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputNode {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub filters: Vec<FilterNode>,
    pub name: String,
    pub display_name: String,
    #[serde(default, rename = "maxDistance", skip_serializing_if = "Option::is_none")]
    pub max_distance: Option<Value>,
    #[serde(default, rename = "minPoints", skip_serializing_if = "Option::is_none")]
    pub min_points: Option<Value>,
}

/// Intermediate Map Representation handed to the geo-query engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Imr {
    pub area: Area,
    pub nodes: Vec<OutputNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edges: Option<Vec<RelationDescriptor>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    #[default]
    Success,
    Error,
}

/// Envelope returned to callers of the full sentence-to-IMR transformation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImrResponse {
    pub imr: Option<Imr>,
    pub input_sentence: String,
    pub raw_output: String,
    pub status: ResponseStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Area, EntityId, ImrDocument, NodeKind, OutputNode};

    #[test]
    fn document_keeps_unknown_sections() {
        let document: ImrDocument = serde_json::from_value(json!({
            "area": {"type": "area", "name": "bonn"},
            "entities": [{"id": 0, "name": "kiosk"}],
            "note": "kept"
        }))
        .expect("document");

        assert_eq!(document.area.name.as_deref(), Some("bonn"));
        assert!(document.relations.is_none());
        assert_eq!(document.extra.get("note"), Some(&json!("kept")));
        assert_eq!(document.entities[0].id, Some(EntityId::Index(0)));
    }

    #[test]
    fn area_without_value_omits_the_field() {
        let area = Area {
            kind: "bbox".to_string(),
            ..Area::default()
        };
        assert!(area.is_bbox());
        assert_eq!(serde_json::to_value(&area).expect("area"), json!({"type": "bbox"}));
    }

    #[test]
    fn output_node_uses_camel_case_cluster_fields() {
        let node = OutputNode {
            id: EntityId::Index(3),
            kind: NodeKind::Cluster,
            filters: Vec::new(),
            name: "tree".to_string(),
            display_name: "trees".to_string(),
            max_distance: Some(json!("50 m")),
            min_points: Some(json!(5)),
        };
        let encoded = serde_json::to_value(&node).expect("node");
        assert_eq!(encoded["type"], json!("cluster"));
        assert_eq!(encoded["maxDistance"], json!("50 m"));
        assert_eq!(encoded["minPoints"], json!(5));
    }
}
