use imr_core::{
    DISTANCE_RELATION, DISTANCE_RELATION_ALIAS, EntityDescriptor, Imr, ImrDocument, ImrError,
    ImrWarning, ImrWarningCode, NodeKind, OutputNode, RelationDescriptor,
};
use imr_tags::TagKnowledgeBase;
use serde::Serialize;
use tracing::{debug, warn};

use crate::normalize::{classify, display_name};
use crate::synthesize::synthesize;

/// An assembled IMR and the issues skipped over while building it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Compilation {
    pub imr: Imr,
    pub warnings: Vec<ImrWarning>,
}

/// Turn a parsed document into an IMR.
///
/// Nameless entities and entities the knowledge base does not know are
/// dropped with a warning. Every other failure aborts the whole document.
pub fn assemble<K: TagKnowledgeBase + ?Sized>(
    knowledge_base: &K,
    document: ImrDocument,
) -> Result<Compilation, ImrError> {
    let ImrDocument {
        mut area,
        entities,
        relations,
        extra,
    } = document;
    let mut warnings = Vec::new();

    if area.is_bbox() {
        area.value = None;
    }

    let mut nodes = Vec::with_capacity(entities.len());
    for (index, entity) in entities.into_iter().enumerate() {
        if let Some(node) = assemble_node(knowledge_base, index, entity, &mut warnings)? {
            nodes.push(node);
        }
    }

    let edges = relations.map(|relations| relations.into_iter().map(canonical_relation).collect());

    Ok(Compilation {
        imr: Imr {
            area,
            nodes,
            edges,
            extra,
        },
        warnings,
    })
}

fn assemble_node<K: TagKnowledgeBase + ?Sized>(
    knowledge_base: &K,
    index: usize,
    entity: EntityDescriptor,
    warnings: &mut Vec<ImrWarning>,
) -> Result<Option<OutputNode>, ImrError> {
    let Some(name) = entity.name.clone() else {
        warn!(index, "entity has no name; dropping it");
        warnings.push(ImrWarning::new(
            ImrWarningCode::MissingName,
            format!("Entity #{index} has no name and was dropped"),
        ));
        return Ok(None);
    };

    let Some(filters) = synthesize(knowledge_base, &entity)? else {
        debug!(entity = name.as_str(), "no knowledge base mapping; dropping entity");
        warnings.push(ImrWarning::new(
            ImrWarningCode::UnmappedEntity,
            format!("Entity '{name}' has no knowledge base mapping and was dropped"),
        ));
        return Ok(None);
    };

    let kind = classify(&entity);
    let id = entity
        .id
        .ok_or_else(|| ImrError::missing_field(format!("entity '{name}'"), "id"))?;
    let (max_distance, min_points) = match kind {
        NodeKind::Cluster => (entity.maxdistance, entity.minpoints),
        NodeKind::Nwr => (None, None),
    };

    Ok(Some(OutputNode {
        id,
        kind,
        filters,
        display_name: display_name(&name),
        name,
        max_distance,
        min_points,
    }))
}

fn canonical_relation(mut relation: RelationDescriptor) -> RelationDescriptor {
    if relation.kind.as_deref() == Some(DISTANCE_RELATION_ALIAS) {
        relation.kind = Some(DISTANCE_RELATION.to_string());
    }
    relation
}
