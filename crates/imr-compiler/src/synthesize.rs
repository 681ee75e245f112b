//! Filter-tree synthesis for a single entity.
//!
//! The knowledge base answers each term with alternative groups; the first
//! group's first alternative is the canonical meaning. Answers are shared
//! snapshots, so every step below clones the nodes it rewrites.

use imr_core::{
    BRAND_PREFIX, COLOR_KEY_MARKERS, DEFAULT_OPERATOR, EntityDescriptor, FilterLeaf, FilterNode,
    FilterValue, IDENTITY_KEYS, ImrError, NUMERIC_PLACEHOLDER, PLACEHOLDER_VALUE,
    PropertyDescriptor, strip_brand_prefix,
};
use imr_tags::TagKnowledgeBase;
use tracing::debug;

/// Build the canonical filter list for `entity`.
///
/// Returns `Ok(None)` when the knowledge base does not know the entity's
/// name. Property terms, in contrast, must be known: an unknown property is
/// [`ImrError::UnmappedProperty`].
pub fn synthesize<K: TagKnowledgeBase + ?Sized>(
    knowledge_base: &K,
    entity: &EntityDescriptor,
) -> Result<Option<Vec<FilterNode>>, ImrError> {
    let Some(name) = entity.name.as_deref() else {
        return Err(ImrError::missing_field("entity", "name"));
    };

    let answer = knowledge_base.lookup_term(name)?;
    let Some(group) = answer.first() else {
        debug!(entity = name, "entity term is unknown");
        return Ok(None);
    };
    let mut base = group.imr.flatten_once().to_vec();
    if base.is_empty() {
        debug!(entity = name, "entity term has no alternatives");
        return Ok(None);
    }

    if name.starts_with(BRAND_PREFIX) {
        substitute_brand(&mut base, &strip_brand_prefix(name));
    }

    let Some(properties) = entity.properties.as_deref() else {
        return Ok(Some(canonicalize(base)));
    };

    // The primary category is the first alternative; every property narrows it.
    let mut members = Vec::with_capacity(properties.len() + 1);
    members.push(base.swap_remove(0));
    for property in properties {
        members.push(property_filter(knowledge_base, name, property)?);
    }
    Ok(Some(vec![FilterNode::and(members)]))
}

/// Fill placeholder leaves of `or` groups with the brand text.
pub fn substitute_brand(alternatives: &mut [FilterNode], brand: &str) {
    for node in alternatives {
        let FilterNode::Or { or } = node else {
            continue;
        };
        for member in or {
            if let FilterNode::Leaf(leaf) = member {
                if leaf.value.as_text() == Some(PLACEHOLDER_VALUE) {
                    leaf.value = FilterValue::text(brand);
                }
            }
        }
    }
}

/// Wrap a list of bare leaves in one `and` group so that every top-level
/// entry is a group.
#[must_use]
pub fn canonicalize(nodes: Vec<FilterNode>) -> Vec<FilterNode> {
    if nodes.iter().any(FilterNode::is_group) {
        nodes
    } else {
        vec![FilterNode::and(nodes)]
    }
}

fn property_filter<K: TagKnowledgeBase + ?Sized>(
    knowledge_base: &K,
    entity: &str,
    property: &PropertyDescriptor,
) -> Result<FilterNode, ImrError> {
    let unmapped = || ImrError::UnmappedProperty {
        entity: entity.to_string(),
        property: property.name.clone(),
    };

    let answer = knowledge_base.lookup_term(&property.name)?;
    let group = answer.first().ok_or_else(unmapped)?;
    let first = group.imr.flatten_once().first().ok_or_else(unmapped)?;
    let alternatives = first.members().ok_or_else(|| {
        ImrError::unrecognized_shape(
            property.name.as_str(),
            "expected an 'and' or 'or' block, found a bare leaf",
        )
    })?;
    debug!(
        entity,
        property = property.name.as_str(),
        alternatives = alternatives.len(),
        "resolved property"
    );

    if !property.is_constrained() {
        return Ok(FilterNode::or(alternatives.to_vec()));
    }

    // An absent operator keeps each alternative's own; a blank one means equality.
    let operator = property.operator.as_deref().map(|operator| match operator.trim() {
        "" => DEFAULT_OPERATOR,
        trimmed => trimmed,
    });
    let value = property.value.clone().ok_or_else(|| {
        ImrError::missing_field(
            format!("property '{}' of entity '{entity}'", property.name),
            "value",
        )
    })?;

    if let [single] = alternatives {
        let leaf = single.as_leaf().ok_or_else(|| {
            ImrError::unrecognized_shape(
                property.name.as_str(),
                format!("expected a leaf alternative, found an '{}' block", single.kind_str()),
            )
        })?;
        return Ok(constrain(leaf, operator, value));
    }

    if !alternatives.iter().any(is_identity_like) {
        return Ok(FilterNode::or(alternatives.to_vec()));
    }

    let leaves = alternatives
        .iter()
        .map(|node| {
            node.as_leaf().ok_or_else(|| {
                ImrError::unrecognized_shape(
                    property.name.as_str(),
                    format!("expected leaf alternatives, found an '{}' block", node.kind_str()),
                )
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if leaves.iter().any(|leaf| is_color_key(&leaf.key)) {
        let bundle = knowledge_base.lookup_color(&value.to_string())?;
        let tokens: Vec<FilterValue> = if bundle.color_values.is_empty() {
            vec![value]
        } else {
            bundle
                .color_values
                .iter()
                .map(|token| FilterValue::text(token.as_str()))
                .collect()
        };
        let expanded = leaves
            .iter()
            .flat_map(|leaf| {
                tokens
                    .iter()
                    .map(move |token| constrain(leaf, operator, token.clone()))
            })
            .collect();
        return Ok(FilterNode::or(expanded));
    }

    Ok(FilterNode::or(
        leaves
            .iter()
            .map(|leaf| constrain(leaf, operator, value.clone()))
            .collect(),
    ))
}

fn constrain(leaf: &FilterLeaf, operator: Option<&str>, value: FilterValue) -> FilterNode {
    FilterNode::Leaf(leaf.with_constraint(operator.unwrap_or(&leaf.operator), value))
}

/// A leaf that names a feature (or carries a substitution sentinel) rather
/// than a category.
fn is_identity_like(node: &FilterNode) -> bool {
    node.as_leaf().is_some_and(|leaf: &FilterLeaf| {
        IDENTITY_KEYS.contains(&leaf.key.as_str())
            || matches!(
                leaf.value.as_text(),
                Some(PLACEHOLDER_VALUE | NUMERIC_PLACEHOLDER)
            )
    })
}

fn is_color_key(key: &str) -> bool {
    COLOR_KEY_MARKERS.iter().any(|marker| key.contains(marker))
}
