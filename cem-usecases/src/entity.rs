//! Entity compatibility filter

use cem_spine::{ChangeType, EntityRef, EntityType, EventPayload, EventType};

/// True when the entity is present and of one of the accepted kinds
pub fn is_compatible_entity(entity: Option<&EntityRef>, accepted: &[EntityType]) -> bool {
    entity.map_or(false, |entity| accepted.contains(&entity.entity_type()))
}

pub fn is_entity_connected(payload: &EventPayload) -> bool {
    payload.entity.is_some()
        && payload.event_type == EventType::EntityChange
        && payload.change_type == ChangeType::Add
}

pub fn is_entity_disconnected(payload: &EventPayload) -> bool {
    payload.entity.is_some()
        && payload.event_type == EventType::EntityChange
        && payload.change_type == ChangeType::Remove
}
