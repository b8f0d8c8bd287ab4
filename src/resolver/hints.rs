//! Stage 3: explicit reverse metadata from the secondary source.
//!
//! Connection entities are handled first: their entity-typed fields become
//! connection endpoints, and multi-entity fields declaring a join entity are
//! bound to the endpoint on their side. Reverse pointers (`reverse_of`,
//! `inverse_association`) are then linked directly.

use super::ResolutionContext;
use crate::schema::inflection::snake_case;
use crate::schema::{ConnectionEndpointLink, EntityId, FieldId, Link};

pub(crate) fn run(ctx: &mut ResolutionContext<'_>) -> usize {
    let mut links = 0;

    let connections: Vec<EntityId> = ctx.connection_entities.iter().copied().collect();
    for connection in connections {
        mark_endpoints(ctx, connection);
    }

    let sources = ctx.sources;
    for (entity, field, hint) in sources.hints.iter() {
        let Some(join) = &hint.through_join_entity_type else {
            continue;
        };
        let (Some(id), Some(connection)) = (ctx.field_on(entity, field), ctx.schema.entity_id(join))
        else {
            continue;
        };
        if bind_side(ctx, connection, id).is_some() {
            links += 1;
        }
    }

    for (entity, field, hint) in sources.hints.iter() {
        let Some((reverse_entity, reverse_field)) = hint.reverse_target() else {
            continue;
        };
        let (Some(id), Some(reverse)) = (
            ctx.field_on(entity, field),
            ctx.field_on(reverse_entity, reverse_field),
        ) else {
            tracing::debug!(entity, field, reverse_entity, reverse_field, "reverse hint names a missing field");
            continue;
        };
        // Both sides usually carry the hint; the second one finds the pair done.
        if ctx.pair(id, reverse) {
            links += 1;
        }
    }

    links
}

/// Mark the entity-typed fields of a connection entity as one-sided endpoints.
pub(crate) fn mark_endpoints(ctx: &mut ResolutionContext<'_>, connection: EntityId) {
    let endpoints: Vec<FieldId> = ctx
        .schema
        .fields_of(ctx.schema.entity_at(connection))
        .filter(|f| f.is_single_entity() && !f.is_linked())
        .map(|f| f.id())
        .collect();
    for id in endpoints {
        ctx.schema.set_link(
            id,
            Link::ConnectionEndpoint(ConnectionEndpointLink { side_field: None }),
        );
        ctx.schema.mark_one_sided(id);
    }
}

/// Endpoint fields of a connection entity, in field order.
pub(crate) fn endpoints(ctx: &ResolutionContext<'_>, connection: EntityId) -> Vec<FieldId> {
    ctx.schema
        .fields_of(ctx.schema.entity_at(connection))
        .filter(|f| matches!(f.link(), Some(Link::ConnectionEndpoint(_))))
        .map(|f| f.id())
        .collect()
}

pub(crate) fn side_field_of(ctx: &ResolutionContext<'_>, endpoint: FieldId) -> Option<FieldId> {
    match ctx.field(endpoint).link() {
        Some(Link::ConnectionEndpoint(e)) => e.side_field,
        _ => None,
    }
}

/// Bind the multi-entity `field` to the endpoint of `connection` on its
/// owner's side.
pub(crate) fn bind_side(
    ctx: &mut ResolutionContext<'_>,
    connection: EntityId,
    field: FieldId,
) -> Option<FieldId> {
    let endpoint = pick_side(ctx, connection, field)?;
    ctx.schema.set_link(
        endpoint,
        Link::ConnectionEndpoint(ConnectionEndpointLink {
            side_field: Some(field),
        }),
    );
    Some(endpoint)
}

/// The endpoint of `connection` on `field`'s side: the one already bound to
/// it, else a free endpoint accepting the owner. An endpoint named after the
/// owner wins over any other.
pub(crate) fn pick_side(
    ctx: &ResolutionContext<'_>,
    connection: EntityId,
    field: FieldId,
) -> Option<FieldId> {
    if !ctx.field(field).is_multi_entity() || ctx.field(field).is_linked() {
        return None;
    }
    let candidates = endpoints(ctx, connection);
    if let Some(bound) = candidates
        .iter()
        .copied()
        .find(|e| side_field_of(ctx, *e) == Some(field))
    {
        return Some(bound);
    }

    let owner = &ctx.owner(field).api_name;
    let owner_snake = snake_case(owner);
    let free: Vec<FieldId> = candidates
        .into_iter()
        .filter(|e| side_field_of(ctx, *e).is_none() && ctx.field(*e).accepts(owner))
        .collect();
    free.iter()
        .copied()
        .find(|e| ctx.field(*e).api_name == owner_snake)
        .or_else(|| free.first().copied())
}
