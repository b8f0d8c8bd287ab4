//! Stage 5: connection entities.
//!
//! Every multi-entity field still without a link is stored through a
//! connection entity. Fields found to be reverses of each other share one
//! connection; a declared connection bound to a field is reused, otherwise a
//! new one is synthesized with a generic `entity` / `linked_entity` pair of
//! endpoints.

use std::collections::HashMap;

use petgraph::unionfind::UnionFind;

use super::hints::{endpoints, pick_side, side_field_of};
use super::ResolutionContext;
use crate::schema::inflection::pascal_case;
use crate::schema::{
    ConnectionEndpointLink, ConnectionSide, EntityId, Field, FieldId, Link, ManyToManyLink,
};

/// Endpoint on the owner's side of a synthesized connection.
pub const THIS_ENDPOINT: &str = "entity";
/// Endpoint on the linked side of a synthesized connection.
pub const OTHER_ENDPOINT: &str = "linked_entity";

pub(crate) fn run(ctx: &mut ResolutionContext<'_>) -> usize {
    let fields: Vec<FieldId> = ctx
        .link_fields()
        .into_iter()
        .filter(|id| ctx.field(*id).is_multi_entity() && !ctx.field(*id).is_linked())
        .collect();
    let index: HashMap<FieldId, usize> = fields.iter().enumerate().map(|(i, f)| (*f, i)).collect();

    let mut sets = UnionFind::<usize>::new(fields.len());
    for (a, b) in &ctx.pending {
        if let (Some(a), Some(b)) = (index.get(a), index.get(b)) {
            sets.union(*a, *b);
        }
    }
    let labels = sets.into_labeling();

    // Groups in the order of their first (name-sorted) field.
    let mut groups: Vec<Vec<FieldId>> = Vec::new();
    let mut group_of: HashMap<usize, usize> = HashMap::new();
    for (i, field) in fields.iter().enumerate() {
        let group = *group_of.entry(labels[i]).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[group].push(*field);
    }

    let mut links = 0;
    for group in groups {
        match group.as_slice() {
            [field] => link_through(ctx, *field, None),
            [left, right] => link_through(ctx, *left, Some(*right)),
            // Pairing claims both fields, so larger groups cannot form.
            [left, rest @ ..] => {
                link_through(ctx, *left, None);
                for field in rest {
                    link_through(ctx, *field, None);
                }
            }
            [] => continue,
        }
        links += 1;
    }
    links
}

/// Store `field` (and its reverse `partner`, if any) through a connection.
fn link_through(ctx: &mut ResolutionContext<'_>, field: FieldId, partner: Option<FieldId>) {
    let reused = existing_connection(ctx, field, partner).or_else(|| {
        let partner = partner?;
        existing_connection(ctx, partner, Some(field)).map(|(c, this, other)| (c, other, this))
    });
    let (connection, this, other) = match reused {
        Some(found) => found,
        None => synthesize(ctx, field, partner),
    };

    set_side(ctx, this, Some(field));
    set_side(ctx, other, partner);

    let link = Link::ManyToMany(ManyToManyLink {
        connection,
        left: ConnectionSide {
            field: Some(field),
            endpoint: this,
        },
        right: ConnectionSide {
            field: partner,
            endpoint: other,
        },
    });
    ctx.schema.set_link(field, link.clone());
    if let Some(partner) = partner {
        ctx.schema.set_link(partner, link);
    }
    tracing::trace!(
        field = %ctx.schema.qualified_name(field),
        connection = %ctx.schema.entity_at(connection).api_name,
        "linked through connection"
    );
}

/// A known connection usable for `field`: one whose endpoint is already bound
/// to it, or the join entity the field declares. Returns the connection, the
/// endpoint on `field`'s side and the other endpoint.
fn existing_connection(
    ctx: &ResolutionContext<'_>,
    field: FieldId,
    partner: Option<FieldId>,
) -> Option<(EntityId, FieldId, FieldId)> {
    let bound = ctx
        .connection_entities
        .iter()
        .copied()
        .find(|c| endpoints(ctx, *c).iter().any(|e| side_field_of(ctx, *e) == Some(field)));
    let connection = match bound {
        Some(c) => c,
        None => {
            let join = ctx
                .field(field)
                .data
                .link_properties()
                .and_then(|p| p.join_entity.clone())?;
            ctx.schema.entity_id(&join)?
        }
    };

    let this = pick_side(ctx, connection, field)?;
    let other = endpoints(ctx, connection).into_iter().find(|e| {
        *e != this && {
            let side = side_field_of(ctx, *e);
            side.is_none() || side == partner
        }
    });
    match other {
        Some(other) => Some((connection, this, other)),
        None => {
            tracing::debug!(
                field = %ctx.schema.qualified_name(field),
                connection = %ctx.schema.entity_at(connection).api_name,
                "declared connection has no free endpoint, synthesizing"
            );
            None
        }
    }
}

/// Create `{prefix}{Owner}{Field}Connection` with an identity field and the
/// two generic endpoints.
fn synthesize(
    ctx: &mut ResolutionContext<'_>,
    field: FieldId,
    partner: Option<FieldId>,
) -> (EntityId, FieldId, FieldId) {
    let owner = ctx.owner(field).api_name.clone();
    let base = format!(
        "{}{}{}Connection",
        ctx.settings.resolver.synthesized_prefix,
        owner,
        pascal_case(&ctx.field(field).api_name)
    );
    let mut name = base.clone();
    let mut suffix = 2;
    while ctx.schema.entity_id(&name).is_some() {
        name = format!("{base}{suffix}");
        suffix += 1;
    }

    let mut this_types = vec![owner.clone()];
    let mut other_types = ctx.field(field).valid_types().to_vec();
    if let Some(partner) = partner {
        this_types.extend(ctx.field(partner).valid_types().iter().cloned());
        other_types.push(ctx.owner(partner).api_name.clone());
    }
    for types in [&mut this_types, &mut other_types] {
        types.sort();
        types.dedup();
    }

    let connection = ctx.schema.add_entity(&name, &name, false);
    ctx.connection_entities.insert(connection);
    ctx.schema.add_field(connection, Field::identity());
    let this = ctx
        .schema
        .add_field(connection, Field::endpoint(THIS_ENDPOINT, this_types));
    let other = ctx
        .schema
        .add_field(connection, Field::endpoint(OTHER_ENDPOINT, other_types));
    for endpoint in [this, other] {
        ctx.schema.mark_one_sided(endpoint);
    }
    (connection, this, other)
}

fn set_side(ctx: &mut ResolutionContext<'_>, endpoint: FieldId, side_field: Option<FieldId>) {
    ctx.schema.set_link(
        endpoint,
        Link::ConnectionEndpoint(ConnectionEndpointLink { side_field }),
    );
}
