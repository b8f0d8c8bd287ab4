//! Stage 2: well-known reverses.
//!
//! Some standard fields of the tracking service never follow the naming
//! conventions. The table below names their reverse field, or marks them as
//! one-sided when the service has no reverse for them at all.

use super::ResolutionContext;

/// One entry of the default reverse table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultReverse {
    /// `None` applies to the field on every entity.
    pub entity: Option<&'static str>,
    pub field: &'static str,
    /// `None` means the field is known to be one-sided.
    pub reverse: Option<&'static str>,
}

const fn any(field: &'static str, reverse: Option<&'static str>) -> DefaultReverse {
    DefaultReverse {
        entity: None,
        field,
        reverse,
    }
}

const fn on(entity: &'static str, field: &'static str, reverse: Option<&'static str>) -> DefaultReverse {
    DefaultReverse {
        entity: Some(entity),
        field,
        reverse,
    }
}

pub static DEFAULT_REVERSES: &[DefaultReverse] = &[
    any("created_by", None),
    any("updated_by", None),
    any("project", None),
    any("addressings_to", None),
    any("addressings_cc", None),
    any("tag_list", None),
    any("image_source_entity", None),
    any("task_assignees", None),
    any("step", None),
    on("Task", "entity", Some("tasks")),
    on("Version", "entity", Some("versions")),
    on("Version", "sg_task", Some("versions")),
    on("Version", "user", None),
    on("Version", "playlists", Some("versions")),
    on("Playlist", "versions", Some("playlists")),
    on("PublishedFile", "entity", Some("published_files")),
    on("PublishedFile", "version", Some("published_files")),
    on("PublishedFile", "task", None),
    on("Note", "note_links", Some("notes")),
    on("Note", "tasks", Some("notes")),
    on("Note", "user", None),
    on("Reply", "entity", Some("replies")),
    on("Attachment", "attachment_links", Some("attachments")),
];

/// Look up a field, preferring an entity-specific entry over the wildcard.
pub fn lookup(entity: &str, field: &str) -> Option<Option<&'static str>> {
    DEFAULT_REVERSES
        .iter()
        .find(|d| d.entity == Some(entity) && d.field == field)
        .or_else(|| {
            DEFAULT_REVERSES
                .iter()
                .find(|d| d.entity.is_none() && d.field == field)
        })
        .map(|d| d.reverse)
}

pub(crate) fn run(ctx: &mut ResolutionContext<'_>) -> usize {
    let mut links = 0;
    for id in ctx.link_fields() {
        if !ctx.is_open(id) {
            continue;
        }
        let field = ctx.field(id);
        let Some(default) = lookup(&ctx.owner(id).api_name, &field.api_name) else {
            continue;
        };
        let Some(reverse_name) = default else {
            ctx.schema.mark_one_sided(id);
            links += 1;
            continue;
        };

        // A single-entity parent may have a child on each target; a
        // multi-entity field has exactly one reverse.
        let single = field.is_single_entity();
        let targets = field.valid_types().to_vec();
        let mut linked = false;
        for target in targets {
            let Some(reverse) = ctx.field_on(&target, reverse_name) else {
                continue;
            };
            if ctx.pair(id, reverse) {
                linked = true;
                if !single {
                    break;
                }
            }
        }
        if linked {
            links += 1;
        }
    }
    links
}
