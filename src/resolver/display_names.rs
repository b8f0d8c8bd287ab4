//! Stage 4: display-name correlation for renamed fields.
//!
//! Custom multi-entity fields (`sg_*`) keep their api name forever while
//! users rename them freely, so their reverse can only be recovered through
//! display names: first the current ones, then the audit trail of previous
//! names. When several candidates once carried the name, the most recent
//! rename wins. A field is linked only when exactly one structurally valid
//! candidate correlates, and such links are always reported as low
//! confidence.

use chrono::NaiveDateTime;
use regex::Regex;

use super::{Diagnostic, ResolutionContext};
use crate::schema::inflection::snake_case;
use crate::schema::FieldId;

pub(crate) fn run(ctx: &mut ResolutionContext<'_>) -> usize {
    if !ctx.settings.resolver.display_name_fallback {
        return 0;
    }
    let mut links = 0;
    for id in ctx.link_fields() {
        if !ctx.is_open(id) || !ctx.field(id).is_multi_entity() {
            continue;
        }
        let Some(key) = renamed_key(ctx.renamed, &ctx.field(id).api_name) else {
            continue;
        };

        let candidates = structural_candidates(ctx, id);
        let current: Vec<FieldId> = candidates
            .iter()
            .copied()
            .filter(|c| correlates(&key, &ctx.field(*c).display_name))
            .collect();

        let matched = if current.len() == 1 {
            current
        } else {
            let renamed: Vec<(NaiveDateTime, FieldId)> = candidates
                .iter()
                .copied()
                .filter_map(|c| {
                    let owner = &ctx.owner(c).api_name;
                    ctx.sources
                        .previous_display_names(owner, &ctx.field(c).api_name)
                        .into_iter()
                        .find(|(name, _)| correlates(&key, name))
                        .map(|(_, at)| (at, c))
                })
                .collect();
            let historical = most_recent(renamed);
            if historical.len() == 1 {
                historical
            } else if current.len() > 1 {
                current
            } else {
                historical
            }
        };

        let entity = ctx.owner(id).api_name.clone();
        let field = ctx.field(id).api_name.clone();
        match matched.as_slice() {
            [] => {}
            [candidate] => {
                let name = ctx.schema.qualified_name(*candidate);
                let accept = ctx.settings.resolver.accept_single_candidate;
                if accept && ctx.pair(id, *candidate) {
                    links += 1;
                    ctx.diagnostics
                        .push(Diagnostic::low_confidence(&entity, &field, name, true));
                } else {
                    ctx.diagnostics
                        .push(Diagnostic::low_confidence(&entity, &field, name, false));
                }
            }
            many => {
                let names = many.iter().map(|c| ctx.schema.qualified_name(*c)).collect();
                ctx.diagnostics
                    .push(Diagnostic::ambiguous(&entity, &field, names));
            }
        }
    }
    links
}

/// The api name with the first matching rename pattern stripped, if any
/// pattern matches.
pub fn renamed_key(patterns: &[Regex], api_name: &str) -> Option<String> {
    patterns.iter().find(|p| p.is_match(api_name)).and_then(|p| {
        let key = p.replace(api_name, "").trim_matches('_').to_string();
        (!key.is_empty()).then_some(key)
    })
}

/// Whether a display name refers to `key`: its snake-cased form equals the
/// key or appears in it as a whole underscore-separated token sequence.
pub fn correlates(key: &str, display_name: &str) -> bool {
    let name = snake_case(display_name);
    if name.is_empty() {
        return false;
    }
    key == name || format!("_{key}_").contains(&format!("_{name}_"))
}

/// The candidates whose matching rename happened last. Several only when
/// the renames share a timestamp.
fn most_recent(renamed: Vec<(NaiveDateTime, FieldId)>) -> Vec<FieldId> {
    let Some(latest) = renamed.iter().map(|(at, _)| *at).max() else {
        return Vec::new();
    };
    renamed
        .into_iter()
        .filter(|(at, _)| *at == latest)
        .map(|(_, c)| c)
        .collect()
}

/// Fields on the declared targets that could legally be the reverse of `id`.
fn structural_candidates(ctx: &ResolutionContext<'_>, id: FieldId) -> Vec<FieldId> {
    let mut targets = ctx.field(id).valid_types().to_vec();
    targets.sort();
    targets.dedup();

    let mut candidates: Vec<(String, FieldId)> = targets
        .iter()
        .filter_map(|t| ctx.schema.entity(t))
        .flat_map(|entity| ctx.schema.fields_of(entity))
        .filter(|f| ctx.can_pair(id, f.id()))
        .map(|f| (ctx.schema.qualified_name(f.id()), f.id()))
        .collect();
    candidates.sort();
    candidates.into_iter().map(|(_, c)| c).collect()
}
