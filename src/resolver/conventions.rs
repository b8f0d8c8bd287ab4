//! Stage 1: built-in naming conventions.
//!
//! A single-entity field named after its target entity (`sequence`,
//! `sg_sequence`) mirrors a multi-entity field on the target named after the
//! owner in plural (`shots`). A multi-entity field named after its target in
//! plural mirrors either kind of field on the target named after the owner.

use std::sync::LazyLock;

use regex::Regex;

use super::rules::{Rule, RuleTable};
use super::ResolutionContext;
use crate::schema::inflection::{pluralize, snake_case};
use crate::schema::FieldId;

/// What the captured `stem` of a field name refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConventionAction {
    /// Single-entity field; the stem is the target's snake-cased name.
    SingularTarget,
    /// Multi-entity field; the stem is the target's snake-cased plural.
    PluralTarget,
}

static CONVENTIONS: LazyLock<RuleTable<ConventionAction>> = LazyLock::new(|| {
    RuleTable::new(vec![
        Rule {
            name: "prefixed_singular",
            pattern: Regex::new(r"^sg_(?P<stem>[a-z0-9_]+)$").unwrap(),
            action: ConventionAction::SingularTarget,
        },
        Rule {
            name: "singular",
            pattern: Regex::new(r"^(?P<stem>[a-z0-9_]+)$").unwrap(),
            action: ConventionAction::SingularTarget,
        },
        Rule {
            name: "prefixed_plural",
            pattern: Regex::new(r"^sg_(?P<stem>[a-z0-9_]+)$").unwrap(),
            action: ConventionAction::PluralTarget,
        },
        Rule {
            name: "plural",
            pattern: Regex::new(r"^(?P<stem>[a-z0-9_]+)$").unwrap(),
            action: ConventionAction::PluralTarget,
        },
    ])
});

/// The convention rule table, in evaluation order.
pub fn convention_rules() -> &'static RuleTable<ConventionAction> {
    &CONVENTIONS
}

pub(crate) fn run(ctx: &mut ResolutionContext<'_>) -> usize {
    let mut links = 0;
    for id in ctx.link_fields() {
        if !ctx.is_open(id) {
            continue;
        }
        let name = ctx.field(id).api_name.clone();
        let linked = CONVENTIONS.first_success(&name, |rule, captures| {
            let stem = captures.name("stem")?.as_str();
            let reverse = apply(ctx, id, rule.action, stem)?;
            tracing::trace!(
                rule = rule.name,
                field = %ctx.schema.qualified_name(id),
                reverse = %ctx.schema.qualified_name(reverse),
                "convention match"
            );
            Some(reverse)
        });
        if linked.is_some() {
            links += 1;
        }
    }
    links
}

/// Try to link `id` according to `action`; returns the reverse field on success.
fn apply(
    ctx: &mut ResolutionContext<'_>,
    id: FieldId,
    action: ConventionAction,
    stem: &str,
) -> Option<FieldId> {
    let field = ctx.field(id);
    let owner = ctx.owner(id).api_name.clone();
    let owner_snake = snake_case(&owner);

    let (target, reverse_names) = match action {
        ConventionAction::SingularTarget if field.is_single_entity() => {
            let target = field
                .valid_types()
                .iter()
                .find(|t| snake_case(t) == stem && **t != owner)?
                .clone();
            let plural = pluralize(&owner_snake);
            (target, vec![plural.clone(), format!("sg_{plural}")])
        }
        ConventionAction::PluralTarget if field.is_multi_entity() => {
            let target = field
                .valid_types()
                .iter()
                .find(|t| pluralize(&snake_case(t)) == stem && **t != owner)?
                .clone();
            let plural = pluralize(&owner_snake);
            (
                target,
                vec![
                    owner_snake.clone(),
                    format!("sg_{owner_snake}"),
                    plural.clone(),
                    format!("sg_{plural}"),
                ],
            )
        }
        _ => return None,
    };

    reverse_names.iter().find_map(|name| {
        let reverse = ctx.field_on(&target, name)?;
        ctx.pair(id, reverse).then_some(reverse)
    })
}
