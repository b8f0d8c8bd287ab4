//! Shared string inflection utilities.
//!
//! Entity api names are PascalCase (`HumanUser`) while link fields are
//! snake_case and singular or plural depending on their cardinality
//! (`human_user`, `human_users`). Uses the `inflector` crate with additional
//! handling for irregular and uncountable nouns that show up in production
//! tracking schemas.

use inflector::Inflector;

/// Irregular plurals that inflector doesn't handle well for schema names.
static IRREGULAR_PLURALS: &[(&str, &str)] = &[
    ("person", "people"),
    ("child", "children"),
    ("leaf", "leaves"),
    ("half", "halves"),
    ("self", "selves"),
    ("analysis", "analyses"),
    ("basis", "bases"),
    ("criterion", "criteria"),
    ("index", "indices"),
    ("matrix", "matrices"),
    ("vertex", "vertices"),
];

/// Words whose plural is the word itself.
static UNCOUNTABLE: &[&str] = &["software", "media", "data", "footage", "equipment", "series"];

/// Pluralize the last word of a snake_case name.
///
/// # Examples
/// ```ignore
/// assert_eq!(pluralize("shot"), "shots");
/// assert_eq!(pluralize("human_user"), "human_users");
/// assert_eq!(pluralize("delivery"), "deliveries");
/// assert_eq!(pluralize("person"), "people");
/// ```
pub fn pluralize(word: &str) -> String {
    inflect_last_word(word, |last| {
        if UNCOUNTABLE.contains(&last) {
            return last.to_string();
        }
        for (singular, plural) in IRREGULAR_PLURALS {
            if last == *singular || last == *plural {
                return plural.to_string();
            }
        }
        last.to_plural()
    })
}

/// Convert an entity api name to its snake_case field form (`HumanUser` -> `human_user`).
pub fn snake_case(name: &str) -> String {
    name.to_snake_case()
}

/// Convert a snake_case name to PascalCase (`addressings_to` -> `AddressingsTo`).
pub fn pascal_case(name: &str) -> String {
    name.to_pascal_case()
}

fn inflect_last_word(word: &str, inflect: impl Fn(&str) -> String) -> String {
    if word.is_empty() {
        return String::new();
    }
    let lower = word.to_lowercase();
    match lower.rsplit_once('_') {
        Some((head, last)) if !last.is_empty() => format!("{}_{}", head, inflect(last)),
        _ => inflect(&lower),
    }
}
