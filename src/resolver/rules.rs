//! Ordered (pattern, action) rule tables.
//!
//! Naming heuristics are data: a table of regex patterns, each carrying the
//! action to attempt when it matches. Rules are evaluated in order until one
//! of them produces a result.

use regex::{Captures, Regex};

/// A single heuristic: when `pattern` matches, try `action`.
#[derive(Debug, Clone)]
pub struct Rule<A> {
    /// Rule identifier, reported in logs.
    pub name: &'static str,
    pub pattern: Regex,
    pub action: A,
}

#[derive(Debug, Clone)]
pub struct RuleTable<A> {
    rules: Vec<Rule<A>>,
}

impl<A> RuleTable<A> {
    pub fn new(rules: Vec<Rule<A>>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule<A>] {
        &self.rules
    }

    /// Evaluate every matching rule in order, returning the first result the
    /// callback accepts.
    pub fn first_success<T>(
        &self,
        text: &str,
        mut attempt: impl FnMut(&Rule<A>, &Captures<'_>) -> Option<T>,
    ) -> Option<T> {
        self.rules.iter().find_map(|rule| {
            let captures = rule.pattern.captures(text)?;
            attempt(rule, &captures)
        })
    }

    /// Name of the first rule whose pattern matches.
    pub fn first_match(&self, text: &str) -> Option<&'static str> {
        self.rules
            .iter()
            .find(|rule| rule.pattern.is_match(text))
            .map(|rule| rule.name)
    }
}
