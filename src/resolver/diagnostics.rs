//! Structured resolution diagnostics.
//!
//! Nothing the resolver finds is fatal: fields it cannot pair stay
//! unresolved and are reported here so callers can assert on them.

use std::fmt;

/// What went wrong (or was only guessed) for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiagnosticKind {
    /// More than one reverse candidate; the field was left unresolved.
    AmbiguousReverseLink,
    /// No reverse was found and the field is not known to be one-sided.
    OrphanLinkField,
    /// Exactly one display-name candidate was found and accepted.
    LowConfidenceMatch,
}

impl DiagnosticKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticKind::AmbiguousReverseLink => "ambiguous_reverse_link",
            DiagnosticKind::OrphanLinkField => "orphan_link_field",
            DiagnosticKind::LowConfidenceMatch => "low_confidence_match",
        }
    }
}

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Severity {
    /// The schema is usable but a field could not be resolved.
    Warning,
    /// A link was made on weak evidence.
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub severity: Severity,
    pub entity: String,
    pub field: String,
    /// Qualified names (`Entity.field`) of the candidates considered.
    pub candidates: Vec<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn ambiguous(entity: &str, field: &str, candidates: Vec<String>) -> Self {
        let message = format!(
            "{} reverse candidates, leaving unresolved: {}",
            candidates.len(),
            candidates.join(", ")
        );
        Self {
            kind: DiagnosticKind::AmbiguousReverseLink,
            severity: Severity::Warning,
            entity: entity.to_string(),
            field: field.to_string(),
            candidates,
            message,
        }
    }

    pub fn orphan(entity: &str, field: &str) -> Self {
        Self {
            kind: DiagnosticKind::OrphanLinkField,
            severity: Severity::Warning,
            entity: entity.to_string(),
            field: field.to_string(),
            candidates: Vec::new(),
            message: "no reverse field found; the field cannot be traversed".to_string(),
        }
    }

    pub fn low_confidence(entity: &str, field: &str, candidate: String, accepted: bool) -> Self {
        let message = if accepted {
            format!("linked to {candidate} by display name alone")
        } else {
            format!("single display-name candidate {candidate} not linked")
        };
        Self {
            kind: DiagnosticKind::LowConfidenceMatch,
            severity: Severity::Info,
            entity: entity.to_string(),
            field: field.to_string(),
            candidates: vec![candidate],
            message,
        }
    }

    /// `Entity.field` this diagnostic is about.
    pub fn qualified_field(&self) -> String {
        format!("{}.{}", self.entity, self.field)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.severity {
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(
            f,
            "{}[{}]: {}.{}: {}",
            level,
            self.kind.as_str(),
            self.entity,
            self.field,
            self.message
        )
    }
}
