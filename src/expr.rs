//! Predicate AST - the backend-neutral output of filter compilation.
//!
//! Column references are always qualified by the alias of the entity row they
//! read from, so one tree can mention the same entity type several times.
//! Correlated subqueries are expressed with [`Expr::Exists`]; there is no
//! dialect here, only the logical form. `Display` renders that form for
//! humans and snapshots.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

// =============================================================================
// Expression AST
// =============================================================================

/// A predicate or value expression.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Expr {
    /// Matches every row.
    True,
    /// Matches no row.
    False,

    /// Column reference: alias.column
    Column(ColumnRef),

    /// Literal values
    Literal(Literal),

    /// Comparison: left op right
    Compare {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },

    And(Vec<Expr>),
    Or(Vec<Expr>),
    Not(Box<Expr>),

    /// IS NULL / IS NOT NULL
    IsNull { expr: Box<Expr>, negated: bool },

    /// IN: expr IN (values...)
    In { expr: Box<Expr>, values: Vec<Literal> },

    /// Case-insensitive substring match.
    Like {
        expr: Box<Expr>,
        kind: LikeKind,
        text: String,
    },

    /// EXISTS (entity alias WHERE predicate)
    Exists(Box<Subquery>),
}

/// alias.column
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ColumnRef {
    pub alias: String,
    pub column: String,
}

impl ColumnRef {
    pub fn new(alias: &str, column: &str) -> Self {
        Self {
            alias: alias.into(),
            column: column.into(),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.alias, self.column)
    }
}

/// Literal values.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "<>",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LikeKind {
    Contains,
    StartsWith,
    EndsWith,
}

/// A correlated subquery over one entity, used by [`Expr::Exists`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subquery {
    pub entity: String,
    pub alias: String,
    pub predicate: Expr,
}

/// A left join of one entity row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Join {
    pub entity: String,
    pub alias: String,
    pub on: Expr,
}

impl Join {
    pub fn new(entity: &str, alias: &str, on: Expr) -> Self {
        Self {
            entity: entity.into(),
            alias: alias.into(),
            on,
        }
    }

    /// `EXISTS (entity alias WHERE on AND inner)`: the same row relation as a
    /// correlated existence check.
    pub fn exists(&self, inner: Expr) -> Expr {
        exists(&self.entity, &self.alias, and(vec![self.on.clone(), inner]))
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LEFT JOIN {} {} ON {}", self.entity, self.alias, self.on)
    }
}

// =============================================================================
// Expression Constructors
// =============================================================================

/// Create a qualified column reference (alias.column).
pub fn table_col(alias: &str, column: &str) -> Expr {
    Expr::Column(ColumnRef::new(alias, column))
}

/// Create an integer literal.
pub fn lit_int(n: i64) -> Expr {
    Expr::Literal(Literal::Int(n))
}

/// Create a string literal.
pub fn lit_str(s: &str) -> Expr {
    Expr::Literal(Literal::Text(s.into()))
}

/// Create a boolean literal.
pub fn lit_bool(b: bool) -> Expr {
    Expr::Literal(Literal::Bool(b))
}

/// Conjunction. Nested conjunctions are flattened, `TRUE` operands dropped,
/// and a single operand is returned as is.
pub fn and(exprs: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(exprs.len());
    for expr in exprs {
        match expr {
            Expr::True => {}
            Expr::False => return Expr::False,
            Expr::And(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => Expr::True,
        1 => flat.remove(0),
        _ => Expr::And(flat),
    }
}

/// Disjunction, simplified the same way as [`and`].
pub fn or(exprs: Vec<Expr>) -> Expr {
    let mut flat = Vec::with_capacity(exprs.len());
    for expr in exprs {
        match expr {
            Expr::False => {}
            Expr::True => return Expr::True,
            Expr::Or(inner) => flat.extend(inner),
            other => flat.push(other),
        }
    }
    match flat.len() {
        0 => Expr::False,
        1 => flat.remove(0),
        _ => Expr::Or(flat),
    }
}

pub fn not(expr: Expr) -> Expr {
    Expr::Not(Box::new(expr))
}

pub fn exists(entity: &str, alias: &str, predicate: Expr) -> Expr {
    Expr::Exists(Box::new(Subquery {
        entity: entity.into(),
        alias: alias.into(),
        predicate,
    }))
}

/// Operator-style constructors.
pub trait ExprExt: Sized {
    fn into_expr(self) -> Expr;

    fn compare(self, op: CompareOp, other: impl Into<Expr>) -> Expr {
        Expr::Compare {
            left: Box::new(self.into_expr()),
            op,
            right: Box::new(other.into()),
        }
    }

    fn eq(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Eq, other)
    }

    fn ne(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Ne, other)
    }

    fn gt(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Gt, other)
    }

    fn gte(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Gte, other)
    }

    fn lt(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Lt, other)
    }

    fn lte(self, other: impl Into<Expr>) -> Expr {
        self.compare(CompareOp::Lte, other)
    }

    fn is_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: false,
        }
    }

    fn is_not_null(self) -> Expr {
        Expr::IsNull {
            expr: Box::new(self.into_expr()),
            negated: true,
        }
    }

    fn in_list(self, values: Vec<Literal>) -> Expr {
        if values.is_empty() {
            return Expr::False;
        }
        Expr::In {
            expr: Box::new(self.into_expr()),
            values,
        }
    }

    fn like(self, kind: LikeKind, text: &str) -> Expr {
        Expr::Like {
            expr: Box::new(self.into_expr()),
            kind,
            text: text.into(),
        }
    }
}

impl ExprExt for Expr {
    fn into_expr(self) -> Expr {
        self
    }
}

impl ExprExt for ColumnRef {
    fn into_expr(self) -> Expr {
        Expr::Column(self)
    }
}

// =============================================================================
// Conversions
// =============================================================================

impl From<Literal> for Expr {
    fn from(lit: Literal) -> Self {
        Expr::Literal(lit)
    }
}

impl From<ColumnRef> for Expr {
    fn from(col: ColumnRef) -> Self {
        Expr::Column(col)
    }
}

impl From<i64> for Expr {
    fn from(n: i64) -> Self {
        lit_int(n)
    }
}

impl From<i32> for Expr {
    fn from(n: i32) -> Self {
        lit_int(n as i64)
    }
}

impl From<bool> for Expr {
    fn from(b: bool) -> Self {
        lit_bool(b)
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        lit_str(s)
    }
}

// =============================================================================
// Rendering
// =============================================================================

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => f.write_str("NULL"),
            Literal::Bool(true) => f.write_str("TRUE"),
            Literal::Bool(false) => f.write_str("FALSE"),
            Literal::Int(n) => write!(f, "{n}"),
            Literal::Float(x) => write!(f, "{x:?}"),
            Literal::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Date(d) => write!(f, "DATE '{}'", d.format("%Y-%m-%d")),
            Literal::DateTime(dt) => write!(f, "TIMESTAMP '{}'", dt.format("%Y-%m-%d %H:%M:%S%.f")),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::True => f.write_str("TRUE"),
            Expr::False => f.write_str("FALSE"),
            Expr::Column(col) => write!(f, "{col}"),
            Expr::Literal(lit) => write!(f, "{lit}"),
            Expr::Compare { left, op, right } => write!(f, "{left} {} {right}", op.as_str()),
            Expr::And(exprs) => write_joined(f, exprs, " AND "),
            Expr::Or(exprs) => write_joined(f, exprs, " OR "),
            Expr::Not(inner) => write!(f, "NOT ({inner})"),
            Expr::IsNull { expr, negated } => {
                write!(f, "{expr} IS {}NULL", if *negated { "NOT " } else { "" })
            }
            Expr::In { expr, values } => {
                write!(f, "{expr} IN (")?;
                for (i, value) in values.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{value}")?;
                }
                f.write_str(")")
            }
            Expr::Like { expr, kind, text } => {
                let pattern = match kind {
                    LikeKind::Contains => format!("%{text}%"),
                    LikeKind::StartsWith => format!("{text}%"),
                    LikeKind::EndsWith => format!("%{text}"),
                };
                write!(f, "{expr} ILIKE {}", Literal::Text(pattern))
            }
            Expr::Exists(sub) => write!(
                f,
                "EXISTS ({} {} WHERE {})",
                sub.entity, sub.alias, sub.predicate
            ),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, exprs: &[Expr], sep: &str) -> fmt::Result {
    for (i, expr) in exprs.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match expr {
            Expr::And(_) | Expr::Or(_) => write!(f, "({expr})")?,
            _ => write!(f, "{expr}")?,
        }
    }
    Ok(())
}
