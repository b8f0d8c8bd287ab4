//! Filter compiler.
//!
//! ```text
//! JSON filters ──▶ FilterExpr ──▶ FilterCompiler ──▶ Expr (predicate over the root row)
//!   [grammar]                       │   ├─ ops      allow-list per field type
//!                                   │   ├─ values   typed literals / entity refs
//!                                   │   └─ time     relative + calendar windows
//!                                   └─ path         hops of dotted leaves
//! ```

mod compiler;
mod grammar;
mod ops;
mod time;
mod values;

pub use compiler::{CompiledFilter, FilterCompiler};
pub use grammar::FilterExpr;
pub use ops::{allowed_operators, is_allowed, FilterOperator, GroupOperator};
pub use time::{
    calendar_window, relative_window, CalendarUnit, Clock, Direction, FixedClock, RelativeUnit,
    SystemClock, Window,
};
pub use values::{parse_date, parse_datetime, EntityRef, ValueCoercer};
