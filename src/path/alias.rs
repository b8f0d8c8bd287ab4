//! Per-query alias allocation.

/// Hands out `t0`, `t1`, ... so every joined row gets its own alias, even
/// when the same entity type appears several times in one query.
#[derive(Debug, Default, Clone)]
pub struct AliasGenerator {
    next: usize,
}

impl AliasGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_alias(&mut self) -> String {
        let alias = format!("t{}", self.next);
        self.next += 1;
        alias
    }

    /// Number of aliases handed out so far.
    pub fn issued(&self) -> usize {
        self.next
    }
}
