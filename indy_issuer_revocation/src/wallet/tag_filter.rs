use crate::wallet::record_tags::RecordTags;

/// Comparison operators usable against a single tag value.
///
/// Values that parse as integers on both sides compare numerically, anything
/// else compares lexically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

/// Closed tag-filter expression shared by the query builders and the
/// in-memory matcher.
#[derive(Debug, Clone, PartialEq)]
pub enum TagFilter {
    Eq(String, String),
    In(String, Vec<String>),
    Compare(CmpOp, String, String),
    Not(Box<TagFilter>),
    And(Vec<TagFilter>),
    Or(Vec<TagFilter>),
}

impl TagFilter {
    pub fn eq(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::Eq(key.into(), value.into())
    }

    pub fn and(filters: Vec<TagFilter>) -> Self {
        Self::And(filters)
    }

    /// Evaluates the filter against a record's tags. A missing tag never
    /// matches, not even under `Not` of a comparison.
    pub fn matches(&self, tags: &RecordTags) -> bool {
        match self {
            TagFilter::Eq(key, value) => tags.get(key) == Some(value.as_str()),
            TagFilter::In(key, values) => tags
                .get(key)
                .map(|actual| values.iter().any(|v| v == actual))
                .unwrap_or(false),
            TagFilter::Compare(op, key, value) => tags
                .get(key)
                .map(|actual| compare(*op, actual, value))
                .unwrap_or(false),
            TagFilter::Not(inner) => !inner.matches(tags),
            TagFilter::And(filters) => filters.iter().all(|f| f.matches(tags)),
            TagFilter::Or(filters) => filters.iter().any(|f| f.matches(tags)),
        }
    }
}

fn compare(op: CmpOp, actual: &str, expected: &str) -> bool {
    let ordering = match (actual.parse::<i64>(), expected.parse::<i64>()) {
        (Ok(a), Ok(b)) => a.cmp(&b),
        _ => actual.cmp(expected),
    };
    match op {
        CmpOp::Neq => ordering != std::cmp::Ordering::Equal,
        CmpOp::Gt => ordering == std::cmp::Ordering::Greater,
        CmpOp::Gte => ordering != std::cmp::Ordering::Less,
        CmpOp::Lt => ordering == std::cmp::Ordering::Less,
        CmpOp::Lte => ordering != std::cmp::Ordering::Greater,
    }
}
