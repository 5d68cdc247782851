//! Filter expressions and their compilation into parameterized SQL.
//!
//! A [`FilterExpr`] is either a single comparison ([`Filter`]) or a group of
//! expressions combined by one boolean operator ([`LogicalFilter`]).
//!
//! ```text
//! LogicalFilter { operator: "OR", filters: [car = volvo, car = bmw] }
//!     compile(1) → "(car = $1 OR car = $2)", [volvo, bmw], next = 3
//! ```

use serde::{Deserialize, Serialize};

use crate::query::value::{Value, ValueKind};

/// Errors raised while checking or compiling a filter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    #[error("cant build filter for query: empty key or operator")]
    IncompleteLeaf,

    #[error("cant build logical filter: empty operator")]
    IncompleteLogical,

    #[error("field '{0}' is not filterable")]
    FieldNotAllowed(String),

    #[error("operator '{0}' is not allowed")]
    OperatorNotAllowed(String),

    #[error("field '{field}' expects {expected} values, got {found}")]
    ValueMismatch {
        field: String,
        expected: ValueKind,
        found: ValueKind,
    },

    #[error("operator '{operator}' does not apply to {kind} field '{field}'")]
    OperatorMismatch {
        field: String,
        operator: String,
        kind: ValueKind,
    },
}

/// A single comparison, e.g. `name = 'dummy'`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Filter {
    pub key: String,
    pub operator: String,
    pub value: Value,
}

/// Child expressions combined by one boolean operator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogicalFilter {
    pub operator: String,
    #[serde(default)]
    pub filters: Vec<FilterExpr>,
}

/// A node of a filter tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterExpr {
    Leaf(Filter),
    Logical(LogicalFilter),
}

/// Output of [`FilterExpr::compile`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Compiled {
    /// SQL fragment with `$n` placeholders.
    pub fragment: String,
    /// Bound arguments in placeholder order.
    pub args: Vec<Value>,
    /// First placeholder index not used by this fragment.
    pub next_index: usize,
}

impl FilterExpr {
    /// Shorthand for a leaf comparison.
    pub fn leaf(
        key: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        FilterExpr::Leaf(Filter {
            key: key.into(),
            operator: operator.into(),
            value: value.into(),
        })
    }

    /// Shorthand for `key = value`.
    pub fn eq(key: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::leaf(key, "=", value)
    }

    /// Shorthand for a logical node.
    pub fn logical(operator: impl Into<String>, filters: Vec<FilterExpr>) -> Self {
        FilterExpr::Logical(LogicalFilter {
            operator: operator.into(),
            filters,
        })
    }

    /// Shorthand for an `AND` node.
    pub fn all(filters: Vec<FilterExpr>) -> Self {
        Self::logical("AND", filters)
    }

    /// Compile the tree, numbering placeholders from `start`.
    ///
    /// Children are compiled left to right; each child starts where the
    /// previous one stopped. Children that compile to nothing (empty logical
    /// nodes) are skipped so they never leave a dangling operator behind.
    pub fn compile(&self, start: usize) -> Result<Compiled, FilterError> {
        match self {
            FilterExpr::Leaf(filter) => filter.compile(start),
            FilterExpr::Logical(logical) => logical.compile(start),
        }
    }

    #[cfg(test)]
    fn leaf_count(&self) -> usize {
        match self {
            FilterExpr::Leaf(_) => 1,
            FilterExpr::Logical(l) => l.filters.iter().map(FilterExpr::leaf_count).sum(),
        }
    }

    /// Validate caller supplied fields, operators and value types against `policy`.
    pub fn check(&self, policy: &FilterPolicy) -> Result<(), FilterError> {
        match self {
            FilterExpr::Leaf(f) => {
                let kind = policy
                    .field_kind(&f.key)
                    .ok_or_else(|| FilterError::FieldNotAllowed(f.key.clone()))?;
                if !policy.operators.iter().any(|op| op.eq_ignore_ascii_case(&f.operator)) {
                    return Err(FilterError::OperatorNotAllowed(f.operator.clone()));
                }
                if f.value.kind() != kind {
                    return Err(FilterError::ValueMismatch {
                        field: f.key.clone(),
                        expected: kind,
                        found: f.value.kind(),
                    });
                }
                if f.operator.eq_ignore_ascii_case("LIKE") && kind != ValueKind::Text {
                    return Err(FilterError::OperatorMismatch {
                        field: f.key.clone(),
                        operator: f.operator.clone(),
                        kind,
                    });
                }
                Ok(())
            }
            FilterExpr::Logical(l) => {
                if !policy
                    .logical_operators
                    .iter()
                    .any(|op| op.eq_ignore_ascii_case(&l.operator))
                {
                    return Err(FilterError::OperatorNotAllowed(l.operator.clone()));
                }
                l.filters.iter().try_for_each(|child| child.check(policy))
            }
        }
    }
}

impl Filter {
    fn compile(&self, index: usize) -> Result<Compiled, FilterError> {
        if self.key.is_empty() || self.operator.is_empty() {
            return Err(FilterError::IncompleteLeaf);
        }

        Ok(Compiled {
            fragment: format!("{} {} ${}", self.key, self.operator, index),
            args: vec![self.value.clone()],
            next_index: index + 1,
        })
    }
}

impl LogicalFilter {
    fn compile(&self, start: usize) -> Result<Compiled, FilterError> {
        if self.filters.is_empty() {
            return Ok(Compiled {
                next_index: start,
                ..Compiled::default()
            });
        }
        if self.operator.is_empty() {
            return Err(FilterError::IncompleteLogical);
        }

        let mut fragments = Vec::with_capacity(self.filters.len());
        let mut args = Vec::new();
        let mut index = start;

        for child in &self.filters {
            let compiled = child.compile(index)?;
            index = compiled.next_index;
            if compiled.fragment.is_empty() {
                continue;
            }
            fragments.push(compiled.fragment);
            args.extend(compiled.args);
        }

        if fragments.is_empty() {
            return Ok(Compiled {
                next_index: index,
                ..Compiled::default()
            });
        }

        Ok(Compiled {
            fragment: format!("({})", fragments.join(&format!(" {} ", self.operator))),
            args,
            next_index: index,
        })
    }
}

/// Allow-list applied to filters that arrive from clients.
///
/// Each field carries the column type its values must have; `LIKE` is only
/// accepted on text fields.
#[derive(Debug, Clone, Copy)]
pub struct FilterPolicy {
    pub fields: &'static [(&'static str, ValueKind)],
    pub operators: &'static [&'static str],
    pub logical_operators: &'static [&'static str],
}

impl FilterPolicy {
    pub const COMPARISONS: &'static [&'static str] = &["=", "!=", "<", "<=", ">", ">=", "LIKE"];
    pub const LOGICAL: &'static [&'static str] = &["AND", "OR"];

    pub const fn new(fields: &'static [(&'static str, ValueKind)]) -> Self {
        Self {
            fields,
            operators: Self::COMPARISONS,
            logical_operators: Self::LOGICAL,
        }
    }

    fn field_kind(&self, key: &str) -> Option<ValueKind> {
        self.fields
            .iter()
            .find(|(name, _)| *name == key)
            .map(|(_, kind)| *kind)
    }
}

/// Build a `WHERE` clause for `filter`, numbering placeholders from 1.
///
/// Returns an empty clause and no arguments when there is no filter or the
/// filter compiles to nothing.
pub fn build_where(filter: Option<&FilterExpr>) -> Result<(String, Vec<Value>), FilterError> {
    let Some(filter) = filter else {
        return Ok((String::new(), Vec::new()));
    };

    let compiled = filter.compile(1)?;
    if compiled.fragment.is_empty() {
        return Ok((String::new(), Vec::new()));
    }

    Ok((format!(" WHERE {}", compiled.fragment), compiled.args))
}
