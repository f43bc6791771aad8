//! Property-based test generators using proptest.
//!
//! Provides strategies for generating documents, keys and sequences of
//! table operations.

use docket_codec::{Document, Value};
use proptest::prelude::*;

/// Strategy for generating valid table names.
pub fn table_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z][a-zA-Z0-9_-]{0,31}").expect("Invalid regex")
}

/// Strategy for generating field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,9}").expect("Invalid regex")
}

/// Strategy for scalar values. Floats are finite so that equality is
/// reflexive.
pub fn scalar_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9..1.0e9f64).prop_map(Value::Float),
        "[a-zA-Z0-9 ]{0,16}".prop_map(Value::Text),
    ]
}

/// Strategy for arbitrary nested values.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_strategy().prop_recursive(3, 32, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::vec((field_name_strategy(), inner), 0..4)
                .prop_map(|fields| Value::Map(fields.into_iter().collect())),
        ]
    })
}

/// Strategy for documents without an `id` field.
pub fn document_strategy() -> impl Strategy<Value = Document> {
    prop::collection::vec((field_name_strategy(), value_strategy()), 0..6).prop_map(|fields| {
        fields
            .into_iter()
            .filter(|(name, _)| name != "id")
            .collect()
    })
}

/// Strategy for primary keys drawn from a small pool, so generated
/// operations collide often. Text keys spell the same digits as the integer
/// keys; the two must still behave as distinct keys.
pub fn key_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        (0..8i64).prop_map(Value::Integer),
        "[0-7]".prop_map(Value::Text),
    ]
}

/// Strategy for values of the indexed `tag` field, from a small pool.
pub fn tag_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        "[abc]".prop_map(Value::Text),
        (0..3i64).prop_map(Value::Integer),
    ]
}

/// A table operation for model-based tests.
#[derive(Debug, Clone)]
pub enum TableOperation {
    /// Insert a document under `key`, tagged with `tag` if present.
    Insert {
        /// Primary key.
        key: Value,
        /// Value of the indexed field.
        tag: Option<Value>,
        /// Other fields.
        body: Document,
    },
    /// Merge a patch into `key`.
    Update {
        /// Primary key.
        key: Value,
        /// New value of the indexed field.
        tag: Option<Value>,
        /// Other fields.
        body: Document,
    },
    /// Delete `key`.
    Delete {
        /// Primary key.
        key: Value,
    },
}

impl TableOperation {
    /// The key the operation targets.
    pub fn key(&self) -> &Value {
        match self {
            TableOperation::Insert { key, .. }
            | TableOperation::Update { key, .. }
            | TableOperation::Delete { key } => key,
        }
    }
}

/// Strategy for generating table operations.
pub fn table_operation_strategy() -> impl Strategy<Value = TableOperation> {
    prop_oneof![
        3 => (key_strategy(), prop::option::of(tag_strategy()), document_strategy())
            .prop_map(|(key, tag, body)| TableOperation::Insert { key, tag, body }),
        2 => (key_strategy(), prop::option::of(tag_strategy()), document_strategy())
            .prop_map(|(key, tag, body)| TableOperation::Update { key, tag, body }),
        1 => key_strategy().prop_map(|key| TableOperation::Delete { key }),
    ]
}

/// Strategy for generating a sequence of operations.
pub fn operation_sequence_strategy(
    min_ops: usize,
    max_ops: usize,
) -> impl Strategy<Value = Vec<TableOperation>> {
    prop::collection::vec(table_operation_strategy(), min_ops..max_ops)
}

/// Configuration for property tests.
#[derive(Debug, Clone)]
pub struct PropTestConfig {
    /// Number of test cases to run.
    pub cases: u32,
    /// Maximum shrink iterations.
    pub max_shrink_iters: u32,
}

impl Default for PropTestConfig {
    fn default() -> Self {
        Self {
            cases: 256,
            max_shrink_iters: 1000,
        }
    }
}

impl PropTestConfig {
    /// Creates a configuration for quick tests.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            cases: 32,
            max_shrink_iters: 100,
        }
    }

    /// Creates a configuration for thorough tests.
    #[must_use]
    pub fn thorough() -> Self {
        Self {
            cases: 1024,
            max_shrink_iters: 10000,
        }
    }

    /// Converts to proptest config.
    #[must_use]
    pub fn to_proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_core::validate_name;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn table_names_are_valid(name in table_name_strategy()) {
            prop_assert!(validate_name(&name).is_ok());
        }

        #[test]
        fn documents_never_carry_the_key(doc in document_strategy()) {
            prop_assert!(!doc.contains_key("id"));
        }

        #[test]
        fn operation_keys_come_from_pool(op in table_operation_strategy()) {
            let in_pool = match op.key() {
                Value::Integer(n) => (0..8).contains(n),
                Value::Text(s) => s.len() == 1 && s.chars().all(|c| ('0'..='7').contains(&c)),
                _ => false,
            };
            prop_assert!(in_pool);
        }
    }
}
