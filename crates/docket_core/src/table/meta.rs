//! Table metadata file.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

/// Primary key field and secondary-indexed fields of a table.
///
/// Fixed at creation and stored as `meta.json`:
///
/// ```json
/// {"pk": "id", "indexes": ["category", "owner"]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    /// Primary key field name.
    pub pk: String,
    /// Secondary-indexed field names, in declaration order.
    #[serde(default)]
    pub indexes: Vec<String>,
}

impl TableMeta {
    /// Creates metadata; duplicate index fields are dropped.
    pub fn new<I, S>(pk: impl Into<String>, indexes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut fields: Vec<String> = Vec::new();
        for field in indexes {
            let field = field.into();
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
        Self {
            pk: pk.into(),
            indexes: fields,
        }
    }

    /// Returns true if `field` has a secondary index.
    #[must_use]
    pub fn is_indexed(&self, field: &str) -> bool {
        self.indexes.iter().any(|f| f == field)
    }

    /// Reads `meta.json`; `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns `InvalidFormat` if the file exists but does not parse.
    pub fn load(path: &Path) -> CoreResult<Option<Self>> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&data).map(Some).map_err(|e| {
            CoreError::invalid_format(format!("{}: {e}", path.display()))
        })
    }

    /// Writes `meta.json`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, path: &Path) -> CoreResult<()> {
        let data = serde_json::to_vec(self)
            .map_err(|e| CoreError::invalid_format(e.to_string()))?;
        fs::write(path, data)?;
        Ok(())
    }
}

/// Checks a table or field name against `[A-Za-z0-9_-]+`.
///
/// # Errors
///
/// Returns `InvalidName` otherwise.
pub fn validate_name(name: &str) -> CoreResult<()> {
    let ok = !name.is_empty()
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-');
    if ok {
        Ok(())
    } else {
        Err(CoreError::InvalidName {
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn file_format() {
        let meta = TableMeta::new("id", ["category", "owner", "category"]);
        assert_eq!(meta.indexes, vec!["category", "owner"]);
        assert_eq!(
            serde_json::to_string(&meta).unwrap(),
            r#"{"pk":"id","indexes":["category","owner"]}"#
        );
        assert!(meta.is_indexed("owner"));
        assert!(!meta.is_indexed("id"));
    }

    #[test]
    fn save_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.json");
        assert_eq!(TableMeta::load(&path).unwrap(), None);

        let meta = TableMeta::new("sku", ["price"]);
        meta.save(&path).unwrap();
        assert_eq!(TableMeta::load(&path).unwrap(), Some(meta));
    }

    #[test]
    fn missing_indexes_defaults_to_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("meta.json");
        fs::write(&path, br#"{"pk":"id"}"#).unwrap();
        assert!(TableMeta::load(&path).unwrap().unwrap().indexes.is_empty());

        fs::write(&path, b"not json").unwrap();
        assert!(matches!(
            TableMeta::load(&path),
            Err(CoreError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn names() {
        assert!(validate_name("order_items-2").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("../etc").is_err());
        assert!(validate_name("a b").is_err());
    }
}
