use sha2::{Digest, Sha256};

use crate::domain::table::Table;
use crate::domain::value_objects::Fingerprint;

/// Compute a SHA-256 fingerprint of a table's row content.
///
/// Each row's attributes are serialised to canonical JSON (keys sorted by the
/// `BTreeMap`), the strings are sorted so service order does not matter, joined
/// with `\n` and hashed. Geometry is not part of the fingerprint.
pub fn fingerprint(table: &Table) -> Fingerprint {
    let mut row_strings: Vec<String> = table
        .rows()
        .map(|row| serde_json::to_string(row).unwrap_or_default())
        .collect();

    row_strings.sort_unstable();

    let content = row_strings.join("\n");
    let hash = Sha256::digest(content.as_bytes());
    Fingerprint(format!("{:x}", hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::RowMap;
    use serde_json::json;

    fn row(pairs: &[(&str, serde_json::Value)]) -> RowMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn different_rows_different_fingerprint() {
        let a = Table::from_rows("t", vec![row(&[("UID", json!("1")), ("val", json!("a"))])]);
        let b = Table::from_rows("t", vec![row(&[("UID", json!("1")), ("val", json!("b"))])]);
        assert_ne!(fingerprint(&a), fingerprint(&b));
    }

    #[test]
    fn order_independent() {
        let r1 = row(&[("UID", json!("1"))]);
        let r2 = row(&[("UID", json!("2"))]);
        assert_eq!(
            fingerprint(&Table::from_rows("t", vec![r1.clone(), r2.clone()])),
            fingerprint(&Table::from_rows("t", vec![r2, r1])),
        );
    }
}
