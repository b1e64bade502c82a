//! Canonical lookup keys for declared constraints.
//!
//! A key is `<kind>__<col>__<col>...` with the columns trimmed, deduplicated and
//! sorted, so two declarations over the same attribute set always land on the
//! same key no matter how the columns were ordered.
//!
//! Inside a column, `\` and every underscore that could touch a separator
//! (leading, trailing or doubled) are escaped with `\`, so `a__b` and the set
//! `{a, b}` get different keys while `tenant_id` stays readable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Separator placed between the kind tag and each column.
pub const KEY_SEPARATOR: &str = "__";

/// Namespace a key lives in. Index-name keys and column keys for the same
/// physical index are deliberately distinct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    UniquenessIndex,
    Uniqueness,
    BelongsTo,
}

impl KeyKind {
    pub fn tag(self) -> &'static str {
        match self {
            KeyKind::UniquenessIndex => "uniqueness_index",
            KeyKind::Uniqueness => "uniqueness",
            KeyKind::BelongsTo => "belongs_to",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "uniqueness_index" => Some(KeyKind::UniquenessIndex),
            "uniqueness" => Some(KeyKind::Uniqueness),
            "belongs_to" => Some(KeyKind::BelongsTo),
            _ => None,
        }
    }
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Normalized key used to store and find constraint validators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintKey(String);

impl ConstraintKey {
    pub fn new<I, S>(kind: KeyKind, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut key = String::from(kind.tag());
        for column in unify_columns(columns) {
            key.push_str(KEY_SEPARATOR);
            push_escaped(&mut key, &column);
        }
        Self(key)
    }

    pub fn uniqueness_index(index_name: &str) -> Self {
        Self::new(KeyKind::UniquenessIndex, [index_name])
    }

    pub fn uniqueness<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self::new(KeyKind::Uniqueness, columns)
    }

    pub fn belongs_to(column: &str) -> Self {
        Self::new(KeyKind::BelongsTo, [column])
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when no column survived normalization, i.e. the key is just the
    /// kind tag. Such keys never match a declaration.
    pub fn is_bare(&self) -> bool {
        !self.0.contains(KEY_SEPARATOR)
    }
}

impl fmt::Display for ConstraintKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConstraintKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

fn push_escaped(key: &mut String, fragment: &str) {
    let chars: Vec<char> = fragment.chars().collect();
    for (index, &c) in chars.iter().enumerate() {
        match c {
            '\\' => key.push_str("\\\\"),
            '_' => {
                let interior = index > 0 && index + 1 < chars.len();
                let lone = interior && chars[index - 1] != '_' && chars[index + 1] != '_';
                if !lone {
                    key.push('\\');
                }
                key.push('_');
            }
            other => key.push(other),
        }
    }
}

/// Trims, drops empty entries, sorts and deduplicates column names.
pub fn unify_columns<I, S>(columns: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut unified: Vec<String> = columns
        .into_iter()
        .map(|column| column.as_ref().trim().to_string())
        .filter(|column| !column.is_empty())
        .collect();
    unified.sort();
    unified.dedup();
    unified
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_uniqueness_keys() {
        let key = ConstraintKey::uniqueness(["field"]);
        assert_eq!(key.as_str(), "uniqueness__field");
    }

    #[test]
    fn column_order_does_not_matter() {
        let permutations = [
            ["a", "b", "c"],
            ["a", "c", "b"],
            ["b", "a", "c"],
            ["b", "c", "a"],
            ["c", "a", "b"],
            ["c", "b", "a"],
        ];
        let expected = ConstraintKey::uniqueness(["a", "b", "c"]);
        for columns in permutations {
            assert_eq!(ConstraintKey::uniqueness(columns), expected);
        }
        assert_eq!(expected.as_str(), "uniqueness__a__b__c");
    }

    #[test]
    fn duplicates_and_blanks_are_dropped() {
        let key = ConstraintKey::uniqueness(["b", "", " a ", "b"]);
        assert_eq!(key.as_str(), "uniqueness__a__b");
    }

    #[test]
    fn different_column_sets_produce_different_keys() {
        let ab = ConstraintKey::uniqueness(["a", "b"]);
        let a = ConstraintKey::uniqueness(["a"]);
        let abc = ConstraintKey::uniqueness(["a", "b", "c"]);
        assert_ne!(ab, a);
        assert_ne!(ab, abc);
        assert_ne!(a, abc);
    }

    #[test]
    fn separators_inside_columns_do_not_collide() {
        let joined = ConstraintKey::uniqueness(["a__b"]);
        let split = ConstraintKey::uniqueness(["a", "b"]);
        assert_ne!(joined, split);
        assert_eq!(joined.as_str(), r"uniqueness__a\_\_b");

        assert_ne!(ConstraintKey::uniqueness(["a_", "b"]), ConstraintKey::uniqueness(["a", "_b"]));
        assert_ne!(ConstraintKey::uniqueness([r"a\"]), ConstraintKey::uniqueness([r"a\\"]));
        assert_ne!(
            ConstraintKey::uniqueness_index("idx__a"),
            ConstraintKey::uniqueness_index("idx_\\_a")
        );
    }

    #[test]
    fn interior_underscores_stay_readable() {
        assert_eq!(
            ConstraintKey::uniqueness(["tenant_id", "email"]).as_str(),
            "uniqueness__email__tenant_id"
        );
        assert_eq!(
            ConstraintKey::uniqueness_index("index_users_on_email").as_str(),
            "uniqueness_index__index_users_on_email"
        );
    }

    #[test]
    fn kinds_are_separate_namespaces() {
        let index = ConstraintKey::uniqueness_index("field");
        let columns = ConstraintKey::uniqueness(["field"]);
        let belongs = ConstraintKey::belongs_to("field");
        assert_eq!(index.as_str(), "uniqueness_index__field");
        assert_ne!(index, columns);
        assert_ne!(columns, belongs);
    }

    #[test]
    fn empty_evidence_yields_bare_key() {
        let key = ConstraintKey::uniqueness(Vec::<String>::new());
        assert!(key.is_bare());
        assert_eq!(key.as_str(), "uniqueness");
        assert!(!ConstraintKey::belongs_to("company_id").is_bare());
    }

    #[test]
    fn tags_round_trip() {
        for kind in [KeyKind::UniquenessIndex, KeyKind::Uniqueness, KeyKind::BelongsTo] {
            assert_eq!(KeyKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(KeyKind::from_tag("unknown"), None);
    }
}
