//! Cache key derivation.
//!
//! A [`CacheKey`] is the SHA-256 digest of a canonical, type-tagged encoding of
//! a query's statement and parameters. The encoding never depends on the map
//! ordering of the JSON library, so keys are stable across builds and process
//! restarts.
//!
//! # Encoding
//!
//! Every value is written as a one-byte tag followed by its payload. Strings
//! and containers are length-prefixed with a big-endian `u64`, which makes the
//! boundary between statement and parameters (and between adjacent parameters)
//! unambiguous.
//!
//! | Tag | Value                                        |
//! |-----|----------------------------------------------|
//! | `n` | null                                         |
//! | `f` | false                                        |
//! | `t` | true                                         |
//! | `i` | signed integer (8 bytes)                     |
//! | `u` | unsigned integer above `i64::MAX` (8 bytes)  |
//! | `d` | float (IEEE-754 bits, 8 bytes)               |
//! | `s` | string                                       |
//! | `a` | array                                        |
//! | `o` | object, entries sorted by key bytes          |

use serde_json::{Map, Number, Value};
use sha2::{Digest, Sha256};
use std::fmt;

/// Domain separator so keys from other hashing schemes never coincide.
const KEY_DOMAIN: &[u8] = b"strata.query.v1";

/// Deterministic identifier for a query's cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Get the key as a lowercase hex string (64 characters).
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the cache key for a statement and its bound parameters.
pub fn derive_key(statement: &str, parameters: &[Value]) -> CacheKey {
    let mut buf = Vec::with_capacity(64 + statement.len());
    buf.extend_from_slice(KEY_DOMAIN);
    write_str(&mut buf, statement);
    write_len(&mut buf, parameters.len());
    for value in parameters {
        write_value(&mut buf, value);
    }

    let digest = Sha256::digest(&buf);
    CacheKey(hex::encode(digest))
}

/// Append the canonical encoding of `value` to `buf`.
fn write_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => buf.push(b'n'),
        Value::Bool(false) => buf.push(b'f'),
        Value::Bool(true) => buf.push(b't'),
        Value::Number(n) => write_number(buf, n),
        Value::String(s) => {
            buf.push(b's');
            write_str(buf, s);
        }
        Value::Array(items) => {
            buf.push(b'a');
            write_len(buf, items.len());
            for item in items {
                write_value(buf, item);
            }
        }
        Value::Object(map) => write_object(buf, map),
    }
}

fn write_number(buf: &mut Vec<u8>, n: &Number) {
    if let Some(i) = n.as_i64() {
        buf.push(b'i');
        buf.extend_from_slice(&i.to_be_bytes());
    } else if let Some(u) = n.as_u64() {
        buf.push(b'u');
        buf.extend_from_slice(&u.to_be_bytes());
    } else if let Some(f) = n.as_f64() {
        buf.push(b'd');
        // -0.0 and 0.0 compare equal, so they share a key.
        let f = if f == 0.0 { 0.0 } else { f };
        buf.extend_from_slice(&f.to_bits().to_be_bytes());
    } else {
        // Arbitrary-precision numbers: fall back to their textual form.
        buf.push(b's');
        write_str(buf, &n.to_string());
    }
}

fn write_object(buf: &mut Vec<u8>, map: &Map<String, Value>) {
    let mut entries: Vec<(&String, &Value)> = map.iter().collect();
    entries.sort_unstable_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    buf.push(b'o');
    write_len(buf, entries.len());
    for (key, value) in entries {
        write_str(buf, key);
        write_value(buf, value);
    }
}

fn write_str(buf: &mut Vec<u8>, s: &str) {
    write_len(buf, s.len());
    buf.extend_from_slice(s.as_bytes());
}

fn write_len(buf: &mut Vec<u8>, len: usize) {
    buf.extend_from_slice(&(len as u64).to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_key_is_stable() {
        let params = vec![json!(1), json!("alice")];
        let a = derive_key("SELECT * FROM users WHERE id = ? AND name = ?", &params);
        let b = derive_key("SELECT * FROM users WHERE id = ? AND name = ?", &params);
        assert_eq!(a, b);
        assert_eq!(a.as_str().len(), 64);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_number_and_string_do_not_collide() {
        let a = derive_key("SELECT ?", &[json!(1)]);
        let b = derive_key("SELECT ?", &[json!("1")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_integer_and_float_do_not_collide() {
        let a = derive_key("SELECT ?", &[json!(1)]);
        let b = derive_key("SELECT ?", &[json!(1.0)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parameter_order_matters() {
        let a = derive_key("SELECT ?, ?", &[json!(1), json!(2)]);
        let b = derive_key("SELECT ?, ?", &[json!(2), json!(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_statement_parameter_boundary_is_unambiguous() {
        let a = derive_key("SELECT a", &[json!("b")]);
        let b = derive_key("SELECT ab", &[]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_parameters_differ_from_null_parameter() {
        let a = derive_key("SELECT 1", &[]);
        let b = derive_key("SELECT 1", &[Value::Null]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_nested_object_field_order_is_canonical() {
        let a: Value = serde_json::from_str(r#"{"b": 2, "a": {"y": 1, "x": [1, 2]}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": [1, 2], "y": 1}, "b": 2}"#).unwrap();
        assert_eq!(
            derive_key("SELECT ?", &[a]),
            derive_key("SELECT ?", &[b])
        );
    }

    #[test]
    fn test_negative_zero_matches_zero() {
        assert_eq!(
            derive_key("SELECT ?", &[json!(0.0)]),
            derive_key("SELECT ?", &[json!(-0.0)])
        );
    }

    // Persisted entries are addressed by these digests. Any change to the
    // encoding orphans every entry already written to a tier.
    #[test]
    fn test_known_digest_for_scalar_parameter() {
        assert_eq!(
            derive_key("SELECT ?", &[json!(1)]).as_str(),
            "218e21ef8a563dcc4dab4290b20aede82b0f6f0718f079e3069f248befc73de4"
        );
    }

    #[test]
    fn test_known_digest_for_nested_object_parameter() {
        let params = [json!({"id": 7, "tags": ["a", null], "active": true})];
        assert_eq!(
            derive_key("SELECT * FROM users WHERE org = ?", &params).as_str(),
            "338d6f1eb5fc8a740ba9fbcaa2f0388667700ced5f49bc35bb2ba99578cf731e"
        );
    }

    #[test]
    fn test_known_digest_without_parameters() {
        assert_eq!(
            derive_key("SELECT 1", &[]).as_str(),
            "d4a623ceba1966e27ed51e76cad642ef2749ea5221cd64343206c9264b00f7ce"
        );
    }

    #[test]
    fn test_display_matches_as_str() {
        let key = derive_key("SELECT 1", &[]);
        assert_eq!(key.to_string(), key.as_str());
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    /// Strategy for small, arbitrarily nested JSON values.
    fn json_strategy() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|i| Value::from(i)),
            "[a-z0-9_]{0,8}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z_]{1,6}", inner, 0..4)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: derivation is a pure function of its inputs.
        #[test]
        fn prop_derivation_is_deterministic(
            statement in ".{0,40}",
            params in prop::collection::vec(json_strategy(), 0..5),
        ) {
            let cloned = params.clone();
            prop_assert_eq!(derive_key(&statement, &params), derive_key(&statement, &cloned));
        }

        /// Property: a numeric parameter never shares a key with its string form.
        #[test]
        fn prop_numeric_and_string_forms_differ(statement in ".{0,20}", n in any::<i64>()) {
            let numeric = derive_key(&statement, &[Value::from(n)]);
            let textual = derive_key(&statement, &[Value::String(n.to_string())]);
            prop_assert_ne!(numeric, textual);
        }

        /// Property: swapping two distinct parameters changes the key.
        #[test]
        fn prop_swapping_parameters_changes_key(
            statement in ".{0,20}",
            a in json_strategy(),
            b in json_strategy(),
        ) {
            prop_assume!(a != b);
            let forward = derive_key(&statement, &[a.clone(), b.clone()]);
            let backward = derive_key(&statement, &[b, a]);
            prop_assert_ne!(forward, backward);
        }
    }
}
