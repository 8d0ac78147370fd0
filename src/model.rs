//! The user record and the rules for writing to it.
//!
//! A record is an open set of caller fields plus three server-owned ones:
//! the store-assigned `_id` and the `createdAt` / `updatedAt` timestamps.
//! Callers never write the server-owned fields; a payload that mentions them
//! has those keys dropped before it reaches the store.

use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

pub const ID_FIELD: &str = "_id";
pub const CREATED_AT_FIELD: &str = "createdAt";
pub const UPDATED_AT_FIELD: &str = "updatedAt";

const SERVER_OWNED: [&str; 3] = [ID_FIELD, CREATED_AT_FIELD, UPDATED_AT_FIELD];

/// Why a request payload could not become a set of [`Fields`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PayloadError {
    #[error("El cuerpo debe ser un objeto JSON")]
    NotAnObject,

    #[error("Nombre de campo inválido: {0:?}")]
    InvalidFieldName(String),
}

/// Caller-supplied fields of a record, keyed by field name.
///
/// Values are arbitrary JSON. Names are checked so the document store never
/// reads them as operators (`$set`) or nested paths (`a.b`).
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Fields(Map<String, Value>);

impl Fields {
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Accepts any JSON object. Server-owned keys are dropped.
    pub fn from_json(value: Value) -> Result<Self, PayloadError> {
        match value {
            Value::Object(map) => Self::from_entries(map),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    /// Builds fields from decoded form pairs. Every value is a string; a
    /// repeated key keeps its last value.
    pub fn from_pairs<I>(pairs: I) -> Result<Self, PayloadError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self::from_entries(pairs.into_iter().map(|(k, v)| (k, Value::String(v))))
    }

    fn from_entries<I>(entries: I) -> Result<Self, PayloadError>
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        let mut map = Map::new();
        for (name, value) in entries {
            if SERVER_OWNED.contains(&name.as_str()) {
                continue;
            }
            if !is_valid_name(&name) {
                return Err(PayloadError::InvalidFieldName(name));
            }
            map.insert(name, value);
        }
        Ok(Self(map))
    }

    /// Wraps fields read back from the store. No validation: whatever the
    /// store holds is reported as-is.
    pub(crate) fn from_stored(map: Map<String, Value>) -> Self {
        Self(map)
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// New value replaces old; names absent from `patch` are untouched.
    pub fn merge(&mut self, patch: Fields) {
        for (name, value) in patch.0 {
            self.0.insert(name, value);
        }
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && !name.starts_with('$') && !name.contains('.')
}

/// A stored user record.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct User {
    #[serde(rename = "_id")]
    pub id: String,

    #[serde(flatten)]
    pub fields: Fields,

    /// Absent on documents written before timestamps were introduced.
    #[serde(rename = "createdAt", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(rename = "updatedAt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Applies a partial update at time `now`.
    pub fn apply(&mut self, patch: Fields, now: DateTime<Utc>) {
        self.fields.merge(patch);
        self.updated_at = Some(next_modified(self.updated_at, now));
    }
}

/// A record that has not been inserted yet.
#[derive(Clone, Debug, PartialEq)]
pub struct NewUser {
    pub fields: Fields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl NewUser {
    pub fn new(fields: Fields, now: DateTime<Utc>) -> Self {
        Self { fields, created_at: now, updated_at: now }
    }

    pub fn into_user(self, id: String) -> User {
        User {
            id,
            fields: self.fields,
            created_at: Some(self.created_at),
            updated_at: Some(self.updated_at),
        }
    }
}

/// The `updatedAt` value after a write at `now`.
///
/// Always strictly after `previous`, even when the clock has not advanced
/// past it at millisecond resolution.
pub fn next_modified(previous: Option<DateTime<Utc>>, now: DateTime<Utc>) -> DateTime<Utc> {
    match previous {
        Some(prev) if now <= prev => prev + TimeDelta::milliseconds(1),
        _ => now,
    }
}

/// Current time truncated to milliseconds, the resolution the document store
/// keeps.
pub fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn payload_must_be_an_object() {
        assert_eq!(Fields::from_json(json!([1, 2])), Err(PayloadError::NotAnObject));
        assert_eq!(Fields::from_json(json!("Ana")), Err(PayloadError::NotAnObject));
        assert_eq!(Fields::from_json(Value::Null), Err(PayloadError::NotAnObject));
    }

    #[test]
    fn server_owned_keys_are_dropped() {
        let fields = Fields::from_json(json!({
            "_id": "abc",
            "createdAt": "yesterday",
            "updatedAt": "today",
            "name": "Ana",
        }))
        .unwrap();

        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("name"), Some(&json!("Ana")));
    }

    #[test]
    fn operator_and_dotted_names_are_rejected() {
        for bad in ["$set", "a.b", ""] {
            let mut map = Map::new();
            map.insert(bad.to_owned(), json!(1));
            assert_eq!(
                Fields::from_json(Value::Object(map)),
                Err(PayloadError::InvalidFieldName(bad.to_owned())),
            );
        }
    }

    #[test]
    fn form_pairs_become_strings_last_wins() {
        let fields = Fields::from_pairs(vec![
            ("name".to_owned(), "Ana".to_owned()),
            ("age".to_owned(), "30".to_owned()),
            ("name".to_owned(), "Ana Maria".to_owned()),
        ])
        .unwrap();

        assert_eq!(fields.get("name"), Some(&json!("Ana Maria")));
        assert_eq!(fields.get("age"), Some(&json!("30")));
    }

    #[test]
    fn apply_touches_only_named_fields() {
        let fields = Fields::from_json(json!({"name": "Ana", "city": "Lima", "tags": [1, 2]})).unwrap();
        let mut user = NewUser::new(fields, at(1_000)).into_user("u1".into());

        let patch = Fields::from_json(json!({"name": "Ana Maria", "age": 31})).unwrap();
        user.apply(patch, at(2_000));

        assert_eq!(user.fields.get("name"), Some(&json!("Ana Maria")));
        assert_eq!(user.fields.get("age"), Some(&json!(31)));
        assert_eq!(user.fields.get("city"), Some(&json!("Lima")));
        assert_eq!(user.fields.get("tags"), Some(&json!([1, 2])));
        assert_eq!(user.id, "u1");
        assert_eq!(user.created_at, Some(at(1_000)));
        assert_eq!(user.updated_at, Some(at(2_000)));
    }

    #[test]
    fn updated_at_strictly_increases_when_clock_stalls() {
        assert_eq!(next_modified(Some(at(5_000)), at(5_000)), at(5_001));
        assert_eq!(next_modified(Some(at(5_000)), at(4_000)), at(5_001));
        assert_eq!(next_modified(Some(at(5_000)), at(6_000)), at(6_000));
        assert_eq!(next_modified(None, at(6_000)), at(6_000));
    }

    #[test]
    fn wire_shape() {
        let fields = Fields::from_json(json!({"name": "Ana"})).unwrap();
        let user = NewUser::new(fields, at(0)).into_user("65f0c0ffee0000000000beef".into());

        assert_eq!(
            serde_json::to_value(&user).unwrap(),
            json!({
                "_id": "65f0c0ffee0000000000beef",
                "name": "Ana",
                "createdAt": "1970-01-01T00:00:00Z",
                "updatedAt": "1970-01-01T00:00:00Z",
            }),
        );
    }

    #[test]
    fn legacy_record_without_timestamps_omits_them() {
        let user = User {
            id: "x".into(),
            fields: Fields::new(),
            created_at: None,
            updated_at: None,
        };
        assert_eq!(serde_json::to_value(&user).unwrap(), json!({"_id": "x"}));
    }
}
