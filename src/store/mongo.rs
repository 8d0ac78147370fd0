//! MongoDB-backed store.
//!
//! Records live in the `usuarios` collection of the database named by the
//! connection string. Field values travel as relaxed extended JSON, so a
//! value read back renders the way MongoDB tooling shows it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use mongodb::{
    Client, Collection, Database,
    bson::{self, Bson, DateTime as BsonDateTime, Document, doc},
    options::ReturnDocument,
};
use serde_json::Map;

use super::{StoreError, UserStore, parse_id};
use crate::model::{CREATED_AT_FIELD, Fields, ID_FIELD, NewUser, UPDATED_AT_FIELD, User};

const COLLECTION: &str = "usuarios";

/// Database used when the connection string does not name one. Matches the
/// driver's own default.
const DEFAULT_DATABASE: &str = "test";

pub struct MongoStore {
    db: Database,
    users: Collection<Document>,
}

impl MongoStore {
    /// Builds a client from `uri`. The driver connects lazily; call
    /// [`UserStore::ping`] to find out whether the server is reachable.
    pub async fn connect(uri: &str) -> Result<Self, StoreError> {
        let client = Client::with_uri_str(uri).await?;
        let db = client
            .default_database()
            .unwrap_or_else(|| client.database(DEFAULT_DATABASE));
        Ok(Self::new(db))
    }

    pub fn new(db: Database) -> Self {
        let users = db.collection(COLLECTION);
        Self { db, users }
    }

    pub fn database_name(&self) -> &str {
        self.db.name()
    }
}

#[async_trait]
impl UserStore for MongoStore {
    async fn insert(&self, user: NewUser) -> Result<User, StoreError> {
        let mut doc = fields_to_document(&user.fields)?;
        doc.insert(CREATED_AT_FIELD, to_bson_datetime(user.created_at));
        doc.insert(UPDATED_AT_FIELD, to_bson_datetime(user.updated_at));

        let result = self.users.insert_one(doc).await?;
        match result.inserted_id {
            Bson::ObjectId(oid) => Ok(user.into_user(oid.to_hex())),
            other => Err(StoreError::Corrupt(format!(
                "inserted id has type {:?}",
                other.element_type()
            ))),
        }
    }

    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let docs: Vec<Document> = self.users.find(doc! {}).await?.try_collect().await?;
        docs.into_iter().map(user_from_document).collect()
    }

    async fn find(&self, id: &str) -> Result<Option<User>, StoreError> {
        self.users
            .find_one(id_filter(id)?)
            .await?
            .map(user_from_document)
            .transpose()
    }

    async fn update(
        &self,
        id: &str,
        patch: Fields,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, StoreError> {
        self.users
            .find_one_and_update(id_filter(id)?, update_pipeline(&patch, now)?)
            .return_document(ReturnDocument::After)
            .await?
            .map(user_from_document)
            .transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.users.delete_one(id_filter(id)?).await?.deleted_count > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

fn id_filter(id: &str) -> Result<Document, StoreError> {
    let oid = parse_id(id)?;
    Ok(doc! { "_id": oid })
}

fn to_bson_datetime(at: DateTime<Utc>) -> BsonDateTime {
    BsonDateTime::from_millis(at.timestamp_millis())
}

fn fields_to_document(fields: &Fields) -> Result<Document, StoreError> {
    let mut doc = Document::new();
    for (name, value) in fields.iter() {
        doc.insert(name.clone(), bson::to_bson(value)?);
    }
    Ok(doc)
}

/// One-stage aggregation update.
///
/// Values are wrapped in `$literal` so strings such as `"$name"` are stored
/// verbatim instead of being read as field paths. `updatedAt` becomes
/// `max(now, updatedAt + 1ms)` when the stored value is a date. Anything else
/// (missing, or a legacy string or number) would make `$add` yield null or
/// fail the whole update, so the `$cond` substitutes null and `$max` falls
/// back to `now`.
fn update_pipeline(patch: &Fields, now: DateTime<Utc>) -> Result<Vec<Document>, StoreError> {
    let mut set = Document::new();
    for (name, value) in patch.iter() {
        set.insert(name.clone(), doc! { "$literal": bson::to_bson(value)? });
    }

    let previous = format!("${UPDATED_AT_FIELD}");
    let bumped = doc! {
        "$cond": [
            { "$eq": [{ "$type": previous.as_str() }, "date"] },
            { "$add": [previous.as_str(), 1_i64] },
            Bson::Null,
        ]
    };
    set.insert(
        UPDATED_AT_FIELD,
        doc! { "$max": [Bson::DateTime(to_bson_datetime(now)), Bson::Document(bumped)] },
    );

    Ok(vec![doc! { "$set": set }])
}

fn user_from_document(mut doc: Document) -> Result<User, StoreError> {
    let id = match doc.remove(ID_FIELD) {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(id)) => id,
        Some(other) => {
            return Err(StoreError::Corrupt(format!(
                "_id has type {:?}",
                other.element_type()
            )));
        }
        None => return Err(StoreError::Corrupt("document without _id".to_owned())),
    };

    let created_at = take_timestamp(&mut doc, CREATED_AT_FIELD);
    let updated_at = take_timestamp(&mut doc, UPDATED_AT_FIELD);

    let fields = doc
        .into_iter()
        .map(|(name, value)| (name, value.into_relaxed_extjson()))
        .collect::<Map<_, _>>();

    Ok(User {
        id,
        fields: Fields::from_stored(fields),
        created_at,
        updated_at,
    })
}

/// Removes a timestamp field from `doc`. Anything that is not a BSON date is
/// put back and reported as an ordinary field.
fn take_timestamp(doc: &mut Document, key: &str) -> Option<DateTime<Utc>> {
    match doc.remove(key)? {
        Bson::DateTime(at) => DateTime::from_timestamp_millis(at.timestamp_millis()),
        other => {
            doc.insert(key, other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::oid::ObjectId;
    use serde_json::json;

    fn at(millis: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(millis).unwrap()
    }

    #[test]
    fn malformed_ids_are_rejected() {
        assert!(matches!(id_filter("not-an-object-id"), Err(StoreError::InvalidId(_))));
        assert!(matches!(id_filter(""), Err(StoreError::InvalidId(_))));

        let oid = ObjectId::new();
        assert_eq!(id_filter(&oid.to_hex()).unwrap(), doc! { "_id": oid });
    }

    #[test]
    fn document_becomes_user() {
        let oid = ObjectId::new();
        let doc = doc! {
            "_id": oid,
            "name": "Ana",
            "age": 31,
            "tags": ["a", "b"],
            "createdAt": BsonDateTime::from_millis(1_000),
            "updatedAt": BsonDateTime::from_millis(2_000),
        };

        let user = user_from_document(doc).unwrap();

        assert_eq!(user.id, oid.to_hex());
        assert_eq!(user.fields.get("name"), Some(&json!("Ana")));
        assert_eq!(user.fields.get("age"), Some(&json!(31)));
        assert_eq!(user.fields.get("tags"), Some(&json!(["a", "b"])));
        assert_eq!(user.fields.len(), 3);
        assert_eq!(user.created_at, Some(at(1_000)));
        assert_eq!(user.updated_at, Some(at(2_000)));
    }

    #[test]
    fn legacy_document_without_timestamps() {
        let user = user_from_document(doc! { "_id": ObjectId::new(), "name": "Ana" }).unwrap();
        assert_eq!(user.created_at, None);
        assert_eq!(user.updated_at, None);
    }

    #[test]
    fn non_date_timestamp_stays_a_field() {
        let user = user_from_document(doc! { "_id": ObjectId::new(), "createdAt": "ayer" }).unwrap();
        assert_eq!(user.created_at, None);
        assert_eq!(user.fields.get("createdAt"), Some(&json!("ayer")));
    }

    #[test]
    fn document_without_id_is_corrupt() {
        let err = user_from_document(doc! { "name": "Ana" }).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }

    #[test]
    fn update_literals_every_value() {
        let patch = Fields::from_json(json!({"name": "$name"})).unwrap();
        let pipeline = update_pipeline(&patch, at(5_000)).unwrap();

        assert_eq!(pipeline.len(), 1);
        let set = pipeline[0].get_document("$set").unwrap();
        assert_eq!(
            set.get_document("name").unwrap(),
            &doc! { "$literal": "$name" },
        );
        assert!(set.get_document("updatedAt").unwrap().contains_key("$max"));
        assert!(!set.contains_key("createdAt"));
    }

    #[test]
    fn update_bumps_only_date_timestamps() {
        let pipeline = update_pipeline(&Fields::new(), at(5_000)).unwrap();
        let set = pipeline[0].get_document("$set").unwrap();
        let max = set.get_document("updatedAt").unwrap().get_array("$max").unwrap();

        assert_eq!(max[0], Bson::DateTime(BsonDateTime::from_millis(5_000)));
        let guarded = max[1].as_document().unwrap().get_array("$cond").unwrap();
        assert_eq!(
            guarded[0],
            Bson::Document(doc! { "$eq": [{ "$type": "$updatedAt" }, "date"] }),
        );
        assert_eq!(guarded[1], Bson::Document(doc! { "$add": ["$updatedAt", 1_i64] }));
        assert_eq!(guarded[2], Bson::Null);
    }
}
