use std::str::FromStr;

use axum::{extract::FromRequestParts, http::request::Parts, RequestPartsExt};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::Error;

#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct ObjectIdString(#[serde(with = "object_id_string")] pub ObjectId);

impl From<ObjectId> for ObjectIdString {
    fn from(value: ObjectId) -> Self {
        Self(value)
    }
}

impl From<ObjectIdString> for ObjectId {
    fn from(value: ObjectIdString) -> Self {
        value.0
    }
}

impl std::ops::Deref for ObjectIdString {
    type Target = ObjectId;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::cmp::PartialEq for ObjectIdString {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl std::cmp::Eq for ObjectIdString {}

impl std::cmp::PartialEq<ObjectId> for ObjectIdString {
    fn eq(&self, other: &ObjectId) -> bool {
        self.0 == *other
    }
}

impl From<ObjectIdString> for bson::Bson {
    fn from(value: ObjectIdString) -> Self {
        value.0.into()
    }
}

mod object_id_string {
    use bson::oid::ObjectId;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(id: &ObjectId, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<ObjectId, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct FormattedDateTime(#[serde(with = "time::serde::rfc3339")] pub OffsetDateTime);

impl From<bson::DateTime> for FormattedDateTime {
    fn from(value: bson::DateTime) -> Self {
        Self(value.into())
    }
}

impl From<OffsetDateTime> for FormattedDateTime {
    fn from(value: OffsetDateTime) -> Self {
        Self(value)
    }
}

impl From<FormattedDateTime> for bson::DateTime {
    fn from(value: FormattedDateTime) -> Self {
        value.0.into()
    }
}

/// Path segment that must be a valid ObjectId, rejecting with 404 otherwise.
#[derive(Debug, Clone, Copy)]
pub struct PathObjectId(pub ObjectId);

#[axum::async_trait]
impl<S> FromRequestParts<S> for PathObjectId
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let axum::extract::Path(id) = parts.extract::<axum::extract::Path<String>>().await?;

        ObjectId::from_str(&id).map(Self).map_err(|_| Error::NoResource)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct InsertResponse {
    pub acknowledged: bool,
    #[serde(rename = "insertedId")]
    pub inserted_id: ObjectIdString,
}

impl InsertResponse {
    pub fn new(id: ObjectId) -> Self {
        Self {
            acknowledged: true,
            inserted_id: id.into(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateResponse {
    pub acknowledged: bool,
    #[serde(rename = "matchedCount")]
    pub matched_count: u64,
    #[serde(rename = "modifiedCount")]
    pub modified_count: u64,
}

impl From<mongodb::results::UpdateResult> for UpdateResponse {
    fn from(value: mongodb::results::UpdateResult) -> Self {
        Self {
            acknowledged: true,
            matched_count: value.matched_count,
            modified_count: value.modified_count,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DeleteResponse {
    pub acknowledged: bool,
    #[serde(rename = "deletedCount")]
    pub deleted_count: u64,
}

impl From<mongodb::results::DeleteResult> for DeleteResponse {
    fn from(value: mongodb::results::DeleteResult) -> Self {
        Self {
            acknowledged: true,
            deleted_count: value.deleted_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::extract::FromRequestParts;
    use bson::oid::ObjectId;

    use crate::error::Error;

    use super::{ObjectIdString, PathObjectId};

    #[test]
    fn test_object_id_string_roundtrip() {
        let id = ObjectId::new();
        let json = serde_json::to_string(&ObjectIdString(id)).unwrap();

        assert_eq!(json, format!("\"{}\"", id));

        let back: ObjectIdString = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[tokio::test]
    async fn test_path_object_id_rejects_missing_param() {
        let (mut parts, _) = axum::http::request::Request::get("http://localhost")
            .body(())
            .unwrap()
            .into_parts();

        let error = PathObjectId::from_request_parts(&mut parts, &())
            .await
            .unwrap_err();

        assert_matches!(error, Error::NoResource);
    }

    #[test]
    fn test_garbage_object_id_does_not_parse() {
        assert!(ObjectId::parse_str("not-an-object-id").is_err());
    }
}
