use axum::{
    extract::{Path, Query, State},
    Json,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{FormattedDateTime, InsertResponse, PathObjectId, UpdateResponse},
};

use super::identity::{role_of, VerifiedIdentity};

#[derive(Clone)]
pub struct UserCollection(pub Collection<UserModel>);

impl std::ops::Deref for UserCollection {
    type Target = Collection<UserModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct UserModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    pub email: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,

    pub created_at: bson::DateTime,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    /// Parses the closed role set; anything else is rejected before it can
    /// reach the database.
    pub fn parse(role: &str) -> Result<Self, Error> {
        match role {
            "admin" => Ok(Self::Admin),
            "user" => Ok(Self::User),
            _ => Err(Error::InvalidInput("invalid role")),
        }
    }
}

#[derive(Validate, Serialize, Deserialize, Debug, Clone)]
pub struct CreateUserRequest {
    #[validate(email)]
    pub email: String,

    pub role: Option<Role>,

    #[serde(rename = "photoURL")]
    pub photo_url: Option<String>,

    pub created_at: Option<FormattedDateTime>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(untagged)]
pub enum CreateUserResponse {
    AlreadyExists {
        message: String,
        inserted: String,
    },
    Inserted(InsertResponse),
}

/// Idempotent upsert-by-email: re-posting an existing email reports
/// `inserted: "false"` instead of duplicating the document.
pub async fn create(
    State(users): State<UserCollection>,
    Json(request): Json<CreateUserRequest>,
) -> Result<Json<CreateUserResponse>, Error> {
    request.validate()?;

    let existing = users
        .find_one(
            bson::doc! {
                "email": &request.email
            },
            None,
        )
        .await?;

    if existing.is_some() {
        return Ok(Json(CreateUserResponse::AlreadyExists {
            message: "User already exist".to_string(),
            inserted: "false".to_string(),
        }));
    }

    let model = UserModel {
        id: ObjectId::new(),
        email: request.email,
        role: request.role,
        photo_url: request.photo_url,
        created_at: request
            .created_at
            .map(Into::into)
            .unwrap_or_else(|| OffsetDateTime::now_utc().into()),
    };
    users.insert_one(&model, None).await?;

    Ok(Json(CreateUserResponse::Inserted(InsertResponse::new(
        model.id,
    ))))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SearchQuery {
    pub email: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UserSearchItem {
    pub email: String,
    // absent role fields fall back to least privilege
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "photoURL", skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
}

/// Case-insensitive substring match on email, capped at 10 results and
/// projected down to the public profile fields. Always an array.
pub async fn search(
    _identity: VerifiedIdentity,
    State(users): State<UserCollection>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<UserSearchItem>>, Error> {
    let pattern = query.email.unwrap_or_default();

    let options = mongodb::options::FindOptions::builder()
        .sort(bson::doc! { "role": 1 })
        .projection(bson::doc! { "email": 1, "role": 1, "photoURL": 1 })
        .limit(10)
        .build();

    let mut cursor = users
        .clone_with_type::<UserSearchItem>()
        .find(
            bson::doc! {
                "email": { "$regex": pattern, "$options": "i" }
            },
            options,
        )
        .await?;

    let mut result = vec![];

    while cursor.advance().await? {
        result.push(cursor.deserialize_current()?);
    }

    Ok(Json(result))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RoleResponse {
    pub role: Role,
}

pub async fn role_lookup(
    _identity: VerifiedIdentity,
    State(users): State<UserCollection>,
    Path(email): Path<String>,
) -> Result<Json<RoleResponse>, Error> {
    let role = role_of(&email, &users).await?;

    Ok(Json(RoleResponse { role }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateRoleRequest {
    pub role: String,
}

#[tracing::instrument(skip_all, fields(id = %id))]
pub async fn update_role(
    State(users): State<UserCollection>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<UpdateResponse>, Error> {
    let role = Role::parse(&request.role)?;

    let result = users
        .update_one_by_id(
            id,
            bson::doc! {
                "$set": { "role": bson::to_bson(&role)? }
            },
        )
        .await?;

    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use axum::Json;
    use bson::oid::ObjectId;

    use crate::{api::tests::detached_state, error::Error, util::PathObjectId};

    use super::{CreateUserRequest, Role, UpdateRoleRequest};

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("admin").unwrap(), Role::Admin);
        assert_eq!(Role::parse("user").unwrap(), Role::User);

        for role in ["superadmin", "Admin", "", "root"] {
            assert_matches!(Role::parse(role), Err(Error::InvalidInput(_)));
        }
    }

    #[test]
    fn test_role_serde() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
        assert_eq!(serde_json::from_str::<Role>("\"user\"").unwrap(), Role::User);
        assert!(serde_json::from_str::<Role>("\"root\"").is_err());
    }

    #[tokio::test]
    async fn test_update_role_rejects_unknown_role() {
        let state = detached_state().await;

        // rejected before the update reaches the collection
        let error = super::update_role(
            state.users(),
            PathObjectId(ObjectId::new()),
            Json(UpdateRoleRequest {
                role: "superadmin".to_string(),
            }),
        )
        .await
        .unwrap_err();

        assert_matches!(error, Error::InvalidInput("invalid role"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_email() {
        let state = detached_state().await;

        let error = super::create(
            state.users(),
            Json(CreateUserRequest {
                email: "not-an-email".to_string(),
                role: None,
                photo_url: None,
                created_at: None,
            }),
        )
        .await
        .unwrap_err();

        assert_matches!(error, Error::ValidationError(_));
    }
}
