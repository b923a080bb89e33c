use axum::{extract::State, Json};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{InsertResponse, ObjectIdString, PathObjectId, UpdateResponse},
};

use super::identity::AdminIdentity;

pub mod status {
    pub const PENDING: &str = "pending";
    pub const ACCEPTED: &str = "accepted";
}

#[derive(Clone)]
pub struct RiderCollection(pub Collection<RiderModel>);

impl std::ops::Deref for RiderCollection {
    type Target = Collection<RiderModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Rider application. Status is an open string: `apply` always writes
/// "pending", and the status update sets whatever the admin chose without
/// checking the prior state.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RiderModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub status: String,

    #[serde(flatten)]
    pub extra: bson::Document,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Rider {
    pub id: ObjectIdString,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    pub status: String,

    #[serde(flatten)]
    pub extra: bson::Document,
}

impl From<RiderModel> for Rider {
    fn from(rider: RiderModel) -> Self {
        Self {
            id: rider.id.into(),
            email: rider.email,
            status: rider.status,
            extra: rider.extra,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApplyRequest {
    pub email: Option<String>,

    #[serde(flatten)]
    pub extra: bson::Document,
}

impl From<ApplyRequest> for RiderModel {
    fn from(request: ApplyRequest) -> Self {
        // a caller-supplied status would collide with the forced one
        let mut extra = request.extra;
        extra.remove("status");

        Self {
            id: ObjectId::new(),
            email: request.email,
            status: status::PENDING.to_string(),
            extra,
        }
    }
}

pub async fn apply(
    State(riders): State<RiderCollection>,
    Json(request): Json<ApplyRequest>,
) -> Result<Json<InsertResponse>, Error> {
    let model = RiderModel::from(request);

    riders.insert_one(&model, None).await?;

    Ok(Json(InsertResponse::new(model.id)))
}

async fn list_by_status(riders: &RiderCollection, status: &str) -> Result<Vec<Rider>, Error> {
    let mut cursor = riders
        .find(
            bson::doc! {
                "status": status
            },
            None,
        )
        .await?;

    let mut result = vec![];

    while cursor.advance().await? {
        let rider = cursor.deserialize_current()?;

        result.push(rider.into());
    }

    Ok(result)
}

pub async fn list_pending(
    State(riders): State<RiderCollection>,
) -> Result<Json<Vec<Rider>>, Error> {
    list_by_status(&riders, status::PENDING).await.map(Json)
}

pub async fn list_active(
    _admin: AdminIdentity,
    State(riders): State<RiderCollection>,
) -> Result<Json<Vec<Rider>>, Error> {
    list_by_status(&riders, status::ACCEPTED).await.map(Json)
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct UpdateStatusRequest {
    pub status: String,
}

#[tracing::instrument(skip_all, fields(id = %id, status = %request.status))]
pub async fn update_status(
    State(riders): State<RiderCollection>,
    PathObjectId(id): PathObjectId,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<UpdateResponse>, Error> {
    let result = riders
        .update_one_by_id(
            id,
            bson::doc! {
                "$set": { "status": request.status }
            },
        )
        .await?;

    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use super::{status, ApplyRequest, RiderModel};

    #[test]
    fn test_apply_forces_pending_status() {
        let model = RiderModel::from(ApplyRequest {
            email: Some("rider@x.com".to_string()),
            extra: bson::doc! { "status": "accepted", "region": "dhaka" },
        });

        assert_eq!(model.status, status::PENDING);
        assert_eq!(model.email.as_deref(), Some("rider@x.com"));
        assert_eq!(model.extra.get_str("region").unwrap(), "dhaka");
        assert!(!model.extra.contains_key("status"));
    }
}
