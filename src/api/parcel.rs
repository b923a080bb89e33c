use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
    error::Error,
    mongo_ext::Collection,
    util::{DeleteResponse, FormattedDateTime, InsertResponse, ObjectIdString, PathObjectId},
};

use super::identity::VerifiedIdentity;

#[derive(Clone)]
pub struct ParcelCollection(pub Collection<ParcelModel>);

impl std::ops::Deref for ParcelCollection {
    type Target = Collection<ParcelModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Stored parcel. The core fields are typed; whatever else the sender posted
/// rides along in `extra` untouched.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ParcelModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(rename = "senderEmail", skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentStatus>,

    #[serde(rename = "transactionId", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: bson::DateTime,

    #[serde(flatten)]
    pub extra: bson::Document,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Parcel {
    pub id: ObjectIdString,

    #[serde(rename = "senderEmail", skip_serializing_if = "Option::is_none")]
    pub sender_email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentStatus>,

    #[serde(rename = "transactionId", skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    #[serde(rename = "createdAt")]
    pub created_at: FormattedDateTime,

    #[serde(flatten)]
    pub extra: bson::Document,
}

impl From<ParcelModel> for Parcel {
    fn from(parcel: ParcelModel) -> Self {
        Self {
            id: parcel.id.into(),
            sender_email: parcel.sender_email,
            payment: parcel.payment,
            transaction_id: parcel.transaction_id,
            created_at: parcel.created_at.into(),
            extra: parcel.extra,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListQuery {
    pub email: Option<String>,
}

/// Parcels sorted newest first, optionally narrowed to one sender.
pub async fn list(
    _identity: VerifiedIdentity,
    State(parcels): State<ParcelCollection>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Parcel>>, Error> {
    let mut filter = bson::Document::new();

    if let Some(email) = query.email {
        filter.insert("senderEmail", email);
    }

    let options = mongodb::options::FindOptions::builder()
        .sort(bson::doc! { "createdAt": -1 })
        .build();

    let mut cursor = parcels.find(filter, options).await?;

    let mut result = vec![];

    while cursor.advance().await? {
        let parcel = cursor.deserialize_current()?;

        result.push(parcel.into());
    }

    Ok(Json(result))
}

/// Absent parcels respond with a null body rather than 404.
pub async fn show(
    _identity: VerifiedIdentity,
    State(parcels): State<ParcelCollection>,
    PathObjectId(parcel_id): PathObjectId,
) -> Result<Json<Option<Parcel>>, Error> {
    let parcel = parcels.find_one_by_id(parcel_id).await?;

    Ok(Json(parcel.map(Into::into)))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateRequest {
    #[serde(rename = "senderEmail")]
    pub sender_email: Option<String>,

    #[serde(flatten)]
    pub extra: bson::Document,
}

pub async fn create(
    State(parcels): State<ParcelCollection>,
    Json(request): Json<CreateRequest>,
) -> Result<(StatusCode, Json<InsertResponse>), Error> {
    // the server owns these fields, whatever the caller posted
    let mut extra = request.extra;
    extra.remove("createdAt");
    extra.remove("payment");
    extra.remove("transactionId");

    let model = ParcelModel {
        id: ObjectId::new(),
        sender_email: request.sender_email,
        payment: None,
        transaction_id: None,
        created_at: OffsetDateTime::now_utc().into(),
        extra,
    };

    tracing::debug!("creating parcel {:?}", model.id);

    match parcels.insert_one(&model, None).await {
        Ok(_) => Ok((StatusCode::CREATED, Json(InsertResponse::new(model.id)))),
        Err(error) => {
            tracing::error!("parcel insert failed: {}", error);
            Err(Error::CustomStr(
                StatusCode::NOT_IMPLEMENTED,
                "Failed to create parcel",
            ))
        }
    }
}

pub async fn delete(
    State(parcels): State<ParcelCollection>,
    PathObjectId(parcel_id): PathObjectId,
) -> Result<Json<DeleteResponse>, Error> {
    let result = parcels.delete_one_by_id(parcel_id).await?;

    Ok(Json(result.into()))
}

#[cfg(test)]
mod tests {
    use bson::oid::ObjectId;
    use time::OffsetDateTime;

    use super::{ParcelModel, PaymentStatus};

    fn model() -> ParcelModel {
        ParcelModel {
            id: ObjectId::new(),
            sender_email: Some("a@x.com".to_string()),
            payment: None,
            transaction_id: None,
            created_at: OffsetDateTime::now_utc().into(),
            extra: bson::doc! { "weight": 2, "region": "dhaka" },
        }
    }

    #[test]
    fn test_new_parcel_has_no_payment_field() {
        let document = bson::to_document(&model()).unwrap();

        assert!(document.contains_key("createdAt"));
        assert!(document.contains_key("senderEmail"));
        assert!(!document.contains_key("payment"));
        assert!(!document.contains_key("transactionId"));
        // caller payload rides along at the top level
        assert_eq!(document.get_i32("weight").unwrap(), 2);
    }

    #[test]
    fn test_payment_status_serde() {
        assert_eq!(
            serde_json::to_string(&PaymentStatus::Paid).unwrap(),
            "\"paid\""
        );
        assert_eq!(
            serde_json::from_str::<PaymentStatus>("\"unpaid\"").unwrap(),
            PaymentStatus::Unpaid
        );
    }

    #[test]
    fn test_model_roundtrip_through_bson() {
        let model = model();
        let document = bson::to_document(&model).unwrap();
        let back: ParcelModel = bson::from_document(document).unwrap();

        assert_eq!(back.id, model.id);
        assert_eq!(back.sender_email, model.sender_email);
        assert!(back.payment.is_none());
        assert_eq!(back.extra.get_str("region").unwrap(), "dhaka");
    }
}
