use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use bson::oid::ObjectId;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use serde::{Deserialize, Serialize};
use tap::TapFallible;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::{
    error::{Error, ForbiddenReason},
    mongo_ext::Collection,
    util::{FormattedDateTime, InsertResponse, ObjectIdString, UpdateResponse},
};

use super::{
    gateway::{IntentRequest, PaymentGateway},
    identity::VerifiedIdentity,
    parcel::ParcelCollection,
};

pub const CURRENCY: &str = "bdt";
pub const PAYMENT_METHOD_TYPES: &[&str] = &["card"];

#[derive(Clone)]
pub struct PaymentCollection(pub Collection<PaymentModel>);

impl std::ops::Deref for PaymentCollection {
    type Target = Collection<PaymentModel>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Append-only ledger entry; never mutated or deleted.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentModel {
    #[serde(rename = "_id")]
    pub id: ObjectId,

    #[serde(rename = "parcelId")]
    pub parcel_id: ObjectId,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "transactionId")]
    pub transaction_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,

    pub date: bson::DateTime,

    #[serde(rename = "dateString")]
    pub date_string: String,

    #[serde(flatten)]
    pub extra: bson::Document,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Payment {
    pub id: ObjectIdString,

    #[serde(rename = "parcelId")]
    pub parcel_id: ObjectIdString,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(rename = "transactionId")]
    pub transaction_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<Decimal>,

    pub date: FormattedDateTime,

    #[serde(flatten)]
    pub extra: bson::Document,
}

impl From<PaymentModel> for Payment {
    fn from(payment: PaymentModel) -> Self {
        Self {
            id: payment.id.into(),
            parcel_id: payment.parcel_id.into(),
            email: payment.email,
            transaction_id: payment.transaction_id,
            amount: payment.amount,
            date: payment.date.into(),
            extra: payment.extra,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateIntentRequest {
    pub amount: Decimal,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CreateIntentResponse {
    #[serde(rename = "clientSecret")]
    pub client_secret: String,
}

/// Major currency units in, minor units (x100, truncated) out to the gateway.
pub fn to_minor_units(amount: Decimal) -> Result<i64, Error> {
    (amount * Decimal::from(100))
        .trunc()
        .to_i64()
        .ok_or(Error::InvalidInput("invalid amount"))
}

pub async fn create_intent(
    State(gateway): State<Arc<dyn PaymentGateway>>,
    Json(request): Json<CreateIntentRequest>,
) -> Result<Json<CreateIntentResponse>, Error> {
    let amount = to_minor_units(request.amount)?;

    let intent = gateway
        .create_intent(IntentRequest {
            amount,
            currency: CURRENCY,
            payment_method_types: PAYMENT_METHOD_TYPES,
        })
        .await?;

    Ok(Json(CreateIntentResponse {
        client_secret: intent.client_secret,
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecordRequest {
    #[serde(rename = "parcelId")]
    pub parcel_id: String,

    pub email: Option<String>,

    #[serde(rename = "transactionId")]
    pub transaction_id: String,

    pub amount: Option<Decimal>,

    #[serde(flatten)]
    pub extra: bson::Document,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct RecordResponse {
    #[serde(rename = "paymentResult")]
    pub payment_result: InsertResponse,

    #[serde(rename = "updateResult")]
    pub update_result: UpdateResponse,
}

/// Writes the ledger entry, then flips the referenced parcel to paid. The two
/// writes are independent; a failure in between leaves the parcel unpaid with
/// the payment already recorded.
#[tracing::instrument(skip_all, fields(parcel_id = %request.parcel_id))]
pub async fn record(
    State(payments): State<PaymentCollection>,
    State(parcels): State<ParcelCollection>,
    Json(request): Json<RecordRequest>,
) -> Result<Json<RecordResponse>, Error> {
    let parcel_id = ObjectId::from_str(&request.parcel_id)
        .map_err(|_| Error::InvalidInput("invalid parcelId"))
        .tap_err(|_| tracing::debug!("payment referenced a malformed parcel id"))?;

    let now = OffsetDateTime::now_utc();

    // the ledger date is server-stamped, whatever the caller posted
    let mut extra = request.extra;
    extra.remove("date");
    extra.remove("dateString");

    let model = PaymentModel {
        id: ObjectId::new(),
        parcel_id,
        email: request.email,
        transaction_id: request.transaction_id,
        amount: request.amount,
        date: now.into(),
        date_string: now.format(&Rfc3339).unwrap_or_default(),
        extra,
    };
    payments.insert_one(&model, None).await?;

    let update = parcels
        .update_one_by_id(
            parcel_id,
            bson::doc! {
                "$set": {
                    "payment": "paid",
                    "transactionId": &model.transaction_id,
                }
            },
        )
        .await?;

    Ok(Json(RecordResponse {
        payment_result: InsertResponse::new(model.id),
        update_result: update.into(),
    }))
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ListQuery {
    pub email: Option<String>,
}

/// Ledger entries for the caller, newest first. Asking for another email is
/// forbidden; no filter defaults to the caller's own entries.
pub async fn list(
    identity: VerifiedIdentity,
    State(payments): State<PaymentCollection>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Payment>>, Error> {
    let email = match query.email {
        Some(email) if email == identity.email => email,
        Some(_) => {
            return Err(Error::Forbidden(ForbiddenReason::EmailMismatch))
                .tap_err(|_| tracing::debug!("tried listing another user's payments"))
        }
        None => identity.email,
    };

    let options = mongodb::options::FindOptions::builder()
        .sort(bson::doc! { "date": -1 })
        .build();

    let mut cursor = payments
        .find(
            bson::doc! {
                "email": email
            },
            options,
        )
        .await?;

    let mut result = vec![];

    while cursor.advance().await? {
        let payment = cursor.deserialize_current()?;

        result.push(payment.into());
    }

    Ok(Json(result))
}
