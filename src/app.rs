use std::sync::Arc;

use axum::extract::FromRef;

use crate::{
    api::{
        gateway::{PaymentGateway, StripeGateway},
        identity::IdentityState,
        parcel::ParcelCollection,
        payment::PaymentCollection,
        rider::RiderCollection,
        user::UserCollection,
    },
    error::Error,
};

pub const DATABASE_NAME: &str = "parcelDB";

#[derive(FromRef, Clone)]
pub struct AppState {
    pub identity: IdentityState,
    pub payment_gateway: Arc<dyn PaymentGateway>,

    pub mongo_client: mongodb::Client,
    pub parcel_collection: ParcelCollection,
    pub payment_collection: PaymentCollection,
    pub user_collection: UserCollection,
    pub rider_collection: RiderCollection,
}

impl AppState {
    /// Connects and pings the deployment before anything is served, so a bad
    /// database configuration fails at startup instead of on first request.
    pub async fn new(
        mongo_url: &str,
        database_name: &str,
        identity: IdentityState,
        payment_gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, Error> {
        let mongo_client_opt = mongodb::options::ClientOptions::parse(mongo_url).await?;
        let mongo_client = mongodb::Client::with_options(mongo_client_opt)?;

        let db = mongo_client.database(database_name);
        db.run_command(bson::doc! { "ping": 1 }, None).await?;

        Ok(Self {
            identity,
            payment_gateway,

            mongo_client,
            parcel_collection: ParcelCollection(db.collection("parcels").into()),
            payment_collection: PaymentCollection(db.collection("payments").into()),
            user_collection: UserCollection(db.collection("users").into()),
            rider_collection: RiderCollection(db.collection("riders").into()),
        })
    }

    pub async fn new_from_env() -> Result<Self, Error> {
        let mongodb_url = &std::env::var("MONGODB_URI")
            .expect("Cannot retreive MONGODB_URI from environment variable.");

        let identity = IdentityState::new_from_env();
        let payment_gateway = Arc::new(StripeGateway::new_from_env());

        Self::new(mongodb_url, DATABASE_NAME, identity, payment_gateway).await
    }
}
