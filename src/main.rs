use std::net::SocketAddr;

use axum::{response::Html, routing, Router};
use parcelhub::{api, app::AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "parcelhub=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let app_state = AppState::new_from_env().await.unwrap();

    let app = Router::new()
        .route("/", routing::get(root))
        .route(
            "/parcels",
            routing::get(api::parcel::list).post(api::parcel::create),
        )
        .route(
            "/parcels/:id",
            routing::get(api::parcel::show).delete(api::parcel::delete),
        )
        .route(
            "/create-payment-intent",
            routing::post(api::payment::create_intent),
        )
        .route(
            "/payments",
            routing::get(api::payment::list).post(api::payment::record),
        )
        .route("/users", routing::post(api::user::create))
        .route("/users/search", routing::get(api::user::search))
        .route("/users/:id/role", routing::patch(api::user::update_role))
        .route("/users/role/:email", routing::get(api::user::role_lookup))
        .route("/riders", routing::post(api::rider::apply))
        .route("/riders/pending", routing::get(api::rider::list_pending))
        .route("/riders/active", routing::get(api::rider::list_active))
        .route("/riders/:id", routing::patch(api::rider::update_status))
        .with_state(app_state)
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http());

    let port = std::env::var("PORT")
        .ok()
        .and_then(|it| it.parse().ok())
        .unwrap_or(3000);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::debug!("listening on {}", addr);

    axum::Server::bind(&addr)
        .serve(app.into_make_service())
        .await
        .unwrap();
}

async fn root() -> Html<&'static str> {
    Html("<h1>Hello From Server!</h1>")
}
