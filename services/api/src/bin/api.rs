//! services/api/src/bin/api.rs

use api_lib::{
    adapters::PgGateway,
    config::Config,
    error::ApiError,
    web::{
        auth::{login_handler, logout_handler, signup_handler},
        optional_auth, require_auth,
        rest::{
            add_comment_handler, chapter_handler, create_chapter_handler, list_comments_handler,
            list_stories_handler, my_bookmarks_handler, my_progress_handler, rating_handler,
            remove_bookmark_handler, save_progress_handler, story_detail_handler,
            top_stories_handler, upsert_bookmark_handler, upsert_rating_handler, ApiDoc,
        },
        state::AppState,
        ws_handler,
    },
};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let gateway = Arc::new(PgGateway::new(db_pool));
    info!("Running database migrations...");
    gateway
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        gateway,
        config: config.clone(),
    });

    let cors_origin = config
        .cors_origin
        .parse::<HeaderValue>()
        .map_err(|e| ApiError::Internal(format!("Invalid CORS_ORIGIN: {e}")))?;
    let cors = CorsLayer::new()
        .allow_origin(cors_origin)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 4. Create the Web Router ---
    // Public routes (no session needed)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/stories", get(list_stories_handler))
        .route("/stories/top", get(top_stories_handler))
        .route(
            "/stories/{slug}/chapters/{chapter_slug}",
            get(chapter_handler),
        );

    // Routes that work anonymously but change behavior for a signed-in user:
    // reads are enriched (own rating, resume point), writes reject with 401
    // before touching the store.
    let optional_routes = Router::new()
        .route("/stories/{slug}", get(story_detail_handler))
        .route(
            "/stories/{slug}/rating",
            get(rating_handler).put(upsert_rating_handler),
        )
        .route(
            "/chapters/{chapter_id}/comments",
            get(list_comments_handler).post(add_comment_handler),
        )
        .route("/ws", get(ws_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            optional_auth,
        ));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/stories/{slug}/chapters", post(create_chapter_handler))
        .route(
            "/stories/{slug}/bookmark",
            put(upsert_bookmark_handler).delete(remove_bookmark_handler),
        )
        .route("/stories/{slug}/progress", put(save_progress_handler))
        .route("/me/progress", get(my_progress_handler))
        .route("/me/bookmarks", get(my_bookmarks_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    let api_router = Router::new()
        .merge(public_routes)
        .merge(optional_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 5. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
