// Theory Social Server - profiles, friend requests and contacts over HTTP

use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

use theory_social::{
    app_state::AppState, config::Config, data_seeder::seed_demo_data,
    social_interface::create_social_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("theory_social=info,tower_http=info")),
        )
        .init();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize application state
    let app_state = AppState::new(config.clone()).await?;

    if config.seed_demo_data {
        seed_demo_data(app_state.store.as_ref(), &config.collections).await?;
    }

    // Build main application router
    let app = create_social_router(app_state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let addr = config.server_address();
    info!("Theory Social server starting on http://{}", addr);
    info!("  GET    /api/v1/users/{{uid}}/profile");
    info!("  GET    /api/v1/dashboard");
    info!("  GET    /api/v1/contacts");
    info!("  POST   /api/v1/friend-requests/{{target}}[/accept|/reject]");
    info!("  DELETE /api/v1/friends/{{friend}}");

    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
