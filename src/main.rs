use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pv_forecast::{
    cache::TtlCache,
    config::{Config, WeatherProviderKind},
    forecast::{openmeteo::OpenMeteoClient, synthetic::SyntheticWeather, WeatherFetcher, WeatherProvider},
    location::{LocationResolver, NominatimClient},
    routes::{create_router, AppState},
    service::ForecastService,
    session::SessionStore,
    store::KvStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pv_forecast=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    // Initialize the key-value store shared by the cache and the session
    let pool = sqlx::SqlitePool::connect(&config.database_url).await?;
    let store = KvStore::sqlite(pool);
    store.init().await?;
    let cache = TtlCache::new(store, config.cache_ttl());

    let geocoder = Arc::new(NominatimClient::new(&config)?);
    let weather: Arc<dyn WeatherProvider> = match config.weather_provider {
        WeatherProviderKind::OpenMeteo => Arc::new(OpenMeteoClient::new(&config)?),
        WeatherProviderKind::Synthetic => {
            tracing::warn!("Using synthetic weather; forecasts are not real");
            Arc::new(SyntheticWeather::new())
        }
    };

    let resolver = LocationResolver::new(geocoder, cache.clone(), config.suggest_debounce());
    let fetcher = WeatherFetcher::new(weather, cache.clone());
    let session = Arc::new(SessionStore::new(cache));

    match session.load().await {
        Some(state) => tracing::info!(
            "Restored session: {} PV system(s), address '{}'",
            state.systems.len(),
            state.address
        ),
        None => tracing::info!("No stored session, starting fresh"),
    }

    let bind_addr = config.bind_addr.clone();
    let state = AppState {
        config: Arc::new(config),
        service: Arc::new(ForecastService::new(resolver, fetcher)),
        session,
    };

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server starting on http://{}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
