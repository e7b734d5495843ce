use actix_web::{web, App, HttpServer};
use dotenv::dotenv;
use log::info;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use deptnav_backend::config::{self, AppConfig, StoreBackend};
use deptnav_backend::db::{self, AssignmentStore, InMemoryAssignmentStore, PgAssignmentStore};
use deptnav_backend::engine::{EngineRegistry, InMemoryFallbackCache};
use deptnav_backend::errors::AppError;
use deptnav_backend::handlers::{self, AppState};

fn startup_error(err: AppError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv().ok();
    env_logger::init();

    let config = AppConfig::from_env().map_err(startup_error)?;
    let definitions = config::load_definitions(&config.departments_file).map_err(startup_error)?;

    let store: Arc<dyn AssignmentStore> = match (config.store_backend, &config.database_url) {
        (StoreBackend::Postgres, Some(url)) => {
            let pool = db::create_pool(url).await.map_err(startup_error)?;
            Arc::new(PgAssignmentStore::new(pool))
        }
        (StoreBackend::Postgres, None) => {
            return Err(startup_error(AppError::BadRequest("DATABASE_URL must be set".to_string())));
        }
        (StoreBackend::Memory, _) => {
            info!("Using the in-memory assignment store; changes are lost on restart");
            Arc::new(InMemoryAssignmentStore::new())
        }
    };

    let registry = Arc::new(EngineRegistry::new(
        definitions,
        store,
        Arc::new(InMemoryFallbackCache::new()),
        config.engine_settings(),
    ));
    registry.spawn_undo_sweeper(Duration::from_secs(config.undo_sweep_secs));

    let state = web::Data::new(AppState {
        registry,
        jwt_secret: config.jwt_secret.clone(),
    });

    info!("Starting server at {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind(&config.bind_addr)?
    .run()
    .await
}
