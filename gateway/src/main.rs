/// Vidstream Gateway - HTTP server
///
/// Startup order matters: catalog, cache, and media store come up first,
/// then the job queue (fatal when unreachable past the backoff cap), then
/// the completion consumer, and finally the HTTP listener.
use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing::{error, info};

use vidstream_gateway::cache::ViewCounter;
use vidstream_gateway::handlers;
use vidstream_gateway::kafka::JobQueue;
use vidstream_gateway::services::{CompletionConsumer, MediaStore};
use vidstream_gateway::websocket::ConnectionRegistry;
use vidstream_gateway::Config;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = Config::from_env().expect("Failed to load configuration");
    let bind_address = format!("{}:{}", config.app.host, config.app.port);

    // Catalog
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
        .expect("Failed to connect to database");
    vidstream_gateway::db::MIGRATOR
        .run(&db_pool)
        .await
        .expect("Failed to run migrations");

    // View counters
    let counter = ViewCounter::connect(&config.cache.redis_url)
        .await
        .expect("Failed to connect to Redis");

    // Media store
    let store = MediaStore::connect(&config.s3)
        .await
        .expect("Failed to configure the media store");
    store
        .ensure_buckets()
        .await
        .expect("Failed to prepare media store buckets");

    // Job queue: there is no service without it. `connect` retries with
    // exponential backoff and fails for good past the cap.
    let queue = JobQueue::connect(&config.kafka)
        .await
        .expect("Failed to connect to the message broker");
    let completion_consumer = queue
        .completion_consumer()
        .expect("Failed to subscribe to completion events");

    let registry = ConnectionRegistry::new();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut consumer = CompletionConsumer::new(
        completion_consumer,
        db_pool.clone(),
        counter.clone(),
        registry.clone(),
        shutdown_rx,
    );
    let consumer_handle = tokio::spawn(async move {
        if let Err(e) = consumer.run().await {
            error!(error = %e, "Completion consumer terminated");
        }
    });

    let pool_data = web::Data::new(db_pool);
    let counter_data = web::Data::new(counter);
    let store_data = web::Data::new(store);
    let queue_data = web::Data::new(queue);
    let registry_data = web::Data::new(registry);
    let config_data = web::Data::new(config.clone());
    let allowed_origins = config.cors.allowed_origins.clone();

    info!("Gateway listening on {}", bind_address);

    let result = HttpServer::new(move || {
        let cors = if allowed_origins.iter().any(|origin| origin == "*") {
            Cors::permissive()
        } else {
            allowed_origins
                .iter()
                .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
        };

        App::new()
            .app_data(pool_data.clone())
            .app_data(counter_data.clone())
            .app_data(store_data.clone())
            .app_data(queue_data.clone())
            .app_data(registry_data.clone())
            .app_data(config_data.clone())
            .wrap(cors)
            .route("/", web::get().to(handlers::health))
            .route("/upload", web::post().to(handlers::uploads::upload_video))
            .route(
                "/notifications",
                web::get().to(handlers::notifications::notifications),
            )
            .service(
                web::scope("/api")
                    .route("/videos", web::get().to(handlers::videos::list_videos))
                    .route(
                        "/videos/upload",
                        web::post().to(handlers::uploads::upload_video),
                    )
                    .route("/videos/{id}", web::get().to(handlers::videos::get_video))
                    .route(
                        "/videos/{id}",
                        web::delete().to(handlers::videos::delete_video),
                    )
                    .route(
                        "/video-playback/{id}",
                        web::get().to(handlers::playback::video_playback),
                    )
                    .route(
                        "/previews/{id}",
                        web::get().to(handlers::previews::get_preview),
                    ),
            )
    })
    .bind(&bind_address)?
    .run()
    .await;

    // Stop the completion consumer once the listener is gone.
    let _ = shutdown_tx.send(true);
    let _ = consumer_handle.await;

    result
}
