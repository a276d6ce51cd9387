use sqlx::migrate::Migrator;

pub mod video_repo;

/// Embedded migrations, run once at startup.
pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");
