use tempfile::TempDir;
use tether_core::{Engine, EngineBuilder};

/// Helper function to create a test engine over a throwaway database
pub async fn create_test_engine() -> (TempDir, Engine) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.db");
    let engine = EngineBuilder::new()
        .with_database_path(Some(&db_path))
        .build()
        .await
        .expect("Failed to create engine");
    (temp_dir, engine)
}
