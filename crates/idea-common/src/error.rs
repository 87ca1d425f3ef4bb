/// Error types for the infrastructure shared by the idea services.
///
/// These represent failures in backing services (Redis, serialization of stored
/// documents) and missing configuration. Application errors are defined in the
/// service crate and wrap `CommonError` via `#[from]`.

#[derive(Debug, thiserror::Error)]
pub enum CommonError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("stored document is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),

    #[error("redis connection already closed")]
    Closed,

    #[error("{0} environment variable is required")]
    MissingEnv(&'static str),
}
