use mongodb::error::Error as MongoError;
use thiserror::Error;

pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

#[derive(Debug, Error)]
pub enum MongoDaoError {
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        uri: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        #[source]
        source: MongoError,
    },
    #[error("MongoDB did not answer a ping after {attempts} attempt(s)")]
    InitialPing {
        attempts: u32,
        #[source]
        source: MongoError,
    },
    #[error("MongoDB connection retry policy allows no attempts")]
    NoAttempts,
    #[error("MongoDB ping health check failed")]
    HealthPing {
        #[source]
        source: MongoError,
    },
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        collection: &'static str,
        index: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("failed to write {entity} `{key}`")]
    Write {
        entity: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to delete {entity} `{key}`")]
    Delete {
        entity: &'static str,
        key: String,
        #[source]
        source: MongoError,
    },
    #[error("failed to load collection `{collection}`")]
    Load {
        collection: &'static str,
        #[source]
        source: MongoError,
    },
    #[error("stored document in `{collection}` is malformed: {reason}")]
    Malformed {
        collection: &'static str,
        reason: String,
    },
}
