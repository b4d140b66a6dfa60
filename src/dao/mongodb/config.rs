use mongodb::options::ClientOptions;

use super::error::{MongoDaoError, MongoResult};

/// Database name used when the caller does not provide one.
const DEFAULT_DATABASE: &str = "tally_rooms";

/// Connection settings for the MongoDB backend.
#[derive(Clone)]
pub struct MongoConfig {
    /// Parsed client options.
    pub options: ClientOptions,
    /// Target database name.
    pub database_name: String,
}

impl MongoConfig {
    /// Parse a connection URI, optionally overriding the database name.
    pub async fn from_uri(uri: &str, db_name: Option<&str>) -> MongoResult<Self> {
        let database_name = db_name.unwrap_or(DEFAULT_DATABASE).to_owned();
        let options =
            ClientOptions::parse(uri)
                .await
                .map_err(|source| MongoDaoError::InvalidUri {
                    uri: uri.to_owned(),
                    source,
                })?;

        Ok(Self {
            options,
            database_name,
        })
    }

    /// Build the configuration from `TALLY_MONGO_URI` and the optional
    /// `TALLY_MONGO_DB` override.
    pub async fn from_env() -> MongoResult<Self> {
        let uri = std::env::var("TALLY_MONGO_URI").map_err(|_| MongoDaoError::MissingEnvVar {
            var: "TALLY_MONGO_URI",
        })?;
        let db = std::env::var("TALLY_MONGO_DB").ok();
        Self::from_uri(&uri, db.as_deref()).await
    }
}
