use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};

/// How hard to try before giving up on a fresh client.
#[derive(Debug, Clone, Copy)]
pub(super) struct RetryPolicy {
    attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    /// Startup: the database may still be booting next to us.
    pub(super) const STARTUP: Self = Self {
        attempts: 10,
        initial_delay: Duration::from_millis(250),
        max_delay: Duration::from_secs(5),
    };

    /// Reconnects are paced by the storage supervisor, so one ping is enough.
    pub(super) const RECONNECT: Self = Self {
        attempts: 1,
        initial_delay: Duration::ZERO,
        max_delay: Duration::ZERO,
    };
}

/// Build a client for `database_name` and ping it until it answers or
/// `policy` runs out.
pub(super) async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
    policy: RetryPolicy,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);

    let mut delay = policy.initial_delay;
    for attempt in 1..=policy.attempts {
        match database.run_command(doc! { "ping": 1 }).await {
            Ok(_) => return Ok((client, database)),
            Err(source) if attempt == policy.attempts => {
                return Err(MongoDaoError::InitialPing {
                    attempts: attempt,
                    source,
                });
            }
            Err(err) => {
                debug!(attempt, database = database_name, error = %err, "MongoDB ping failed; retrying");
                sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }

    Err(MongoDaoError::NoAttempts)
}
