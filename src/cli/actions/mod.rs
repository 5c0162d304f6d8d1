//! What the binary does once its arguments are validated.

pub mod server;

use crate::cli::telemetry;
use anyhow::Result;
use tracing::error;

#[derive(Debug)]
pub enum Action {
    /// Serve the console auth layer until a shutdown signal arrives.
    Server(server::Args),
}

impl Action {
    /// Run the action, then flush spans still queued for the exporter.
    ///
    /// The flush happens whether or not the action succeeded.
    /// # Errors
    /// Returns the action's own error.
    pub async fn execute(self) -> Result<()> {
        let outcome = match self {
            Self::Server(args) => server::execute(args).await,
        };

        if let Err(err) = &outcome {
            error!("sentinel stopped: {err:#}");
        }
        telemetry::shutdown_tracer();

        outcome
    }
}
