use anyhow::Result;

pub mod server;

#[derive(Debug)]
pub enum Action {
    Server {
        port: u16,
        dsn: String,
        frontend_url: String,
        rp_id: Option<String>,
        session_ttl_seconds: i64,
        challenge_ttl_seconds: i64,
    },
}

impl Action {
    /// Execute the action.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying action fails.
    pub async fn execute(self) -> Result<()> {
        match self {
            Self::Server { .. } => server::handle(self).await,
        }
    }
}
