use crate::cli::{actions::Action, commands};
use anyhow::Result;

/// Turn parsed arguments into an executable action.
///
/// # Errors
///
/// Returns an error if a required argument is missing.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    Ok(Action::Server {
        port: matches
            .get_one::<u16>(commands::ARG_PORT)
            .copied()
            .unwrap_or(8080),
        dsn: matches
            .get_one::<String>(commands::ARG_DSN)
            .map(String::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing required argument: --dsn"))?,
        frontend_url: matches
            .get_one::<String>(commands::ARG_FRONTEND_URL)
            .map(String::to_string)
            .unwrap_or_else(|| "http://localhost:3000".to_string()),
        rp_id: matches
            .get_one::<String>(commands::ARG_RP_ID)
            .map(String::to_string),
        session_ttl_seconds: matches
            .get_one::<i64>(commands::ARG_SESSION_TTL)
            .copied()
            .unwrap_or(604_800),
        challenge_ttl_seconds: matches
            .get_one::<i64>(commands::ARG_CHALLENGE_TTL)
            .copied()
            .unwrap_or(60),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::actions::Action;

    #[test]
    fn handler_builds_server_action() {
        let matches = commands::new()
            .try_get_matches_from([
                "voucherd",
                "--dsn",
                "postgres://localhost:5432/voucherd",
                "--frontend-url",
                "https://vouchers.example.com",
                "--rp-id",
                "vouchers.example.com",
                "--challenge-ttl",
                "120",
            ])
            .expect("arguments parse");

        let Action::Server {
            port,
            dsn,
            frontend_url,
            rp_id,
            session_ttl_seconds,
            challenge_ttl_seconds,
        } = handler(&matches).expect("dispatch succeeds");

        assert_eq!(port, 8080);
        assert_eq!(dsn, "postgres://localhost:5432/voucherd");
        assert_eq!(frontend_url, "https://vouchers.example.com");
        assert_eq!(rp_id.as_deref(), Some("vouchers.example.com"));
        assert_eq!(session_ttl_seconds, 604_800);
        assert_eq!(challenge_ttl_seconds, 120);
    }
}
