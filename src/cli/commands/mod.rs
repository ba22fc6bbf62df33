use clap::{
    builder::styling::{AnsiColor, Effects, Styles},
    Arg, ColorChoice, Command,
};

pub mod logging;

pub const ARG_PORT: &str = "port";
pub const ARG_DSN: &str = "dsn";
pub const ARG_FRONTEND_URL: &str = "frontend-url";
pub const ARG_RP_ID: &str = "rp-id";
pub const ARG_SESSION_TTL: &str = "session-ttl";
pub const ARG_CHALLENGE_TTL: &str = "challenge-ttl";

pub fn new() -> Command {
    let styles = Styles::styled()
        .header(AnsiColor::Yellow.on_default() | Effects::BOLD)
        .usage(AnsiColor::Green.on_default() | Effects::BOLD)
        .literal(AnsiColor::Blue.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Green.on_default());

    let command = Command::new("voucherd")
        .about("Payment voucher approval service")
        .version(env!("CARGO_PKG_VERSION"))
        .color(ColorChoice::Auto)
        .styles(styles)
        .arg(
            Arg::new(ARG_PORT)
                .short('p')
                .long("port")
                .help("Port to listen on")
                .default_value("8080")
                .env("VOUCHERD_PORT")
                .value_parser(clap::value_parser!(u16)),
        )
        .arg(
            Arg::new(ARG_DSN)
                .short('d')
                .long("dsn")
                .help("Database connection string")
                .env("VOUCHERD_DSN")
                .required(true),
        )
        .arg(
            Arg::new(ARG_FRONTEND_URL)
                .long("frontend-url")
                .help("Base URL of the frontend, drives CORS origin, WebAuthn origin and cookie attributes")
                .default_value("http://localhost:3000")
                .env("VOUCHERD_FRONTEND_URL"),
        )
        .arg(
            Arg::new(ARG_RP_ID)
                .long("rp-id")
                .help("WebAuthn relying-party id (defaults to the frontend URL host)")
                .env("VOUCHERD_RP_ID"),
        )
        .arg(
            Arg::new(ARG_SESSION_TTL)
                .long("session-ttl")
                .help("Session lifetime in seconds")
                .default_value("604800")
                .env("VOUCHERD_SESSION_TTL")
                .value_parser(clap::value_parser!(i64)),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TTL)
                .long("challenge-ttl")
                .help("WebAuthn challenge lifetime in seconds")
                .default_value("60")
                .env("VOUCHERD_CHALLENGE_TTL")
                .value_parser(clap::value_parser!(i64)),
        );

    logging::with_args(command)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_applied() {
        let matches = new()
            .try_get_matches_from([
                "voucherd",
                "--dsn",
                "postgres://localhost:5432/voucherd",
            ])
            .expect("arguments parse");

        assert_eq!(matches.get_one::<u16>(ARG_PORT).copied(), Some(8080));
        assert_eq!(
            matches.get_one::<String>(ARG_FRONTEND_URL).map(String::as_str),
            Some("http://localhost:3000")
        );
        assert_eq!(matches.get_one::<i64>(ARG_SESSION_TTL).copied(), Some(604_800));
        assert_eq!(matches.get_one::<i64>(ARG_CHALLENGE_TTL).copied(), Some(60));
        assert_eq!(matches.get_one::<String>(ARG_RP_ID), None);
    }

    #[test]
    fn dsn_is_required() {
        let result = new().try_get_matches_from(["voucherd"]);
        assert!(result.is_err());
    }

    #[test]
    fn ttl_rejects_non_numeric() {
        let result = new().try_get_matches_from([
            "voucherd",
            "--dsn",
            "postgres://localhost:5432/voucherd",
            "--session-ttl",
            "a-week",
        ]);
        assert!(result.is_err());
    }
}
