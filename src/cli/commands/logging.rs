use clap::{builder::ValueParser, Arg, Command};

pub const ARG_VERBOSITY: &str = "verbosity";

#[must_use]
pub fn validator_log_level() -> ValueParser {
    ValueParser::from(move |level: &str| -> std::result::Result<u8, String> {
        if let Ok(parsed) = level.parse::<u8>() {
            // Successfully parsed as a number
            if parsed <= 5 {
                return Ok(parsed);
            }
        }

        match level.to_lowercase().as_str() {
            "error" => Ok(0),
            "warn" => Ok(1),
            "info" => Ok(2),
            "debug" => Ok(3),
            "trace" => Ok(4),
            _ => Err("invalid log level".to_string()),
        }
    })
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command.arg(
        Arg::new(ARG_VERBOSITY)
            .short('v')
            .long("verbose")
            .help("Verbosity level: ERROR, WARN, INFO, DEBUG, TRACE (default: ERROR)")
            .env("VOUCHERD_LOG_LEVEL")
            .global(true)
            .action(clap::ArgAction::Count)
            .value_parser(validator_log_level()),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_command() -> Command {
        with_args(Command::new("test"))
    }

    #[test]
    fn verbose_flag_counts() {
        let matches = test_command()
            .try_get_matches_from(["test", "-vvv"])
            .expect("flags parse");
        assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(3));
    }

    #[test]
    fn log_level_names_parse_from_env() {
        for (level, expected) in [("error", 0u8), ("warn", 1), ("info", 2), ("trace", 4)] {
            temp_env::with_var("VOUCHERD_LOG_LEVEL", Some(level), || {
                let matches = test_command()
                    .try_get_matches_from(["test"])
                    .expect("level parses");
                assert_eq!(matches.get_one::<u8>(ARG_VERBOSITY).copied(), Some(expected));
            });
        }
    }

    #[test]
    fn log_level_rejects_unknown() {
        temp_env::with_var("VOUCHERD_LOG_LEVEL", Some("loud"), || {
            let result = test_command().try_get_matches_from(["test"]);
            assert!(result.is_err());
        });
    }
}
