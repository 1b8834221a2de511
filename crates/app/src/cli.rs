use std::fmt;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingValue { flag: &'static str },
    MissingArgument { command: &'static str, name: &'static str },
    UnexpectedArgument(String),
    UnknownArg(String),
    UnknownCommand(String),
    MissingCommand,
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingArgument { command, name } => {
                write!(f, "{command}: missing <{name}>")
            }
            ArgsError::UnexpectedArgument(arg) => write!(f, "unexpected argument: {arg}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
        }
    }
}

impl std::error::Error for ArgsError {}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  reels due      [--channel <name>]");
    eprintln!("  reels mark     <question-id> --channel <name> [--difficulty <level>]");
    eprintln!("  reels review   <question-id> <again|hard|good|easy> [--channel <name>] [--difficulty <level>]");
    eprintln!("  reels preview  <question-id>");
    eprintln!("  reels stats");
    eprintln!("  reels reset    <question-id> | --all");
    eprintln!("  reels session  [--channel <name>]");
    eprintln!();
    eprintln!("Global options:");
    eprintln!("  --db <sqlite_url>    default: sqlite:reels.sqlite3?mode=rwc");
    eprintln!("  --config <path>      default: reels.toml (optional)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  REELS_DB_URL, REELS_UTC_OFFSET_MINUTES, RUST_LOG");
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResetTarget {
    One(String),
    All,
}

/// Parsed subcommand. Ids, ratings and difficulties stay raw here and are
/// validated by the domain types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Due {
        channel: Option<String>,
    },
    Mark {
        question_id: String,
        channel: String,
        difficulty: Option<String>,
    },
    Review {
        question_id: String,
        rating: String,
        channel: Option<String>,
        difficulty: Option<String>,
    },
    Preview {
        question_id: String,
    },
    Stats,
    Reset(ResetTarget),
    Session {
        channel: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: Command,
    pub db_url: Option<String>,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Parsed {
    Run(Invocation),
    Help,
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

#[derive(Default)]
struct RawArgs {
    positionals: Vec<String>,
    db_url: Option<String>,
    config_path: Option<PathBuf>,
    channel: Option<String>,
    difficulty: Option<String>,
    all: bool,
}

impl RawArgs {
    fn collect(args: &mut impl Iterator<Item = String>) -> Result<Option<Self>, ArgsError> {
        let mut raw = Self::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => raw.db_url = Some(require_value(args, "--db")?),
                "--config" => raw.config_path = Some(require_value(args, "--config")?.into()),
                "--channel" => raw.channel = Some(require_value(args, "--channel")?),
                "--difficulty" => raw.difficulty = Some(require_value(args, "--difficulty")?),
                "--all" => raw.all = true,
                "--help" | "-h" => return Ok(None),
                _ if arg.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ => raw.positionals.push(arg),
            }
        }
        Ok(Some(raw))
    }

    fn take_positional(
        &mut self,
        command: &'static str,
        name: &'static str,
    ) -> Result<String, ArgsError> {
        if self.positionals.is_empty() {
            return Err(ArgsError::MissingArgument { command, name });
        }
        Ok(self.positionals.remove(0))
    }

    fn finish(self) -> Result<(), ArgsError> {
        match self.positionals.into_iter().next() {
            Some(extra) => Err(ArgsError::UnexpectedArgument(extra)),
            None => Ok(()),
        }
    }
}

/// Parse the arguments after the binary name.
///
/// # Errors
///
/// Returns `ArgsError` for unknown subcommands or flags and missing values.
pub fn parse(args: impl IntoIterator<Item = String>) -> Result<Parsed, ArgsError> {
    let mut args = args.into_iter();
    let name = match args.next() {
        None => return Err(ArgsError::MissingCommand),
        Some(first) if first == "--help" || first == "-h" || first == "help" => {
            return Ok(Parsed::Help);
        }
        Some(first) => first,
    };

    let Some(mut raw) = RawArgs::collect(&mut args)? else {
        return Ok(Parsed::Help);
    };

    let command = match name.as_str() {
        "due" => Command::Due {
            channel: raw.channel.take(),
        },
        "mark" => {
            let question_id = raw.take_positional("mark", "question-id")?;
            let channel = raw.channel.take().ok_or(ArgsError::MissingValue {
                flag: "--channel",
            })?;
            Command::Mark {
                question_id,
                channel,
                difficulty: raw.difficulty.take(),
            }
        }
        "review" => {
            let question_id = raw.take_positional("review", "question-id")?;
            let rating = raw.take_positional("review", "rating")?;
            Command::Review {
                question_id,
                rating,
                channel: raw.channel.take(),
                difficulty: raw.difficulty.take(),
            }
        }
        "preview" => Command::Preview {
            question_id: raw.take_positional("preview", "question-id")?,
        },
        "stats" => Command::Stats,
        "reset" => {
            if raw.all {
                Command::Reset(ResetTarget::All)
            } else {
                Command::Reset(ResetTarget::One(
                    raw.take_positional("reset", "question-id")?,
                ))
            }
        }
        "session" => Command::Session {
            channel: raw.channel.take(),
        },
        _ => return Err(ArgsError::UnknownCommand(name)),
    };

    let db_url = raw.db_url.take();
    let config_path = raw.config_path.take();
    raw.finish()?;

    Ok(Parsed::Run(Invocation {
        command,
        db_url,
        config_path,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Result<Parsed, ArgsError> {
        parse(args.iter().map(|s| (*s).to_owned()))
    }

    fn command(args: &[&str]) -> Command {
        match parse_args(args).unwrap() {
            Parsed::Run(invocation) => invocation.command,
            Parsed::Help => panic!("expected a command"),
        }
    }

    #[test]
    fn parses_review_with_flags_in_any_position() {
        let parsed = parse_args(&[
            "review",
            "--db",
            "sqlite::memory:",
            "react-1",
            "good",
            "--channel",
            "react",
        ])
        .unwrap();

        assert_eq!(
            parsed,
            Parsed::Run(Invocation {
                command: Command::Review {
                    question_id: "react-1".into(),
                    rating: "good".into(),
                    channel: Some("react".into()),
                    difficulty: None,
                },
                db_url: Some("sqlite::memory:".into()),
                config_path: None,
            })
        );
    }

    #[test]
    fn reset_accepts_id_or_all() {
        assert_eq!(
            command(&["reset", "q1"]),
            Command::Reset(ResetTarget::One("q1".into()))
        );
        assert_eq!(command(&["reset", "--all"]), Command::Reset(ResetTarget::All));
        assert_eq!(
            parse_args(&["reset"]),
            Err(ArgsError::MissingArgument {
                command: "reset",
                name: "question-id"
            })
        );
    }

    #[test]
    fn mark_requires_channel() {
        assert_eq!(
            parse_args(&["mark", "q1"]),
            Err(ArgsError::MissingValue { flag: "--channel" })
        );
    }

    #[test]
    fn rejects_unknown_input() {
        assert_eq!(
            parse_args(&["grade"]),
            Err(ArgsError::UnknownCommand("grade".into()))
        );
        assert_eq!(
            parse_args(&["due", "--deck-id", "1"]),
            Err(ArgsError::UnknownArg("--deck-id".into()))
        );
        assert_eq!(
            parse_args(&["stats", "extra"]),
            Err(ArgsError::UnexpectedArgument("extra".into()))
        );
        assert_eq!(
            parse_args(&["preview", "--db"]),
            Err(ArgsError::MissingValue { flag: "--db" })
        );
        assert_eq!(parse_args(&[]), Err(ArgsError::MissingCommand));
    }

    #[test]
    fn help_anywhere_wins() {
        assert_eq!(parse_args(&["--help"]), Ok(Parsed::Help));
        assert_eq!(parse_args(&["review", "-h"]), Ok(Parsed::Help));
    }
}
