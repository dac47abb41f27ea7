use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// tinyws: a host/script call bridge, driven headlessly.
#[derive(Parser, Debug)]
#[command(name = "tinyws", version, about)]
pub struct Args {
    /// Config file path override.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level override (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Feed a JSON-lines transcript of remote-side events to a bridge and
    /// print every script the host evaluates.
    Replay {
        /// Transcript file.
        file: PathBuf,
    },
    /// List the built-in capabilities and their methods.
    Capabilities,
}

pub fn parse() -> Args {
    Args::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_takes_a_file() {
        let args = Args::try_parse_from(["tinyws", "replay", "session.jsonl"]).unwrap();
        assert!(matches!(args.command, Command::Replay { ref file } if file == &PathBuf::from("session.jsonl")));
        assert!(args.config.is_none());
    }

    #[test]
    fn global_flags_go_anywhere() {
        let args = Args::try_parse_from([
            "tinyws",
            "capabilities",
            "--log-level",
            "debug",
            "--config",
            "/tmp/t.toml",
        ])
        .unwrap();
        assert!(matches!(args.command, Command::Capabilities));
        assert_eq!(args.log_level.as_deref(), Some("debug"));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/t.toml")));
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Args::try_parse_from(["tinyws"]).is_err());
    }
}
