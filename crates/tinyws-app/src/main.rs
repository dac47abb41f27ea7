mod cli;
mod replay;

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::process::ExitCode;

use tinyws_common::TinywsError;
use tinyws_config::TinywsConfig;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use cli::Command;

fn init_logging(directive: &str) {
    let filter = EnvFilter::from_default_env().add_directive(
        directive
            .parse()
            .unwrap_or_else(|_| LevelFilter::INFO.into()),
    );
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn print_capabilities(config: &TinywsConfig, out: &mut impl Write) -> io::Result<()> {
    for info in tinyws_capabilities::catalog(&config.capabilities) {
        let status = if config.capabilities.is_enabled(info.name) {
            "enabled"
        } else {
            "disabled"
        };
        let events = if info.events { ", events" } else { "" };
        writeln!(out, "{} ({status}{events})", info.name)?;
        for method in info.methods {
            writeln!(out, "    {method}")?;
        }
    }
    Ok(())
}

fn run(args: cli::Args, config: TinywsConfig) -> Result<(), TinywsError> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match args.command {
        Command::Replay { file } => {
            let input = BufReader::new(File::open(&file)?);
            let summary = replay::run(input, &mut out, &config)?;
            if summary.leaked > 0 {
                tracing::warn!(
                    "{} evaluation(s) were never answered by the transcript",
                    summary.leaked
                );
            }
        }
        Command::Capabilities => print_capabilities(&config, &mut out)?,
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = cli::parse();

    // Config is read before logging is up so its level can apply.
    let loaded = tinyws_config::load_config(args.config.as_deref());
    let directive = match (&args.log_level, &loaded) {
        (Some(level), _) => level.clone(),
        (None, Ok(config)) => config.logging.level.as_directive().to_string(),
        (None, Err(_)) => "info".to_string(),
    };
    init_logging(&directive);

    tracing::info!("tinyws v{} starting...", env!("CARGO_PKG_VERSION"));
    let config = loaded.unwrap_or_else(|e| {
        tracing::warn!("Config load failed, using defaults: {e}");
        TinywsConfig::default()
    });

    match run(args, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e}");
            eprintln!("tinyws: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_listing_marks_disabled_ones() {
        let mut config = TinywsConfig::default();
        config.capabilities.enabled = vec!["hello".into()];
        let mut out = Vec::new();
        print_capabilities(&config, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("hello (enabled)\n    getTimestamp\n"));
        assert!(text.contains("clock (disabled, events)\n    startTicking\n"));
        assert!(text.contains("systemInfo (disabled)\n"));
    }

    #[test]
    fn replay_reads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"type":"load"}}"#).unwrap();

        let input = BufReader::new(File::open(file.path()).unwrap());
        let mut out = Vec::new();
        let summary = replay::run(input, &mut out, &TinywsConfig::default()).unwrap();
        assert_eq!(summary.events, 1);
        // Bootstrap, ready banner, four proxies.
        assert_eq!(summary.scripts, 6);
    }
}
