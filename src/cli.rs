use std::env;
use std::path::PathBuf;

pub struct CliOptions {
    pub config: Option<PathBuf>,
    pub preset: Option<String>,
    pub bind: Option<String>,
    pub port: Option<u16>,
    pub log_level: Option<String>,
    /// Where to write the score history when the server shuts down.
    pub scores_out: Option<PathBuf>,
}

/// Outcome of argument parsing.
pub enum CliCommand {
    Run(CliOptions),
    Help,
}

pub fn parse_args() -> Result<CliCommand, String> {
    let args: Vec<String> = env::args().skip(1).collect();
    parse_args_from(args)
}

pub fn parse_args_from(args: Vec<String>) -> Result<CliCommand, String> {
    let mut i = 0usize;
    let mut config = None;
    let mut preset = None;
    let mut bind = None;
    let mut port = None;
    let mut log_level = None;
    let mut scores_out = None;

    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --config (expected a TOML file path)")?;
                if config.replace(PathBuf::from(path)).is_some() {
                    return Err("--config provided more than once".to_string());
                }
            }
            "--preset" => {
                i += 1;
                let name =
                    args.next_or_err(i, "missing value for --preset (expected a preset name)")?;
                if preset.replace(name.to_string()).is_some() {
                    return Err("--preset provided more than once".to_string());
                }
            }
            "--bind" => {
                i += 1;
                let addr =
                    args.next_or_err(i, "missing value for --bind (expected an IP address)")?;
                bind = Some(addr.to_string());
            }
            "--port" => {
                i += 1;
                let raw = args.next_or_err(i, "missing value for --port (expected a u16)")?;
                let parsed = raw
                    .parse::<u16>()
                    .map_err(|_| format!("--port value \"{raw}\" is not a valid u16"))?;
                port = Some(parsed);
            }
            "--log-level" => {
                i += 1;
                let level = args.next_or_err(i, "missing value for --log-level")?;
                log_level = Some(level.to_string());
            }
            "--scores-out" => {
                i += 1;
                let path =
                    args.next_or_err(i, "missing value for --scores-out (expected a file path)")?;
                scores_out = Some(PathBuf::from(path));
            }
            "--help" | "-h" => return Ok(CliCommand::Help),
            other => return Err(format!("unknown argument: {other}")),
        }
        i += 1;
    }

    if config.is_some() && preset.is_some() {
        return Err(
            "arguments `--config` and `--preset` are mutually exclusive; choose one source"
                .to_string(),
        );
    }

    if config.is_none() && preset.is_none() {
        preset = Some("demo".to_string());
    }

    Ok(CliCommand::Run(CliOptions {
        config,
        preset,
        bind,
        port,
        log_level,
        scores_out,
    }))
}

trait SliceArgExt {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String>;
}

impl SliceArgExt for [String] {
    fn next_or_err(&self, index: usize, err: &str) -> Result<&str, String> {
        self.get(index)
            .map(String::as_str)
            .ok_or_else(|| err.to_string())
    }
}

pub fn print_usage() {
    eprintln!("grid-engine: multi-board power grid game server");
    eprintln!();
    eprintln!("Usage: grid-engine [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --config <path>          Load configuration from a TOML file");
    eprintln!("  --preset <name>          Use a built-in preset (demo, minimal)");
    eprintln!("  --bind <ip>              Override server.bind");
    eprintln!("  --port <u16>             Override server.port");
    eprintln!("  --log-level <level>      Override server.log_level");
    eprintln!("  --scores-out <path>      Write all score records as CSV on shutdown");
    eprintln!("  --help                   Show this help message");
    eprintln!();
    eprintln!("If neither --config nor --preset is given, the demo preset is used.");
}

#[cfg(test)]
mod tests {
    use super::{CliCommand, CliOptions, parse_args_from};

    fn run(args: &[&str]) -> Result<CliOptions, String> {
        match parse_args_from(args.iter().map(|s| s.to_string()).collect())? {
            CliCommand::Run(opts) => Ok(opts),
            CliCommand::Help => Err("help".to_string()),
        }
    }

    #[test]
    fn defaults_to_demo_preset() {
        let opts = run(&[]).expect("parse should succeed");
        assert_eq!(opts.preset.as_deref(), Some("demo"));
        assert!(opts.config.is_none());
        assert!(opts.port.is_none());
    }

    #[test]
    fn supports_config_cli() {
        let opts = run(&["--config", "game.toml"]).expect("parse should succeed");
        assert_eq!(
            opts.config.as_deref().and_then(|p| p.to_str()),
            Some("game.toml")
        );
        assert!(opts.preset.is_none());
    }

    #[test]
    fn config_and_preset_are_exclusive() {
        let err = run(&["--config", "a.toml", "--preset", "demo"]).err().unwrap();
        assert!(err.contains("mutually exclusive"));
    }

    #[test]
    fn parses_server_overrides() {
        let opts = run(&[
            "--preset", "minimal", "--bind", "0.0.0.0", "--port", "9000", "--log-level", "debug",
            "--scores-out", "scores.csv",
        ])
        .expect("parse should succeed");
        assert_eq!(opts.bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(opts.port, Some(9000));
        assert_eq!(opts.log_level.as_deref(), Some("debug"));
        assert!(opts.scores_out.is_some());
    }

    #[test]
    fn rejects_bad_port_and_unknown_flags() {
        assert!(run(&["--port", "99999"]).is_err());
        assert!(run(&["--port"]).is_err());
        assert!(run(&["--verbose"]).is_err());
        assert!(run(&["--preset", "a", "--preset", "b"]).is_err());
    }

    #[test]
    fn help_flag_is_reported() {
        let cmd = parse_args_from(vec!["-h".to_string()]).expect("parse should succeed");
        assert!(matches!(cmd, CliCommand::Help));
    }
}
