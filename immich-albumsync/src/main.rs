use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use immich_albumsync::config::SyncConfig;
use immich_albumsync::logging;
use immich_albumsync::rules::load_rules;
use immich_albumsync::sync::AlbumSyncEngine;
use immich_core::ImmichClient;

const EXIT_FATAL: u8 = 1;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    help: bool,
    preview: bool,
    json: bool,
    rules: Option<PathBuf>,
}

fn parse_cli<I>(args: I) -> anyhow::Result<CliOptions>
where
    I: IntoIterator<Item = String>,
{
    let mut options = CliOptions::default();
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--preview" | "--dry-run" => options.preview = true,
            "--json" => options.json = true,
            "--rules" => {
                let path = args.next().context("--rules expects a path")?;
                options.rules = Some(PathBuf::from(path));
            }
            "--help" | "-h" => options.help = true,
            other => anyhow::bail!("unknown argument: {other}"),
        }
    }
    Ok(options)
}

fn print_usage() {
    println!("Usage: immich-albumsync [--preview] [--rules <path>] [--json]");
    println!("  --preview, --dry-run  Compute album changes without sending them");
    println!("  --rules <path>        Rules file (default: IMMICH_RULES_FILE or config dir)");
    println!("  --json                Print the run summary as JSON");
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    logging::init();
    match run(std::env::args()).await {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            tracing::error!(error = %format!("{err:#}"), "sync aborted");
            eprintln!("immich-albumsync: {err:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

async fn run<I>(args: I) -> anyhow::Result<u8>
where
    I: IntoIterator<Item = String>,
{
    let cli = parse_cli(args)?;
    if cli.help {
        print_usage();
        return Ok(0);
    }

    let mut config = SyncConfig::from_env().context("invalid configuration")?;
    config.preview |= cli.preview;
    if let Some(path) = cli.rules {
        config.rules_path = path;
    }

    // rules are validated before the first request goes out
    let rules = load_rules(&config.rules_path)
        .with_context(|| format!("invalid rules in {}", config.rules_path.display()))?;
    let client = ImmichClient::with_base_url(&config.base_url, config.api_key.clone())
        .with_context(|| format!("invalid server url {}", config.base_url))?;

    let engine = AlbumSyncEngine::new(client, config.engine_options());
    let summary = engine
        .run(&rules)
        .await
        .context("could not read the asset catalog")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{summary}");
    }
    Ok(summary.status().exit_code())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("immich-albumsync")
            .chain(values.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parse_cli_defaults_to_apply_mode() {
        let options = parse_cli(args(&[])).unwrap();
        assert_eq!(options, CliOptions::default());
    }

    #[test]
    fn parse_cli_supports_preview_aliases_and_json() {
        let options = parse_cli(args(&["--dry-run", "--json"])).unwrap();
        assert!(options.preview);
        assert!(options.json);
        assert!(parse_cli(args(&["--preview"])).unwrap().preview);
    }

    #[test]
    fn parse_cli_reads_rules_path() {
        let options = parse_cli(args(&["--rules", "/tmp/rules.json"])).unwrap();
        assert_eq!(options.rules, Some(PathBuf::from("/tmp/rules.json")));
        assert!(parse_cli(args(&["--rules"])).is_err());
    }

    #[test]
    fn parse_cli_rejects_unknown_arguments() {
        let err = parse_cli(args(&["--force"])).unwrap_err();
        assert!(err.to_string().contains("--force"));
    }

    #[test]
    fn parse_cli_supports_help() {
        assert!(parse_cli(args(&["-h"])).unwrap().help);
    }
}
