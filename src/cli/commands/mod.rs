//! CLI command definitions and dispatch.
//!
//! Each group of subcommands is implemented in its own submodule:
//! - `download`: downloads by id or by URL
//! - `search`: catalog search and "I'm feeling lucky" downloads

mod download;
mod search;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::runtime::Runtime;

use crate::config::{self, Settings};
use crate::download::ModuleOverrides;
use crate::module::ModuleRegistry;

pub use download::{cmd_download, cmd_url, parse_url};
pub use search::{cmd_lucky_search, cmd_search};

/// Music Fetcher CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Download directory (overrides general.download_path)
    #[arg(short, long, global = true, env = "MUSIC_FETCHER_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true, env = "MUSIC_FETCHER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Module to fetch lyrics from
    #[arg(long, global = true)]
    pub lyrics: Option<String>,

    /// Module to fetch covers from
    #[arg(long, global = true)]
    pub covers: Option<String>,

    /// Module to fetch credits from
    #[arg(long, global = true)]
    pub credits: Option<String>,

    /// Module to download playlist tracks from
    #[arg(long, global = true)]
    pub download_module: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Download media by id
    Download {
        /// Source module name
        module: String,
        /// track, album, playlist or artist
        kind: String,
        /// One or more ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Download media by URL
    Url {
        /// One or more URLs
        #[arg(required = true)]
        urls: Vec<String>,
    },
    /// Search a module's catalog
    Search {
        module: String,
        kind: String,
        #[arg(required = true)]
        query: Vec<String>,
        /// Max results to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Search and download the first result
    LuckySearch {
        module: String,
        kind: String,
        #[arg(required = true)]
        query: Vec<String>,
    },
    /// Write a settings file with the defaults
    InitConfig {
        /// Replace an existing file
        #[arg(long)]
        force: bool,
    },
}

impl Cli {
    /// Per-run module choices from the command line.
    pub fn overrides(&self) -> ModuleOverrides {
        ModuleOverrides {
            lyrics: self.lyrics.clone(),
            covers: self.covers.clone(),
            credits: self.credits.clone(),
            download: self.download_module.clone(),
        }
    }

    /// Settings from `--config` or the default location, with `--output` applied.
    ///
    /// An explicit settings file must parse; the default one falls back to
    /// defaults.
    pub fn settings(&self) -> anyhow::Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => config::load_from(path)?,
            None => config::load(),
        };
        if let Some(output) = &self.output {
            settings.general.download_path = output.clone();
        }
        Ok(settings)
    }
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli, registry: &ModuleRegistry) -> anyhow::Result<()> {
    if let Commands::InitConfig { force } = &cli.command {
        return cmd_init_config(cli.config.clone(), *force);
    }

    let rt = Runtime::new()?;
    let settings = cli.settings()?;

    match &cli.command {
        Commands::Download { module, kind, ids } => cmd_download(
            &rt,
            registry,
            settings,
            cli.overrides(),
            module,
            kind.parse()?,
            ids,
        ),
        Commands::Url { urls } => cmd_url(&rt, registry, settings, cli.overrides(), urls),
        Commands::Search {
            module,
            kind,
            query,
            limit,
        } => cmd_search(&rt, registry, module, kind.parse()?, &query.join(" "), *limit),
        Commands::LuckySearch {
            module,
            kind,
            query,
        } => cmd_lucky_search(
            &rt,
            registry,
            settings,
            cli.overrides(),
            module,
            kind.parse()?,
            &query.join(" "),
        ),
        Commands::InitConfig { .. } => Ok(()),
    }
}

/// Write default settings to `path` or the default location.
fn cmd_init_config(path: Option<PathBuf>, force: bool) -> anyhow::Result<()> {
    let path = path
        .or_else(config::config_path)
        .ok_or(config::ConfigError::NoConfigDir)?;
    if path.exists() && !force {
        anyhow::bail!("{:?} already exists (use --force to replace it)", path);
    }
    config::save_to(&Settings::default(), &path)?;
    println!("Wrote default settings to {:?}", path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_download_with_flags() {
        let cli = Cli::try_parse_from([
            "music-fetcher",
            "download",
            "svc",
            "album",
            "1",
            "2",
            "-o",
            "/tmp/out",
            "--lyrics",
            "lyr",
        ])
        .unwrap();

        match &cli.command {
            Commands::Download { module, kind, ids } => {
                assert_eq!(module, "svc");
                assert_eq!(kind, "album");
                assert_eq!(ids, &["1", "2"]);
            }
            _ => panic!("expected download"),
        }
        assert_eq!(cli.output, Some(PathBuf::from("/tmp/out")));

        let overrides = cli.overrides();
        assert_eq!(overrides.lyrics.as_deref(), Some("lyr"));
        assert!(overrides.covers.is_none());
        assert!(overrides.download.is_none());
    }

    #[test]
    fn test_parse_search_joins_query() {
        let cli = Cli::try_parse_from([
            "music-fetcher",
            "lucky-search",
            "svc",
            "track",
            "never",
            "gonna",
        ])
        .unwrap();
        match &cli.command {
            Commands::LuckySearch { query, .. } => assert_eq!(query.join(" "), "never gonna"),
            _ => panic!("expected lucky-search"),
        }
    }

    #[test]
    fn test_download_requires_ids() {
        assert!(Cli::try_parse_from(["music-fetcher", "download", "svc", "track"]).is_err());
        assert!(Cli::try_parse_from(["music-fetcher", "url"]).is_err());
    }

    #[test]
    fn test_settings_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[general]\nsearch_limit = 3\n").unwrap();

        let cli = Cli::try_parse_from([
            "music-fetcher",
            "url",
            "https://a.example.com/track/1",
            "--config",
            path.to_str().unwrap(),
            "--output",
            "/tmp/out",
        ])
        .unwrap();
        let settings = cli.settings().unwrap();
        assert_eq!(settings.general.search_limit, 3);
        assert_eq!(settings.general.download_path, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");

        cmd_init_config(Some(path.clone()), false).unwrap();
        assert!(config::load_from(&path).is_ok());
        assert!(cmd_init_config(Some(path.clone()), false).is_err());
        assert!(cmd_init_config(Some(path), true).is_ok());
    }
}
