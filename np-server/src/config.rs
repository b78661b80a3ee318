//! Service configuration
//!
//! Command-line arguments and environment variables are parsed by clap;
//! values left unset fall through to the optional TOML file and then to
//! compiled defaults.

use clap::Parser;
use np_common::config::{
    load_toml_config, resolve_directory, CompiledDefaults, TomlConfig, OUTPUT_DIR_ENV,
    UPLOAD_DIR_ENV,
};
use np_common::{Error, Result, WorkDirs};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for np-server
#[derive(Parser, Debug, Clone)]
#[command(name = "np-server")]
#[command(about = "Audio to MIDI transcription service")]
#[command(version)]
pub struct ServerArgs {
    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST), env = "NP_HOST")]
    pub host: IpAddr,

    /// Port to listen on
    #[arg(short, long, default_value_t = 8000, env = "NP_PORT")]
    pub port: u16,

    /// Optional TOML config file
    #[arg(short, long, env = "NP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Upload directory (env: NP_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Output directory (env: NP_OUTPUT_DIR)
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// basic-pitch executable
    #[arg(long, env = "NP_BASIC_PITCH_BIN")]
    pub basic_pitch_bin: Option<String>,

    /// Model file passed to basic-pitch (default: its packaged model)
    #[arg(long, env = "NP_MODEL_PATH")]
    pub model_path: Option<PathBuf>,

    /// Seconds of audio decoded for tempo detection
    #[arg(long, env = "NP_TEMPO_MAX_SECONDS")]
    pub tempo_max_seconds: Option<f64>,

    /// Delete generated MIDI files this many seconds after serving them
    #[arg(long, env = "NP_OUTPUT_RETENTION_SECS")]
    pub output_retention_secs: Option<u64>,

    /// Keep existing files in the working directories at startup
    #[arg(long)]
    pub no_purge: bool,
}

/// Same values as parsing an empty command line with no environment
impl Default for ServerArgs {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::LOCALHOST),
            port: 8000,
            config: None,
            upload_dir: None,
            output_dir: None,
            basic_pitch_bin: None,
            model_path: None,
            tempo_max_seconds: None,
            output_retention_secs: None,
            no_purge: false,
        }
    }
}

/// Fully resolved configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: SocketAddr,
    pub upload_dir: PathBuf,
    pub output_dir: PathBuf,
    pub basic_pitch_bin: String,
    pub model_path: Option<PathBuf>,
    pub tempo_max_seconds: f64,
    pub output_retention: Option<Duration>,
    pub purge_on_startup: bool,
    pub log_level: String,
}

impl ServiceConfig {
    /// Load the TOML file named by `args` (if any) and resolve every setting
    pub fn load(args: &ServerArgs) -> Result<Self> {
        let toml = load_toml_config(args.config.as_deref())?;
        Self::resolve(args, &toml)
    }

    /// Merge arguments over TOML values over compiled defaults
    pub fn resolve(args: &ServerArgs, toml: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();

        let tempo_max_seconds = args
            .tempo_max_seconds
            .or(toml.tempo_max_seconds)
            .unwrap_or(defaults.tempo_max_seconds);
        if !(tempo_max_seconds.is_finite() && tempo_max_seconds > 0.0) {
            return Err(Error::Config(format!(
                "tempo_max_seconds must be positive, got {}",
                tempo_max_seconds
            )));
        }

        Ok(Self {
            bind_addr: SocketAddr::new(args.host, args.port),
            upload_dir: resolve_directory(
                args.upload_dir.as_deref(),
                UPLOAD_DIR_ENV,
                toml.upload_dir.as_deref(),
                &defaults.upload_dir,
            ),
            output_dir: resolve_directory(
                args.output_dir.as_deref(),
                OUTPUT_DIR_ENV,
                toml.output_dir.as_deref(),
                &defaults.output_dir,
            ),
            basic_pitch_bin: args
                .basic_pitch_bin
                .clone()
                .or_else(|| toml.basic_pitch_bin.clone())
                .unwrap_or(defaults.basic_pitch_bin),
            model_path: args.model_path.clone().or_else(|| toml.model_path.clone()),
            tempo_max_seconds,
            output_retention: args
                .output_retention_secs
                .or(toml.output_retention_secs)
                .map(Duration::from_secs),
            purge_on_startup: !args.no_purge,
            log_level: toml
                .logging
                .level
                .clone()
                .unwrap_or(defaults.log_level),
        })
    }

    pub fn work_dirs(&self) -> WorkDirs {
        WorkDirs::new(&self.upload_dir, &self.output_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    fn clear_env() {
        env::remove_var(UPLOAD_DIR_ENV);
        env::remove_var(OUTPUT_DIR_ENV);
    }

    fn parse(argv: &[&str]) -> ServerArgs {
        ServerArgs::try_parse_from(std::iter::once("np-server").chain(argv.iter().copied()))
            .unwrap()
    }

    #[test]
    #[serial]
    fn defaults_without_any_source() {
        clear_env();
        let config = ServiceConfig::resolve(&ServerArgs::default(), &TomlConfig::default()).unwrap();

        assert_eq!(config.upload_dir, PathBuf::from("uploads"));
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.basic_pitch_bin, "basic-pitch");
        assert!(config.model_path.is_none());
        assert_eq!(config.tempo_max_seconds, 60.0);
        assert!(config.output_retention.is_none());
        assert_eq!(config.log_level, "info");
    }

    #[test]
    #[serial]
    fn default_args_bind_localhost_8000() {
        let args = ServerArgs::default();
        assert_eq!(args.host, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(args.port, 8000);
        assert!(args.config.is_none());
        assert!(!args.no_purge);

        let config = ServiceConfig::resolve(&args, &TomlConfig::default()).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8000".parse::<SocketAddr>().unwrap());
        assert!(config.purge_on_startup);
    }

    #[test]
    #[serial]
    fn env_overrides_directories() {
        clear_env();
        env::set_var(UPLOAD_DIR_ENV, "/tmp/np-up");
        env::set_var(OUTPUT_DIR_ENV, "/tmp/np-out");

        let config = ServiceConfig::resolve(&ServerArgs::default(), &TomlConfig::default()).unwrap();
        clear_env();

        assert_eq!(config.upload_dir, PathBuf::from("/tmp/np-up"));
        assert_eq!(config.output_dir, PathBuf::from("/tmp/np-out"));
    }

    #[test]
    #[serial]
    fn arguments_override_toml() {
        clear_env();
        let args = parse(&[
            "--port",
            "9001",
            "--output-dir",
            "/srv/out",
            "--tempo-max-seconds",
            "30",
            "--output-retention-secs",
            "60",
            "--no-purge",
        ]);
        let toml = TomlConfig {
            output_dir: Some(PathBuf::from("/toml/out")),
            upload_dir: Some(PathBuf::from("/toml/up")),
            basic_pitch_bin: Some("/opt/bp/bin/basic-pitch".to_string()),
            tempo_max_seconds: Some(45.0),
            ..Default::default()
        };

        let config = ServiceConfig::resolve(&args, &toml).unwrap();

        assert_eq!(config.bind_addr.port(), 9001);
        assert_eq!(config.output_dir, PathBuf::from("/srv/out"));
        assert_eq!(config.upload_dir, PathBuf::from("/toml/up"));
        assert_eq!(config.basic_pitch_bin, "/opt/bp/bin/basic-pitch");
        assert_eq!(config.tempo_max_seconds, 30.0);
        assert_eq!(config.output_retention, Some(Duration::from_secs(60)));
        assert!(!config.purge_on_startup);
    }

    #[test]
    #[serial]
    fn rejects_non_positive_tempo_window() {
        clear_env();
        let args = ServerArgs {
            tempo_max_seconds: Some(0.0),
            ..Default::default()
        };
        let err = ServiceConfig::resolve(&args, &TomlConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
