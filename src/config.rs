use crate::companion::CompanionSettings;
use crate::error::{Error, Result};
use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::time::Duration;

/// Prefix for environment overrides, e.g. `DOTDOT_SERVER__PORT=8000`.
pub const ENV_PREFIX: &str = "DOTDOT";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, env = "CONFIG_FILE")]
    pub config: Option<String>,

    /// Address to bind
    #[arg(long, env = "BIND_HOST")]
    pub host: Option<String>,

    /// Port to listen on
    #[arg(long, env = "PORT")]
    pub port: Option<u16>,

    /// Seed for reply selection, for reproducible conversations
    #[arg(long, env = "COMPANION_SEED")]
    pub seed: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub companion: CompanionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompanionConfig {
    pub greeting: String,
    pub memory_duration_ms: u64,
    pub tick_interval_ms: u64,
    pub reply_delay_min_ms: u64,
    pub reply_delay_max_ms: u64,
    pub memory_resume_delay_ms: u64,
    pub identity_crisis_probability: f64,
    pub compliment_probability: f64,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        Self::load_from_args(std::env::args())
    }

    pub fn load_from_args<I, T>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        let cli =
            Cli::try_parse_from(args).map_err(|e| config::ConfigError::Message(e.to_string()))?;

        let defaults = CompanionSettings::default();
        let mut builder = Config::builder();

        // 1. Defaults
        builder = builder
            .set_default("server.port", 3000)?
            .set_default("server.host", "127.0.0.1")?
            .set_default("companion.greeting", defaults.greeting.as_str())?
            .set_default("companion.memory_duration_ms", millis(defaults.memory_duration))?
            .set_default("companion.tick_interval_ms", millis(defaults.tick_interval))?
            .set_default("companion.reply_delay_min_ms", millis(defaults.reply_delay_min))?
            .set_default("companion.reply_delay_max_ms", millis(defaults.reply_delay_max))?
            .set_default(
                "companion.memory_resume_delay_ms",
                millis(defaults.memory_resume_delay),
            )?
            .set_default(
                "companion.identity_crisis_probability",
                defaults.identity_crisis_probability,
            )?
            .set_default(
                "companion.compliment_probability",
                defaults.compliment_probability,
            )?;

        // 2. Config file: explicit path must exist, ./config.* is optional
        builder = match &cli.config {
            Some(path) => builder.add_source(File::with_name(path).required(true)),
            None => builder.add_source(File::with_name("config").required(false)),
        };

        // 3. Environment, e.g. DOTDOT_COMPANION__MEMORY_DURATION_MS=5000
        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        // 4. CLI flags (clap already folded in their own env vars)
        if let Some(host) = cli.host {
            builder = builder.set_override("server.host", host)?;
        }
        if let Some(port) = cli.port {
            builder = builder.set_override("server.port", i64::from(port))?;
        }
        if let Some(seed) = cli.seed {
            builder = builder.set_override("companion.seed", seed)?;
        }

        let cfg: AppConfig = builder.build()?.try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings the companion cannot run with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.companion;

        if c.memory_duration_ms == 0 {
            return Err(invalid("companion.memory_duration_ms", "must be positive"));
        }
        if c.tick_interval_ms == 0 {
            return Err(invalid("companion.tick_interval_ms", "must be positive"));
        }
        if c.reply_delay_min_ms > c.reply_delay_max_ms {
            return Err(invalid(
                "companion.reply_delay_min_ms",
                format!(
                    "{} exceeds reply_delay_max_ms {}",
                    c.reply_delay_min_ms, c.reply_delay_max_ms
                ),
            ));
        }
        for (key, p) in [
            (
                "companion.identity_crisis_probability",
                c.identity_crisis_probability,
            ),
            ("companion.compliment_probability", c.compliment_probability),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(invalid(key, format!("{p} is outside [0, 1]")));
            }
        }

        Ok(())
    }

    /// Socket address string for the server.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

impl From<&CompanionConfig> for CompanionSettings {
    fn from(c: &CompanionConfig) -> Self {
        Self {
            greeting: c.greeting.clone(),
            memory_duration: Duration::from_millis(c.memory_duration_ms),
            tick_interval: Duration::from_millis(c.tick_interval_ms),
            reply_delay_min: Duration::from_millis(c.reply_delay_min_ms),
            reply_delay_max: Duration::from_millis(c.reply_delay_max_ms),
            memory_resume_delay: Duration::from_millis(c.memory_resume_delay_ms),
            identity_crisis_probability: c.identity_crisis_probability,
            compliment_probability: c.compliment_probability,
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

fn invalid(key: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidSetting {
        key,
        reason: reason.into(),
    }
}
