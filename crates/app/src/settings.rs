//! Application settings, read from an optional `settings.toml` next to the
//! binary and overridden by `CHAMASMART__*` environment variables
//! (`CHAMASMART__SERVER__PORT=8080`).
//!
//! See `settings.example.toml`.
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    /// Tracing level for the ChamaSmart crates (`info`, `debug`, ...).
    pub level: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    Memory,
    Sqlite(String),
}

#[derive(Debug, Deserialize)]
pub struct Server {
    pub bind: Option<String>,
    pub port: u16,
    pub database: Database,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub server: Server,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        Self::from_config(
            Config::builder()
                .set_default("app.level", "info")?
                .set_default("server.port", 3000)?
                .set_default("server.database", "memory")?
                .add_source(File::with_name("settings").required(false))
                .add_source(Environment::with_prefix("CHAMASMART").separator("__"))
                .build()?,
        )
    }

    fn from_config(config: Config) -> Result<Self, ConfigError> {
        config.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use config::FileFormat;

    use super::*;

    fn parse(toml: &str) -> Result<Settings, ConfigError> {
        Settings::from_config(
            Config::builder()
                .add_source(File::from_str(toml, FileFormat::Toml))
                .build()?,
        )
    }

    #[test]
    fn reads_a_sqlite_database() {
        let settings = parse(
            r#"
            [app]
            level = "debug"

            [server]
            bind = "0.0.0.0"
            port = 8080
            database = { sqlite = "/var/lib/chamasmart/chamasmart.db" }
            "#,
        )
        .unwrap();
        assert_eq!(settings.app.level, "debug");
        assert_eq!(settings.server.bind.as_deref(), Some("0.0.0.0"));
        assert_eq!(settings.server.port, 8080);
        assert!(matches!(
            settings.server.database,
            Database::Sqlite(ref path) if path == "/var/lib/chamasmart/chamasmart.db"
        ));
    }

    #[test]
    fn reads_an_in_memory_database() {
        let settings = parse(
            r#"
            [app]
            level = "info"

            [server]
            port = 3000
            database = "memory"
            "#,
        )
        .unwrap();
        assert!(settings.server.bind.is_none());
        assert!(matches!(settings.server.database, Database::Memory));
    }
}
