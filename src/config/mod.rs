mod settings;

use std::path::Path;

use crate::config::settings::PartialSettings;
use config::{Config, ConfigError, Environment, File};

pub use settings::{ConnectionSettings, DrainSettings, LogSettings, Settings};

/// Prefix of environment variables read as configuration, e.g.
/// `QUEUECAT__CONNECTION__HOST`.
pub const ENV_PREFIX: &str = "QUEUECAT";

/// Loads the configuration from the default file, an optional explicit file
/// and environment variables, in increasing order of precedence.
/// Merges the result with default values.
pub fn load_config(explicit: Option<&Path>) -> Result<Settings, ConfigError> {
    let mut builder =
        Config::builder().add_source(File::with_name("config/default").required(false));

    if let Some(path) = explicit {
        builder = builder.add_source(File::from(path).required(true));
    }

    let config = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;

    // Try to deserialize what is available
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(merge(partial, Settings::default()))
}

fn merge(partial: PartialSettings, default: Settings) -> Settings {
    let connection = partial.connection.as_ref();
    let drain = partial.drain.as_ref();
    let log = partial.log.as_ref();

    Settings {
        connection: ConnectionSettings {
            host: connection
                .and_then(|c| c.host.clone())
                .unwrap_or(default.connection.host),
            port: connection
                .and_then(|c| c.port)
                .unwrap_or(default.connection.port),
            username: connection
                .and_then(|c| c.username.clone())
                .unwrap_or(default.connection.username),
            password: connection
                .and_then(|c| c.password.clone())
                .unwrap_or(default.connection.password),
            vhost: connection
                .and_then(|c| c.vhost.clone())
                .unwrap_or(default.connection.vhost),
        },
        drain: DrainSettings {
            prefetch: drain
                .and_then(|d| d.prefetch)
                .unwrap_or(default.drain.prefetch),
            prefix: drain
                .and_then(|d| d.prefix.clone())
                .unwrap_or(default.drain.prefix),
            separator: drain
                .and_then(|d| d.separator.clone())
                .unwrap_or(default.drain.separator),
            postfix: drain
                .and_then(|d| d.postfix.clone())
                .unwrap_or(default.drain.postfix),
        },
        log: LogSettings {
            level: log
                .and_then(|l| l.level.clone())
                .unwrap_or(default.log.level),
        },
    }
}
