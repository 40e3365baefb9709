//! [`Config`]-related definitions.

use std::time;

use common::Percent;
use config::{builder::DefaultState, ConfigBuilder, ConfigError};
use secrecy::SecretString;
use serde::Deserialize;
use smart_default::SmartDefault;

/// Application configuration.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: Server,

    /// Service configuration.
    pub service: Service,

    /// Postgres configuration.
    pub postgres: Postgres,

    /// Log configuration.
    pub log: Log,
}

impl Config {
    /// Reads a new [`Config`], layering the file at the provided `path` (if
    /// it exists) under `CONF`-prefixed environment variables, with defaults
    /// filling anything left unset.
    ///
    /// # Errors
    ///
    /// If the resulting configuration is malformed.
    pub fn new(path: impl AsRef<str>) -> Result<Self, ConfigError> {
        ConfigBuilder::<DefaultState>::default()
            .add_source(config::File::with_name(path.as_ref()).required(false))
            .add_source(config::Environment::with_prefix("CONF").separator("."))
            .build()?
            .try_deserialize()
    }
}

/// HTTP server configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Server {
    /// Host the server binds to.
    #[default("0.0.0.0".to_owned())]
    pub host: String,

    /// Port the server binds to.
    #[default(8080)]
    pub port: u16,

    /// [CORS] configuration.
    ///
    /// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
    pub cors: Cors,
}

/// [CORS] configuration.
///
/// [CORS]: https://developer.mozilla.org/en-US/docs/Web/HTTP/CORS
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Cors {
    /// List of allowed origins.
    #[default(vec!["*".to_owned()])]
    pub origins: Vec<String>,
}

/// Service configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Service {
    /// Secret the payment-processor webhook signatures are keyed by.
    #[default(SecretString::from("secret"))]
    pub webhook_secret: SecretString,

    /// Service tasks configuration.
    pub tasks: Tasks,
}

impl From<Service> for service::Config {
    fn from(value: Service) -> Self {
        let Tasks {
            escalate_overdue_returns,
            send_return_reminders,
        } = value.tasks;

        let mut conf = Self::default();
        conf.escalate_overdue_returns.interval =
            escalate_overdue_returns.interval;
        if let Some(pct) = escalate_overdue_returns.late_fee_percent_per_day {
            conf.escalate_overdue_returns.late_fee_percent_per_day = pct;
        }
        conf.send_return_reminders.interval = send_return_reminders.interval;
        conf.send_return_reminders.enabled = send_return_reminders.enabled;
        conf
    }
}

/// Service tasks configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Tasks {
    /// `EscalateOverdueReturns` task configuration.
    pub escalate_overdue_returns: EscalateOverdueReturns,

    /// `SendReturnReminders` task configuration.
    pub send_return_reminders: SendReturnReminders,
}

/// `EscalateOverdueReturns` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct EscalateOverdueReturns {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60 * 60 * 24))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Late fee suggested per day a return is overdue, as a percent of the
    /// booking total.
    ///
    /// The service default applies when absent.
    pub late_fee_percent_per_day: Option<Percent>,
}

/// `SendReturnReminders` task configuration.
#[derive(Clone, Copy, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct SendReturnReminders {
    /// Task execution interval.
    #[default(time::Duration::from_secs(60 * 60 * 24))]
    #[serde(with = "humantime_serde")]
    pub interval: time::Duration,

    /// Whether return reminders are sent at all.
    #[default(true)]
    pub enabled: bool,
}

/// Postgres connection configuration.
#[derive(Clone, Debug, Deserialize, SmartDefault)]
#[serde(default)]
pub struct Postgres {
    /// Host of the database.
    #[default("127.0.0.1".to_owned())]
    pub host: String,

    /// Port of the database.
    #[default(5432)]
    pub port: u16,

    /// User to authenticate as.
    #[default("postgres".to_owned())]
    pub user: String,

    /// Password to authenticate with.
    #[default("postgres".to_owned())]
    pub password: String,

    /// Name of the database to use.
    #[default("postgres".to_owned())]
    pub dbname: String,
}

impl From<Postgres> for service::infra::postgres::Config {
    fn from(value: Postgres) -> Self {
        let Postgres {
            host,
            port,
            user,
            password,
            dbname,
        } = value;

        Self {
            host: Some(host),
            port: Some(port),
            user: Some(user),
            password: Some(password),
            dbname: Some(dbname),
            ..Self::default()
        }
    }
}

/// Log configuration.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Log {
    /// Log level.
    pub level: LogLevel,
}

/// Log level.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogLevel {
    /// Designates very low priority, often extremely verbose, information.
    Trace,

    /// Designates lower priority information.
    Debug,

    /// Designates useful information.
    #[default]
    Info,

    /// Designates hazardous situations.
    Warn,

    /// Designates very serious errors.
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(value: LogLevel) -> Self {
        match value {
            LogLevel::Trace => Self::TRACE,
            LogLevel::Debug => Self::DEBUG,
            LogLevel::Info => Self::INFO,
            LogLevel::Warn => Self::WARN,
            LogLevel::Error => Self::ERROR,
        }
    }
}
