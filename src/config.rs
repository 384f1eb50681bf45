//! Process configuration read from environment variables.
//!
//! The configuration is validated once at startup with [Config::from_env] and
//! then passed down to whatever needs it. Every problem with the environment
//! is collected into a single [ConfigError] so that the operator can fix them
//! all at once.

use std::{
    env,
    fmt::{self, Display},
    path::{Path, PathBuf},
    str::FromStr,
};

/// The port the server listens on when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 3333;

/// The name of the variable selecting the environment.
pub const NODE_ENV: &str = "NODE_ENV";
/// The name of the variable selecting the database backend.
pub const DATABASE_CLIENT: &str = "DATABASE_CLIENT";
/// The name of the variable holding the database location.
pub const DATABASE_URL: &str = "DATABASE_URL";
/// The name of the variable holding the port to listen on.
pub const PORT: &str = "PORT";
/// The name of the optional variable used to derive the cookie key.
pub const SESSION_SECRET: &str = "SESSION_SECRET";

/// The environment the application is running in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    /// Local development.
    Development,
    /// Automated tests.
    Test,
    /// A deployed server.
    #[default]
    Production,
}

impl AppEnvironment {
    /// The log filter to use when `RUST_LOG` is not set.
    pub fn default_log_filter(self) -> &'static str {
        match self {
            AppEnvironment::Development => "debug",
            AppEnvironment::Test => "warn",
            AppEnvironment::Production => "info",
        }
    }
}

impl FromStr for AppEnvironment {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "development" => Ok(AppEnvironment::Development),
            "test" => Ok(AppEnvironment::Test),
            "production" => Ok(AppEnvironment::Production),
            _ => Err(()),
        }
    }
}

impl Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Test => "test",
            AppEnvironment::Production => "production",
        };

        write!(f, "{name}")
    }
}

/// The kind of database named by `DATABASE_URL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseClient {
    /// A SQLite database file, or `:memory:`.
    Sqlite,
    /// A PostgreSQL connection string.
    Pg,
}

impl FromStr for DatabaseClient {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(DatabaseClient::Sqlite),
            "pg" => Ok(DatabaseClient::Pg),
            _ => Err(()),
        }
    }
}

impl Display for DatabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseClient::Sqlite => write!(f, "sqlite"),
            DatabaseClient::Pg => write!(f, "pg"),
        }
    }
}

/// A single problem with one environment variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvIssue {
    /// A required variable was not set.
    Missing(&'static str),
    /// A variable was set to a value outside of what it accepts.
    Invalid {
        /// The name of the variable.
        name: &'static str,
        /// The value that was rejected.
        value: String,
        /// A description of the accepted values.
        expected: &'static str,
    },
}

impl Display for EnvIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvIssue::Missing(name) => write!(f, "{name} is required"),
            EnvIssue::Invalid {
                name,
                value,
                expected,
            } => write!(f, "{name}=\"{value}\" is invalid, expected {expected}"),
        }
    }
}

/// The errors that prevent the application from starting.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    /// One or more environment variables are missing or have the wrong type.
    #[error("invalid environment variables: {}", join_issues(.0))]
    InvalidEnvironment(Vec<EnvIssue>),

    /// The configured database client has no backend in this build.
    #[error("the database client \"{0}\" is not supported, use \"sqlite\"")]
    UnsupportedDatabaseClient(DatabaseClient),

    /// A dotenv file exists but could not be read.
    #[error("could not load the env file {path:?}: {message}")]
    EnvFile {
        /// The file that failed to load.
        path: PathBuf,
        /// The underlying error as a string.
        message: String,
    },
}

fn join_issues(issues: &[EnvIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// The validated configuration for the application.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// The environment the application is running in.
    pub environment: AppEnvironment,
    /// Which database backend `database_url` refers to.
    pub database_client: DatabaseClient,
    /// Where the database lives, e.g. a file path for SQLite.
    pub database_url: String,
    /// The port to serve the API from.
    pub port: u16,
    /// The secret used to derive the key for session cookies.
    pub session_secret: Option<String>,
}

impl Config {
    /// Read and validate the configuration from the process environment.
    ///
    /// # Errors
    /// Returns [ConfigError::InvalidEnvironment] listing every variable that
    /// is missing or invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Read and validate the configuration using `lookup` to get the value
    /// of each variable.
    ///
    /// # Errors
    /// Returns [ConfigError::InvalidEnvironment] listing every variable that
    /// is missing or invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut issues = Vec::new();

        let environment = match lookup(NODE_ENV) {
            None => Some(AppEnvironment::default()),
            Some(value) => parse_or_record(
                NODE_ENV,
                value,
                "one of development, test, production",
                &mut issues,
            ),
        };

        let database_client = match lookup(DATABASE_CLIENT) {
            None => {
                issues.push(EnvIssue::Missing(DATABASE_CLIENT));
                None
            }
            Some(value) => {
                parse_or_record(DATABASE_CLIENT, value, "one of sqlite, pg", &mut issues)
            }
        };

        let database_url = lookup(DATABASE_URL);
        if database_url.is_none() {
            issues.push(EnvIssue::Missing(DATABASE_URL));
        }

        let port = match lookup(PORT) {
            None => Some(DEFAULT_PORT),
            Some(value) => match value.trim().parse::<u16>() {
                Ok(port) => Some(port),
                Err(_) => {
                    issues.push(EnvIssue::Invalid {
                        name: PORT,
                        value,
                        expected: "a port number between 0 and 65535",
                    });
                    None
                }
            },
        };

        let session_secret = lookup(SESSION_SECRET).filter(|secret| !secret.is_empty());

        match (environment, database_client, database_url, port) {
            (Some(environment), Some(database_client), Some(database_url), Some(port))
                if issues.is_empty() =>
            {
                Ok(Self {
                    environment,
                    database_client,
                    database_url,
                    port,
                    session_secret,
                })
            }
            _ => Err(ConfigError::InvalidEnvironment(issues)),
        }
    }
}

fn parse_or_record<T: FromStr>(
    name: &'static str,
    value: String,
    expected: &'static str,
    issues: &mut Vec<EnvIssue>,
) -> Option<T> {
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            issues.push(EnvIssue::Invalid {
                name,
                value,
                expected,
            });
            None
        }
    }
}

/// Load variables from a dotenv file into the process environment.
///
/// If `path` is `None`, `.env.test` is used when `NODE_ENV` is `test` and
/// `.env` otherwise. Variables that are already set are not overwritten.
/// A missing file is not an error.
///
/// Returns the path of the file that was loaded, if any.
///
/// # Errors
/// Returns [ConfigError::EnvFile] if the file exists but cannot be parsed.
pub fn load_env_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None if env::var(NODE_ENV).as_deref() == Ok("test") => PathBuf::from(".env.test"),
        None => PathBuf::from(".env"),
    };

    match dotenvy::from_path(&path) {
        Ok(()) => Ok(Some(path)),
        Err(error) if error.not_found() => Ok(None),
        Err(error) => Err(ConfigError::EnvFile {
            path,
            message: error.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::{
        AppEnvironment, Config, ConfigError, DATABASE_CLIENT, DATABASE_URL, DEFAULT_PORT,
        DatabaseClient, EnvIssue, NODE_ENV, PORT, load_env_file,
    };

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();

        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            (DATABASE_CLIENT, "sqlite"),
            (DATABASE_URL, "./db/app.db"),
        ]))
        .unwrap();

        assert_eq!(
            config,
            Config {
                environment: AppEnvironment::Production,
                database_client: DatabaseClient::Sqlite,
                database_url: "./db/app.db".to_owned(),
                port: DEFAULT_PORT,
                session_secret: None,
            }
        );
    }

    #[test]
    fn reads_all_variables() {
        let config = Config::from_lookup(lookup_from(&[
            (NODE_ENV, "test"),
            (DATABASE_CLIENT, "pg"),
            (DATABASE_URL, "postgres://localhost/ledger"),
            (PORT, "8080"),
            ("SESSION_SECRET", "hunter2"),
        ]))
        .unwrap();

        assert_eq!(config.environment, AppEnvironment::Test);
        assert_eq!(config.database_client, DatabaseClient::Pg);
        assert_eq!(config.database_url, "postgres://localhost/ledger");
        assert_eq!(config.port, 8080);
        assert_eq!(config.session_secret.as_deref(), Some("hunter2"));
    }

    #[test]
    fn missing_required_variables_fail() {
        let result = Config::from_lookup(lookup_from(&[]));

        assert_eq!(
            result,
            Err(ConfigError::InvalidEnvironment(vec![
                EnvIssue::Missing(DATABASE_CLIENT),
                EnvIssue::Missing(DATABASE_URL),
            ]))
        );
    }

    #[test]
    fn reports_every_invalid_variable() {
        let result = Config::from_lookup(lookup_from(&[
            (NODE_ENV, "staging"),
            (DATABASE_CLIENT, "mysql"),
            (DATABASE_URL, "./db/app.db"),
            (PORT, "not a number"),
        ]));

        let Err(ConfigError::InvalidEnvironment(issues)) = result else {
            panic!("want invalid environment error, got {result:?}");
        };

        let names: Vec<_> = issues
            .iter()
            .map(|issue| match issue {
                EnvIssue::Invalid { name, .. } => *name,
                EnvIssue::Missing(name) => panic!("{name} should not be reported missing"),
            })
            .collect();
        assert_eq!(names, vec![NODE_ENV, DATABASE_CLIENT, PORT]);
    }

    #[test]
    fn rejects_port_out_of_range() {
        let result = Config::from_lookup(lookup_from(&[
            (DATABASE_CLIENT, "sqlite"),
            (DATABASE_URL, ":memory:"),
            (PORT, "70000"),
        ]));

        assert_eq!(
            result,
            Err(ConfigError::InvalidEnvironment(vec![EnvIssue::Invalid {
                name: PORT,
                value: "70000".to_owned(),
                expected: "a port number between 0 and 65535",
            }]))
        );
    }

    #[test]
    fn error_message_names_variables() {
        let error = Config::from_lookup(lookup_from(&[(DATABASE_CLIENT, "sqlite")])).unwrap_err();

        let message = error.to_string();

        assert!(message.contains("DATABASE_URL is required"), "{message}");
    }

    #[test]
    fn missing_env_file_is_not_an_error() {
        let result = load_env_file(Some(std::path::Path::new("./does/not/exist.env")));

        assert_eq!(result, Ok(None));
    }
}
