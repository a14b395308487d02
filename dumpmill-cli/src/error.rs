//! CLI error type.

use std::fmt;

use dumpmill::catalog::CatalogError;
use dumpmill::config::ConfigError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Loading or saving the configuration failed.
    Config(String),
    /// A catalog operation failed.
    Catalog(String),
    /// The requested dataset is not in the catalog.
    NotFound(String),
    /// A pipeline stage failed.
    Operation(String),
    /// The user canceled the operation.
    Canceled,
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(reason) => write!(f, "configuration error: {}", reason),
            Self::Catalog(reason) => write!(f, "catalog error: {}", reason),
            Self::NotFound(id) => write!(
                f,
                "dataset not found: {} (run `dumpmill status` to list known datasets)",
                id
            ),
            Self::Operation(reason) => write!(f, "{}", reason),
            Self::Canceled => write!(f, "operation canceled"),
        }
    }
}

impl std::error::Error for CliError {}

impl From<CatalogError> for CliError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err.to_string())
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            CliError::Config("bad value".into()).to_string(),
            "configuration error: bad value"
        );
        assert!(CliError::NotFound("discogs_20240101_releases".into())
            .to_string()
            .contains("dumpmill status"));
        assert_eq!(CliError::Canceled.to_string(), "operation canceled");
    }
}
