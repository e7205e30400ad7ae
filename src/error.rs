use std::fmt;

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the library
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    SerializationError(String),
    InvalidArgument(String),
    ConfigError(String),
    /// Every defect found in the `servers` configuration, across all entries.
    MalformedServers(Vec<ServerConfigIssue>),
    /// An example payload contained a value kind the inferrer does not describe.
    UnsupportedExampleValue { path: String, kind: &'static str },
    /// An observation lacks evidence needed to build its operation.
    IncompleteObservation(String),
}

/// A single problem with one field of one configured server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfigIssue {
    /// Zero-based position of the server in the configuration list
    pub index: usize,
    /// Human readable description of the offending field
    pub message: String,
}

impl ServerConfigIssue {
    pub fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "IO error: {}", e),
            Error::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            Error::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            Error::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            Error::MalformedServers(issues) => write_server_issues(f, issues),
            Error::UnsupportedExampleValue { path, kind } => write!(
                f,
                "Unsupported example value at [{}]: a {} can not be described by a schema",
                path, kind
            ),
            Error::IncompleteObservation(msg) => write!(f, "Incomplete observation: {}", msg),
        }
    }
}

/// Groups the issues per server so one message lists every defect.
fn write_server_issues(f: &mut fmt::Formatter, issues: &[ServerConfigIssue]) -> fmt::Result {
    write!(
        f,
        "Looks like something went wrong while reading your servers configuration."
    )?;

    let mut indexes: Vec<usize> = issues.iter().map(|issue| issue.index).collect();
    indexes.sort_unstable();
    indexes.dedup();

    for index in indexes {
        write!(
            f,
            "\n\nValidation failed with errors for the {} server:",
            ordinal(index + 1)
        )?;
        for issue in issues.iter().filter(|issue| issue.index == index) {
            write!(f, "\n  - {}", issue.message)?;
        }
    }

    Ok(())
}

/// Formats a number as an English ordinal (1st, 2nd, 3rd, 4th, 11th, ...).
pub fn ordinal(number: usize) -> String {
    let suffix = match (number % 10, number % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{}{}", number, suffix)
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Error::SerializationError(format!("YAML error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(3), "3rd");
        assert_eq!(ordinal(4), "4th");
        assert_eq!(ordinal(11), "11th");
        assert_eq!(ordinal(12), "12th");
        assert_eq!(ordinal(13), "13th");
        assert_eq!(ordinal(21), "21st");
        assert_eq!(ordinal(112), "112th");
    }

    #[test]
    fn test_malformed_servers_message_lists_every_issue() {
        let error = Error::MalformedServers(vec![
            ServerConfigIssue::new(0, "The [url] is required."),
            ServerConfigIssue::new(0, "The variable [customerId] must be an object."),
            ServerConfigIssue::new(0, "The variable [port] must be an object."),
        ]);

        let message = error.to_string();

        assert!(message.starts_with("Looks like something went wrong while reading your servers configuration"));
        assert!(message.contains("The [url] is required."));
        assert!(message.contains("The variable [port] must be an object."));
        assert!(message.contains("The variable [customerId] must be an object."));
        assert_eq!(message.matches("Validation failed").count(), 1);
    }

    #[test]
    fn test_malformed_servers_message_groups_per_server() {
        let issues = (0..4)
            .map(|index| ServerConfigIssue::new(index, "The [url] is required."))
            .collect();
        let message = Error::MalformedServers(issues).to_string();

        assert!(message.contains("Validation failed with errors for the 1st server"));
        assert!(message.contains("Validation failed with errors for the 2nd server"));
        assert!(message.contains("Validation failed with errors for the 3rd server"));
        assert!(message.contains("Validation failed with errors for the 4th server"));
    }

    #[test]
    fn test_unsupported_example_value_message() {
        let error = Error::UnsupportedExampleValue {
            path: "data.active".to_string(),
            kind: "boolean",
        };

        assert_eq!(
            error.to_string(),
            "Unsupported example value at [data.active]: a boolean can not be described by a schema"
        );
    }
}
