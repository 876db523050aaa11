use std::path::PathBuf;

/// Errors surfaced by the scanner, the backend operations and settings loading.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not a directory: {}", .0.display())]
    InvalidRoot(PathBuf),

    #[error("`clean` failed in {} ({status}): {stderr}", path.display())]
    CleanFailed {
        path: PathBuf,
        status: String,
        stderr: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Task(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_failure_message_names_the_directory() {
        let err = Error::CleanFailed {
            path: PathBuf::from("/work/app"),
            status: "exit status: 101".to_string(),
            stderr: "error: could not find `Cargo.toml`".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("/work/app"));
        assert!(text.contains("exit status: 101"));
    }

    #[test]
    fn io_errors_convert_transparently() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: Error = io.into();
        assert_eq!(err.to_string(), "denied");
    }
}
