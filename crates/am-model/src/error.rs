//! Error types for model invocation.

use std::time::Duration;

use thiserror::Error;

pub type AmResult<T> = Result<T, AmError>;

#[derive(Debug, Error)]
pub enum AmError {
    #[error("Failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error talking to am: {0}")]
    Io(#[from] std::io::Error),

    #[error("am did not finish within {0:?}")]
    Timeout(Duration),

    #[error("saw returncode of {}", describe_code(.code))]
    BadExit {
        code: Option<i32>,
        stdout: String,
        stderr: String,
    },

    #[error("am output incomplete: {0}")]
    OutputIncomplete(String),
}

impl AmError {
    /// Captured streams, when the model got far enough to produce them.
    pub fn streams(&self) -> Option<(&str, &str)> {
        match self {
            AmError::BadExit { stdout, stderr, .. } => Some((stdout, stderr)),
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bad_exit_message() {
        let err = AmError::BadExit {
            code: Some(3),
            stdout: String::new(),
            stderr: "! Error: parse error.".to_string(),
        };
        assert_eq!(err.to_string(), "saw returncode of 3");
        assert_eq!(err.streams(), Some(("", "! Error: parse error.")));

        let killed = AmError::BadExit {
            code: None,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert!(killed.to_string().contains("signal"));
        assert!(AmError::Timeout(Duration::from_secs(1)).streams().is_none());
    }
}
