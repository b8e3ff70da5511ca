use miette::Diagnostic;
use thiserror::Error;

use crate::provider::ProviderError;
use crate::remote::RemoteError;

#[derive(Debug, Error, Diagnostic)]
pub enum VmError {
    #[error("failed to load config from {path}")]
    #[diagnostic(help("create a config.toml in the project directory or pass --config"))]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("failed to construct the cloud API client: {message}")]
    ProviderClient { message: String },

    #[error("{operation} failed")]
    #[diagnostic(help("{hint}"))]
    Provider {
        operation: String,
        hint: String,
        #[source]
        source: ProviderError,
    },

    #[error("{operation} did not finish within {timeout_secs}s")]
    #[diagnostic(help("the resource may still settle; re-run the command to check its state"))]
    Timeout {
        operation: String,
        timeout_secs: u64,
    },

    #[error("delete stopped at '{step}' after completing [{completed}]")]
    #[diagnostic(help(
        "nothing was rolled back: the server and disk may be left detached but not deleted; \
         re-run --delete once the cause is fixed"
    ))]
    CascadeFailed {
        step: String,
        completed: String,
        #[source]
        source: ProviderError,
    },

    #[error("no server named '{hostname}' exists")]
    #[diagnostic(help("run with --create first"))]
    NotProvisioned { hostname: String },

    #[error("remote shell transport failed: {source}")]
    #[diagnostic(help("check that the server is up and that the password is correct"))]
    Transport {
        #[source]
        source: RemoteError,
    },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl VmError {
    /// Wrap a provider failure with the operation that hit it.
    ///
    /// Authentication rejections get a credential hint instead of the
    /// generic one.
    pub fn provider(operation: impl Into<String>, source: ProviderError) -> Self {
        let hint = if source.is_auth_failure() {
            "the API rejected the credentials; check token, secret and zone".to_string()
        } else {
            "check the zone and the cloud control panel for the resource state".to_string()
        };
        VmError::Provider {
            operation: operation.into(),
            hint,
            source,
        }
    }

    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            VmError::Timeout { .. } => 1,
            _ => 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_exits_with_one() {
        let err = VmError::Timeout {
            operation: "waiting for disk copy".into(),
            timeout_secs: 120,
        };
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn other_failures_exit_with_two() {
        let err = VmError::Validation {
            message: "cpu must be at least 1".into(),
        };
        assert_eq!(err.exit_code(), 2);

        let err = VmError::NotProvisioned {
            hostname: "demo".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn auth_failures_get_credential_hint() {
        let err = VmError::provider(
            "searching servers",
            ProviderError::Api {
                status: 401,
                message: "unauthorized".into(),
            },
        );
        match err {
            VmError::Provider { hint, .. } => assert!(hint.contains("credentials")),
            other => panic!("expected Provider, got {other:?}"),
        }
    }
}
