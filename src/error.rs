//! Errors raised by the configuration and bridge surfaces.
//!
//! Diagnosing a commit never fails; only reading configuration and moving data to
//! the viewer can.

/// Error type for the fallible parts of `whyrender`.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A configuration document or viewer payload was not valid JSON for its type.
    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {name}: {value:?}")]
    InvalidEnv {
        /// Variable name.
        name: &'static str,
        /// Raw value found in the environment.
        value: String,
    },

    /// The push interval was configured as zero.
    #[error("push interval must be greater than zero")]
    ZeroInterval,

    /// An action rule carried a selector outside the supported grammar.
    #[error("unsupported selector `{0}`")]
    InvalidSelector(String),

    /// The other end of the viewer channel is gone.
    #[error("viewer channel closed")]
    ChannelClosed,

    /// A cross-window message arrived from an origin that is not trusted.
    #[error("rejected message from untrusted origin {0}")]
    UntrustedOrigin(String),
}

/// Result alias using [`Error`].
pub type Result<T, E = Error> = core::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::ZeroInterval.to_string(),
            "push interval must be greater than zero"
        );
        assert_eq!(
            Error::InvalidSelector("a > b".into()).to_string(),
            "unsupported selector `a > b`"
        );
        assert_eq!(
            Error::InvalidEnv {
                name: "WHYRENDER_ORIGIN",
                value: String::new(),
            }
            .to_string(),
            "invalid value for WHYRENDER_ORIGIN: \"\""
        );
    }

    #[test]
    fn test_json_error_converts() {
        let err: Error = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, Error::Json(_)));
    }
}
