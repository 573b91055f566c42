// Error types for the Trellis framework

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("application dependencies should be a list of non-empty dependency names")]
    InvalidDependencyList,

    #[error("dependency `{0}` not available or was not inited properly")]
    DependencyNotInited(String),

    #[error("cannot emit `{event}` while application state is `{state}`")]
    EmitBeforeLoad { event: String, state: String },

    #[error("response already sent, cannot resend")]
    CannotResend,

    #[error("`{0}` does not have authority to initiate navigation")]
    NoAuthority(String),

    #[error("redirect limit exceeded while resolving `{0}`")]
    RedirectLoop(String),

    #[error("invalid url `{0}`")]
    InvalidUrl(String),

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("invalid route pattern `{0}`")]
    InvalidPattern(String),

    #[error("no view engine registered for extension `{0}`")]
    NoViewEngine(String),

    #[error("failed to look up view `{0}`")]
    ViewLookup(String),

    #[error("render failed: {0}")]
    Render(String),

    #[error("handler failed: {0}")]
    Handler(String),
}

impl Error {
    /// Tagged code for error conditions that are reported through callbacks
    /// rather than raised at the call site.
    pub fn code(&self) -> Option<&'static str> {
        match self {
            Error::CannotResend => Some("CANTRESEND"),
            Error::NoAuthority(_) => Some("NOAUTHORITY"),
            _ => None,
        }
    }

    /// HTTP-style status a resolution pass ends with when this error
    /// surfaces through the response path.
    pub fn status_code(&self) -> u16 {
        match self {
            Error::InvalidUrl(_) | Error::UnknownMethod(_) => 400,
            _ => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tagged_codes() {
        assert_eq!(Error::CannotResend.code(), Some("CANTRESEND"));
        assert_eq!(Error::NoAuthority("a".into()).code(), Some("NOAUTHORITY"));
        assert_eq!(Error::Handler("x".into()).code(), None);
    }

    #[test]
    fn status_codes() {
        assert_eq!(Error::InvalidUrl("::".into()).status_code(), 400);
        assert_eq!(Error::Handler("boom".into()).status_code(), 500);
    }
}
