use hyper::StatusCode;
use thiserror::Error;

#[macro_export]
macro_rules! error_context {
    () => {
        concat!("at ", file!(), " line ", line!(), " column ", column!())
    };
}

/// Everything that can go wrong while verifying a candidate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CheckError {
    /// A required request parameter was absent or empty.
    #[error("parameter '{0}' is required")]
    MissingParameter(&'static str),

    /// A batch token or request body could not be read as a candidate list.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// The identity echo service did not answer in time or answered with an error status.
    #[error("identity service unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Every probe strategy failed. Surfaced as the UNREACHABLE verdict, never as a request failure.
    #[error("proxy unreachable: {}", .0.join("; "))]
    ProbeUnreachable(Vec<String>),

    /// A request body grew past the accepted size.
    #[error("request body exceeds {0} bytes")]
    PayloadTooLarge(usize),

    /// The upstream body could not be read as an identity snapshot.
    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

impl CheckError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            CheckError::MissingParameter(_) | CheckError::InvalidFormat(_) => {
                StatusCode::BAD_REQUEST
            }
            CheckError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            CheckError::UpstreamUnavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
            CheckError::ProbeUnreachable(_) => StatusCode::OK,
            CheckError::MalformedResponse(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// An example of correct usage, for errors caused by the caller.
    pub fn usage(&self) -> Option<&'static str> {
        match self {
            CheckError::MissingParameter("proxies")
            | CheckError::InvalidFormat(_)
            | CheckError::PayloadTooLarge(_) => Some(
                "POST /api/batch with {\"proxies\": [\"1.2.3.4:8080\", \"5.6.7.8,3128\"]}",
            ),
            CheckError::MissingParameter(_) => Some("GET /api/check?ip=1.2.3.4&port=8080"),
            _ => None,
        }
    }
}
