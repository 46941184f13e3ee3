use thiserror::Error;

/// A poll against one host failed before a body was received.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// The register report could not be turned into records.
///
/// Any of these discards the whole batch for that host and tick.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed XML: {0}")]
    Xml(String),
    #[error("report has no data node")]
    MissingData,
    #[error("data node has no register collection")]
    MissingRegisters,
    #[error("register #{index} has no attributes")]
    MissingAttributes { index: usize },
    #[error("register #{index} has no reading element")]
    MissingReading { index: usize },
    #[error("register #{index} has no name attribute")]
    MissingName { index: usize },
    #[error("register `{register}` has non-numeric value `{value}`")]
    InvalidReading { register: String, value: String },
}

impl From<quick_xml::Error> for ParseError {
    fn from(err: quick_xml::Error) -> Self {
        ParseError::Xml(err.to_string())
    }
}

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} not set, not starting")]
    Missing(&'static str),
    #[error("{0} contains no hosts")]
    NoHosts(&'static str),
    #[error("{name} has invalid value `{value}`")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("bus rejected message for {topic}: {reason}")]
    Rejected { topic: String, reason: String },
    #[error("could not encode snapshot: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Failure of one host's chain for one tick.
#[derive(Debug, Error)]
pub enum CycleError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Parse(#[from] ParseError),
}
