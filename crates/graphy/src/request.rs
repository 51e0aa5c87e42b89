use crate::{config::PayloadError, types::Variables};

/// A GraphQL request as sent by clients.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub query: String,
    #[serde(default)]
    pub operation_name: Option<String>,
    #[serde(default)]
    pub variables: Variables,
}

impl Request {
    pub fn new(query: impl Into<String>) -> Self {
        Request {
            query: query.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn operation_name(mut self, name: impl Into<String>) -> Self {
        self.operation_name = Some(name.into());
        self
    }

    #[must_use]
    pub fn variables(mut self, variables: Variables) -> Self {
        self.variables = variables;
        self
    }
}

impl From<&str> for Request {
    fn from(query: &str) -> Self {
        Request::new(query)
    }
}

impl From<String> for Request {
    fn from(query: String) -> Self {
        Request::new(query)
    }
}

/// Failures of the JSON entry points that cannot be reported inside a response.
#[derive(Debug, thiserror::Error)]
pub enum RequestError {
    #[error("variables are not a valid JSON object: {0}")]
    InvalidVariables(serde_json::Error),
    #[error(transparent)]
    Payload(#[from] PayloadError),
    #[error("failed to serialize the response: {0}")]
    Serialization(#[from] serde_json::Error),
    /// The subscription could not be started.
    #[error("{}", .0.message)]
    Rejected(crate::GraphqlError),
}

pub(crate) fn parse_variables(json: &str) -> Result<Variables, RequestError> {
    if json.trim().is_empty() {
        return Ok(Variables::default());
    }

    serde_json::from_str(json)
        .and_then(Variables::from_json)
        .map_err(RequestError::InvalidVariables)
}
