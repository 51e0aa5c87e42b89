mod code;
mod path;

use std::{borrow::Cow, fmt::Display};

use async_graphql_parser::Pos;
use serde::ser::SerializeMap;

pub use code::ErrorCode;
pub use path::{ErrorPath, ErrorPathSegment};

/// Error returned by resolvers, validation hooks and input parsing.
///
/// Anything implementing [`Display`] converts into it, so resolvers can use `?` on
/// their own error types. The message reaches the client verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct Error {
    pub message: String,
    pub extensions: Vec<(String, serde_json::Value)>,
}

impl Error {
    pub fn new(message: impl Into<String>) -> Self {
        Error {
            message: message.into(),
            extensions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.extensions.push((key.into(), value.into()));
        self
    }

    pub(crate) fn into_graphql_error(self, code: ErrorCode) -> GraphqlError {
        GraphqlError::new(self.message, code).with_extensions(self.extensions)
    }
}

impl<T: Display + Send + Sync + 'static> From<T> for Error {
    fn from(error: T) -> Self {
        Error::new(error.to_string())
    }
}

pub type GraphqlResult<T> = Result<T, GraphqlError>;

/// An entry of the `errors` list of a response.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphqlError {
    pub message: Cow<'static, str>,
    pub code: ErrorCode,
    pub locations: Vec<Pos>,
    pub path: Option<ErrorPath>,
    // Serialized as a map, but kept as a Vec for efficiency.
    pub extensions: Vec<(Cow<'static, str>, serde_json::Value)>,
}

impl GraphqlError {
    pub fn new(message: impl Into<Cow<'static, str>>, code: ErrorCode) -> Self {
        GraphqlError {
            message: message.into(),
            code,
            locations: Vec::new(),
            path: None,
            extensions: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_location(mut self, location: Pos) -> Self {
        self.locations.push(location);
        self
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<ErrorPath>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_extension(mut self, key: impl Into<Cow<'static, str>>, value: impl Into<serde_json::Value>) -> Self {
        self.extensions.push((key.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_extensions(
        mut self,
        extensions: impl IntoIterator<Item = (impl Into<Cow<'static, str>>, impl Into<serde_json::Value>)>,
    ) -> Self {
        for (key, value) in extensions {
            self.extensions.push((key.into(), value.into()));
        }
        self
    }

    pub fn internal_server_error() -> Self {
        GraphqlError::new("Internal server error", ErrorCode::InternalServerError)
    }

    pub fn cancelled() -> Self {
        GraphqlError::new("Request was cancelled", ErrorCode::Cancelled)
    }
}

impl Display for GraphqlError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.message.fmt(f)
    }
}

impl serde::Serialize for GraphqlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        struct Location(Pos);

        impl serde::Serialize for Location {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                let mut map = serializer.serialize_map(Some(2))?;
                map.serialize_entry("line", &self.0.line)?;
                map.serialize_entry("column", &self.0.column)?;
                map.end()
            }
        }

        struct Extensions<'a>(&'a GraphqlError);

        impl serde::Serialize for Extensions<'_> {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                let mut map = serializer.serialize_map(Some(self.0.extensions.len() + 1))?;
                for (key, value) in &self.0.extensions {
                    if key != "code" {
                        map.serialize_entry(key, value)?;
                    }
                }
                map.serialize_entry("code", &self.0.code)?;
                map.end()
            }
        }

        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("message", &self.message)?;
        if !self.locations.is_empty() {
            let locations = self.locations.iter().copied().map(Location).collect::<Vec<_>>();
            map.serialize_entry("locations", &locations)?;
        }
        if let Some(path) = &self.path {
            map.serialize_entry("path", path)?;
        }
        map.serialize_entry("extensions", &Extensions(self))?;
        map.end()
    }
}
