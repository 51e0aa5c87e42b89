use async_graphql_value::Name;

/// Response path of a field, as reported in the `path` entry of an error.
#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ErrorPath(Vec<ErrorPathSegment>);

impl std::ops::Deref for ErrorPath {
    type Target = Vec<ErrorPathSegment>;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl std::ops::DerefMut for ErrorPath {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ErrorPathSegment {
    Field(Name),
    Index(usize),
}

impl ErrorPath {
    pub fn root(key: &Name) -> Self {
        ErrorPath(vec![ErrorPathSegment::Field(key.clone())])
    }

    #[must_use]
    pub fn field(&self, key: &Name) -> Self {
        let mut path = self.clone();
        path.0.push(ErrorPathSegment::Field(key.clone()));
        path
    }

    #[must_use]
    pub fn index(&self, index: usize) -> Self {
        let mut path = self.clone();
        path.0.push(ErrorPathSegment::Index(index));
        path
    }
}

impl From<Vec<ErrorPathSegment>> for ErrorPath {
    fn from(segments: Vec<ErrorPathSegment>) -> Self {
        ErrorPath(segments)
    }
}

impl std::fmt::Display for ErrorPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            match segment {
                ErrorPathSegment::Field(name) => f.write_str(name)?,
                ErrorPathSegment::Index(index) => write!(f, "{index}")?,
            }
        }
        Ok(())
    }
}

impl serde::Serialize for ErrorPath {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;

        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for segment in &self.0 {
            match segment {
                ErrorPathSegment::Field(name) => seq.serialize_element(name.as_str())?,
                ErrorPathSegment::Index(index) => seq.serialize_element(index)?,
            }
        }
        seq.end()
    }
}
