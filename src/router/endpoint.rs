use serde::{Serialize, Serializer};

use crate::http::Method;

/// A registered API endpoint, kept for documentation.
///
/// Exactly one is recorded per registration call, even when the path expands
/// to several physical routes for format suffixes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Endpoint {
    #[serde(rename = "type", serialize_with = "method_name")]
    pub method: Method,
    pub path: String,
}

impl Endpoint {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
        }
    }
}

fn method_name<S: Serializer>(method: &Method, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(method.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_method_as_verb() {
        let endpoint = Endpoint::new(Method::Patch, "/notes/:id");
        assert_eq!(
            serde_json::to_string(&endpoint).unwrap(),
            r#"{"type":"PATCH","path":"/notes/:id"}"#
        );
    }
}
