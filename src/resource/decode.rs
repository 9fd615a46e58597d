use serde_json::Value;

use crate::error::{Error, Sentinel};
use crate::http::Request;
use crate::model::Model;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyFormat {
    Json,
    Yaml,
    Xml,
}

impl BodyFormat {
    fn of(request: &Request) -> Self {
        match request.content_type() {
            Some(ct) if ct.contains("yaml") => Self::Yaml,
            Some(ct) if ct.ends_with("/xml") => Self::Xml,
            _ => Self::Json,
        }
    }

    fn invalid(self) -> Sentinel {
        match self {
            Self::Json => Sentinel::INVALID_JSON,
            Self::Yaml => Sentinel::INVALID_YAML,
            Self::Xml => Sentinel::INVALID_XML,
        }
    }
}

/// Decodes the request body over `item`.
///
/// Fields present in the body replace the item's values (nested objects merge
/// key by key); fields the body leaves out keep whatever `item` held. The
/// result reaches `item` through [`Model::assign`].
///
/// JSON bodies are expected unless the content type names YAML. XML bodies
/// are rejected with [`Sentinel::INVALID_XML`].
pub fn decode_into<M: Model>(item: &mut M, request: &Request) -> Result<(), Error> {
    let format = BodyFormat::of(request);
    let body = request.body();

    let patch: Value = match format {
        _ if body.is_empty() => return Err(format.invalid().into()),
        BodyFormat::Json => serde_json::from_slice(body).map_err(|_| format.invalid())?,
        BodyFormat::Yaml => serde_yaml::from_slice(body).map_err(|_| format.invalid())?,
        BodyFormat::Xml => return Err(format.invalid().into()),
    };

    let mut tree = serde_json::to_value(&*item).map_err(Error::other)?;
    merge(&mut tree, patch);

    let decoded: M = serde_json::from_value(tree).map_err(|err| {
        tracing::debug!(error = %err, "request body does not fit the model");
        format.invalid()
    })?;
    item.assign(decoded);
    Ok(())
}

fn merge(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(base.entry(key).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_is_deep_for_objects_only() {
        let mut base = json!({
            "title": "a",
            "meta": {"tags": ["x"], "pinned": false},
            "count": 1
        });
        merge(
            &mut base,
            json!({"meta": {"tags": ["y", "z"]}, "count": null, "extra": 2}),
        );
        assert_eq!(
            base,
            json!({
                "title": "a",
                "meta": {"tags": ["y", "z"], "pinned": false},
                "count": null,
                "extra": 2
            })
        );
    }

    #[test]
    fn non_object_patch_replaces() {
        let mut base = json!({"a": 1});
        merge(&mut base, json!([1, 2]));
        assert_eq!(base, json!([1, 2]));
    }

    #[test]
    fn body_format_from_content_type() {
        let parse = |ct: &str| {
            let raw = format!("POST / HTTP/1.1\r\nContent-Type: {ct}\r\n\r\n");
            Request::parse(raw.as_bytes()).unwrap().0
        };
        assert_eq!(BodyFormat::of(&parse("application/json; charset=utf-8")), BodyFormat::Json);
        assert_eq!(BodyFormat::of(&parse("application/x-yaml")), BodyFormat::Yaml);
        assert_eq!(BodyFormat::of(&parse("text/yaml")), BodyFormat::Yaml);
        assert_eq!(BodyFormat::of(&parse("text/xml")), BodyFormat::Xml);
        assert_eq!(BodyFormat::of(&parse("application/xml")), BodyFormat::Xml);
    }
}
