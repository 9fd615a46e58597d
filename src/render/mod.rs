//! Response rendering in binary, JSON, JSONP, XML and YAML.
//!
//! Every renderer serializes the whole payload into memory first and only then
//! builds the [`Response`], so a serialization failure can never leave a
//! half-written body behind a status line that already went out. On failure
//! the caller gets a [`RenderError`]; [`RenderError::into_response`] turns it
//! into a best-effort plain-text response carrying the error message.
//!
//! | Format | Content-Type                        |
//! |--------|-------------------------------------|
//! | binary | `application/octet-stream`          |
//! | JSON   | `application/json; charset=UTF-8`   |
//! | JSONP  | `application/json; charset=UTF-8`   |
//! | XML    | `text/xml; charset=UTF-8`           |
//! | YAML   | `text/x-yaml`                       |

use serde::Serialize;
use thiserror::Error;

use crate::http::{Response, StatusCode};

pub const BINARY_CONTENT_TYPE: &str = "application/octet-stream";
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
pub const XML_CONTENT_TYPE: &str = "text/xml; charset=UTF-8";
pub const YAML_CONTENT_TYPE: &str = "text/x-yaml";

/// Element name for XML payloads that carry no type name of their own
/// (scalars, maps, list entries).
const XML_ITEM_TAG: &str = "item";

/// Structured output format selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Format {
    #[default]
    Json,
    Xml,
    Yml,
}

impl Format {
    /// All formats with a URL suffix, in registration order.
    pub const SUFFIXED: [Format; 3] = [Format::Json, Format::Xml, Format::Yml];

    /// URL suffix selecting this format, including the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => ".json",
            Self::Xml => ".xml",
            Self::Yml => ".yml",
        }
    }

    pub fn content_type(self) -> &'static str {
        match self {
            Self::Json => JSON_CONTENT_TYPE,
            Self::Xml => XML_CONTENT_TYPE,
            Self::Yml => YAML_CONTENT_TYPE,
        }
    }

    /// Picks a format from the value captured by a route's trailing parameter.
    ///
    /// Only values longer than four characters are inspected; `.xml` selects
    /// XML, `.yml` selects YAML and everything else is JSON.
    ///
    /// ```
    /// use restkit::render::Format;
    ///
    /// assert_eq!(Format::from_trailing_param("42.xml"), Format::Xml);
    /// assert_eq!(Format::from_trailing_param("42.yml"), Format::Yml);
    /// assert_eq!(Format::from_trailing_param("42.json"), Format::Json);
    /// assert_eq!(Format::from_trailing_param(".xml"), Format::Json);
    /// ```
    pub fn from_trailing_param(value: &str) -> Self {
        if value.len() <= 4 {
            return Self::Json;
        }
        if value.ends_with(".xml") {
            Self::Xml
        } else if value.ends_with(".yml") {
            Self::Yml
        } else {
            Self::Json
        }
    }
}

/// A failure to serialize a payload.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("xml: {0}")]
    Xml(String),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid jsonp callback `{0}`")]
    Callback(String),
}

impl RenderError {
    /// Best-effort response: the error text as a plain-text body.
    pub fn into_response(self) -> Response {
        let status = match self {
            Self::Callback(_) => StatusCode::BadRequest,
            _ => StatusCode::InternalServerError,
        };
        Response::new(status)
            .content_type("text/plain; charset=utf-8")
            .body(self.to_string())
    }
}

/// Writes raw bytes with an octet-stream content type.
pub fn binary(status: StatusCode, bytes: impl Into<Vec<u8>>) -> Response {
    Response::new(status)
        .content_type(BINARY_CONTENT_TYPE)
        .body_bytes(bytes)
}

/// Renders `value` as JSON; `pretty` indents with two spaces and appends a newline.
pub fn json<T>(status: StatusCode, pretty: bool, value: &T) -> Result<Response, RenderError>
where
    T: Serialize + ?Sized,
{
    let body = json_bytes(pretty, value)?;
    Ok(Response::new(status)
        .content_type(JSON_CONTENT_TYPE)
        .body_bytes(body))
}

/// Renders `value` as JSONP: `/**/callback(<json>);`.
///
/// ```
/// use restkit::{render, StatusCode};
///
/// let res = render::jsonp(StatusCode::Ok, false, "cb", &[1, 2]).unwrap();
/// assert_eq!(res.content(), b"/**/cb([1,2]);");
/// ```
pub fn jsonp<T>(
    status: StatusCode,
    pretty: bool,
    callback: &str,
    value: &T,
) -> Result<Response, RenderError>
where
    T: Serialize + ?Sized,
{
    if !valid_callback(callback) {
        return Err(RenderError::Callback(callback.to_owned()));
    }

    let payload = if pretty {
        serde_json::to_vec_pretty(value)?
    } else {
        serde_json::to_vec(value)?
    };

    let mut body = Vec::with_capacity(payload.len() + callback.len() + 8);
    body.extend_from_slice(b"/**/");
    body.extend_from_slice(callback.as_bytes());
    body.push(b'(');
    body.extend_from_slice(&payload);
    body.extend_from_slice(b");");
    if pretty {
        body.push(b'\n');
    }

    Ok(Response::new(status)
        .content_type(JSON_CONTENT_TYPE)
        .body_bytes(body))
}

/// Renders `value` as XML inside a `<Response>` envelope.
///
/// The envelope keeps the document well-formed even when the payload is a
/// list or a bare scalar, which would otherwise produce several roots or none.
pub fn xml<T>(status: StatusCode, pretty: bool, value: &T) -> Result<Response, RenderError>
where
    T: Serialize + ?Sized,
{
    let payload = xml_payload(value, pretty)?;

    let nl = if pretty { "\n" } else { "" };
    let body = format!("<Response>{nl}{payload}{nl}</Response>{nl}");

    Ok(Response::new(status)
        .content_type(XML_CONTENT_TYPE)
        .body(body))
}

/// Renders `value` as YAML. YAML output is already line-oriented; `pretty`
/// only guarantees the trailing newline.
pub fn yml<T>(status: StatusCode, pretty: bool, value: &T) -> Result<Response, RenderError>
where
    T: Serialize + ?Sized,
{
    let mut body = serde_yaml::to_string(value)?;
    if pretty && !body.ends_with('\n') {
        body.push('\n');
    }

    Ok(Response::new(status)
        .content_type(YAML_CONTENT_TYPE)
        .body(body))
}

/// Renders `value` in `format`.
pub fn format<T>(
    format: Format,
    status: StatusCode,
    pretty: bool,
    value: &T,
) -> Result<Response, RenderError>
where
    T: Serialize + ?Sized,
{
    match format {
        Format::Json => json(status, pretty, value),
        Format::Xml => xml(status, pretty, value),
        Format::Yml => yml(status, pretty, value),
    }
}

fn json_bytes<T>(pretty: bool, value: &T) -> Result<Vec<u8>, RenderError>
where
    T: Serialize + ?Sized,
{
    if pretty {
        let mut bytes = serde_json::to_vec_pretty(value)?;
        bytes.push(b'\n');
        Ok(bytes)
    } else {
        Ok(serde_json::to_vec(value)?)
    }
}

// Structs are named after their type; anything quick-xml cannot name on its
// own is retried under the generic item tag.
fn xml_payload<T>(value: &T, pretty: bool) -> Result<String, RenderError>
where
    T: Serialize + ?Sized,
{
    match write_xml(value, None, pretty) {
        Ok(out) => Ok(out),
        Err(_) => write_xml(value, Some(XML_ITEM_TAG), pretty),
    }
}

fn write_xml<T>(value: &T, root: Option<&str>, pretty: bool) -> Result<String, RenderError>
where
    T: Serialize + ?Sized,
{
    let mut out = String::new();
    let mut ser = match root {
        Some(tag) => {
            quick_xml::se::Serializer::with_root(&mut out, Some(tag)).map_err(xml_error)?
        }
        None => quick_xml::se::Serializer::new(&mut out),
    };
    if pretty {
        ser.indent(' ', 2);
    }
    value.serialize(ser).map_err(xml_error)?;
    Ok(out)
}

fn xml_error(err: impl std::fmt::Display) -> RenderError {
    RenderError::Xml(err.to_string())
}

fn valid_callback(callback: &str) -> bool {
    !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'))
}
