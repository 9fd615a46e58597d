use std::sync::Arc;

use super::Handler;
use super::endpoint::Endpoint;
use super::pattern::Pattern;
use crate::context::Parameters;
use crate::error::ErrorMap;
use crate::http::Method;
use crate::render::Format;

/// How a route decides the output format of its responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormatRule {
    /// Registered under a static path or one of its suffixed variants.
    Fixed(Format),
    /// Read from the value of the route's last parameter.
    TrailingParam,
}

// A single registered route binding a method + pattern to a composed handler.
pub(crate) struct Route {
    method: Method,
    pattern: Pattern,
    pub(crate) handler: Handler,
    format: FormatRule,
}

impl Route {
    pub(crate) fn new(method: Method, pattern: &str, handler: Handler, format: FormatRule) -> Self {
        Self {
            method,
            pattern: Pattern::parse(pattern),
            handler,
            format,
        }
    }

    /// On a hit, returns the captured parameters and the negotiated format.
    /// A format suffix that selected the format is removed from the parameter.
    pub(crate) fn matches(&self, method: &Method, path: &str) -> Option<(Parameters, Format)> {
        if &self.method != method {
            return None;
        }
        let mut params = self.pattern.matches(path)?;
        let format = match self.format {
            FormatRule::Fixed(format) => format,
            FormatRule::TrailingParam => negotiate(&mut params),
        };
        Some((params, format))
    }
}

fn negotiate(params: &mut Parameters) -> Format {
    let Some(value) = params.last_mut() else {
        return Format::Json;
    };

    let format = Format::from_trailing_param(value);
    let suffix = match format {
        Format::Json if value.len() > 5 && value.ends_with(".json") => 5,
        Format::Json => 0,
        Format::Xml | Format::Yml => 4,
    };
    value.truncate(value.len() - suffix);
    format
}

/// Everything a router and all of its subrouters register into.
pub struct RouteTable {
    pub(crate) routes: Vec<Route>,
    pub(crate) endpoints: Vec<Endpoint>,
    pub(crate) errors: Arc<ErrorMap>,
    pub(crate) pretty: bool,
}

impl RouteTable {
    pub(crate) fn new() -> Self {
        Self {
            routes: Vec::new(),
            endpoints: Vec::new(),
            errors: Arc::new(ErrorMap::new()),
            pretty: false,
        }
    }

    pub(crate) fn push(&mut self, route: Route) {
        self.routes.push(route);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(value: &str) -> Parameters {
        let mut p = Parameters::new();
        p.insert("id", value);
        p
    }

    #[test]
    fn negotiate_strips_selecting_suffix() {
        for (raw, format, left) in [
            ("42.xml", Format::Xml, "42"),
            ("42.yml", Format::Yml, "42"),
            ("42.json", Format::Json, "42"),
            ("42", Format::Json, "42"),
            ("report.txt", Format::Json, "report.txt"),
        ] {
            let mut p = params(raw);
            assert_eq!(negotiate(&mut p), format, "{raw}");
            assert_eq!(p.get("id"), Some(left), "{raw}");
        }
    }

    #[test]
    fn negotiate_ignores_short_values() {
        let mut p = params(".xml");
        assert_eq!(negotiate(&mut p), Format::Json);
        assert_eq!(p.get("id"), Some(".xml"));

        let mut p = params(".json");
        assert_eq!(negotiate(&mut p), Format::Json);
        assert_eq!(p.get("id"), Some(".json"));
    }

    #[test]
    fn negotiate_without_params_is_json() {
        assert_eq!(negotiate(&mut Parameters::new()), Format::Json);
    }
}
