//! Endpoint router
//!
//! Maps a caller-supplied endpoint string such as `camera/ABC123/recording/start`
//! to the HTTP method the recorder expects for it.
//!
//! Routes are tested in declaration order and the first match wins. Each
//! pattern is anchored at the start of the endpoint only; a pattern ending in
//! `$` must match the whole endpoint, one without it matches any endpoint that
//! begins with it. Declaration order is load-bearing, so the table is a plain
//! ordered list rather than a map.

use std::collections::BTreeMap;

use regex::Regex;

use crate::error::{ConfigError, Error, Result};

/// HTTP methods used by the control API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    /// Method name as sent on the request line
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Endpoint that is sent without the `api/<version>/` prefix
pub const VERSION_ENDPOINT: &str = "version";

/// Built-in route table of the recorder API, in match order.
///
/// `[^\s /]+` captures a single path segment (serial number, name, ...).
pub const MOTIF_ROUTES: &[(&str, HttpMethod)] = &[
    (r"version$", HttpMethod::Get),
    (r"cameras$", HttpMethod::Get),
    (r"cameras/configure$", HttpMethod::Patch),
    (r"cameras/read/(?P<name>[^\s /]+)$", HttpMethod::Get),
    (r"camera/(?P<serial>[^\s /]+)$", HttpMethod::Get),
    (r"camera/(?P<serial>[^\s /]+)/configure$", HttpMethod::Patch),
    (r"camera/(?P<serial>[^\s /]+)/read/(?P<name>[^\s /]+)$", HttpMethod::Get),
    (r"camera/(?P<serial>[^\s /]+)/recording/start$", HttpMethod::Post),
    (r"camera/(?P<serial>[^\s /]+)/recording/stop$", HttpMethod::Post),
    (r"camera/(?P<serial>[^\s /]+)/recordings$", HttpMethod::Get),
    (r"camera/(?P<serial>[^\s /]+)/recordings/copy_all$", HttpMethod::Post),
    (r"camera/(?P<serial>[^\s /]+)/recordings/export_all$", HttpMethod::Post),
    (r"camera/(?P<serial>[^\s /]+)/io/(?P<name>[^\s /]+)/set", HttpMethod::Post),
    (r"camera/(?P<serial>[^\s /]+)/io/log", HttpMethod::Post),
    (r"camera/(?P<serial>[^\s /]+)/io/read", HttpMethod::Get),
    (r"recording/start$", HttpMethod::Post),
    (r"recording/stop$", HttpMethod::Post),
    (r"recordings$", HttpMethod::Get),
    (r"recordings/copy_all$", HttpMethod::Post),
    (r"recordings/export_all$", HttpMethod::Post),
    (r"schedule$", HttpMethod::Get),
    (r"schedule/clear$", HttpMethod::Post),
    (r"schedule/(?P<identifier>[^\s /]+)/clear$", HttpMethod::Delete),
    (r"schedule/recording/start$", HttpMethod::Post),
    (r"schedule/camera/(?P<serial>[^\s /]+)/recording/start$", HttpMethod::Post),
    (r"schedule/recordings/copy_all", HttpMethod::Post),
    (r"schedule/camera/(?P<serial>[^\s /]+)/recordings/copy_all$", HttpMethod::Post),
    (r"schedule/recordings/export_all", HttpMethod::Post),
    (r"schedule/camera/(?P<serial>[^\s /]+)/recordings/export_all$", HttpMethod::Post),
    (r"schedule/io/(?P<name>[^\s /]+)/set", HttpMethod::Post),
    (r"schedule/camera/(?P<serial>[^\s /]+)/io/(?P<name>[^\s /]+)/set", HttpMethod::Post),
    (r"schedule/cameras/configure/(?P<name>[^\s /]+)", HttpMethod::Post),
    (r"schedule/camera/(?P<serial>[^\s /]+)/configure/(?P<name>[^\s /]+)", HttpMethod::Post),
    (r"io/(?P<io_serial>[^\s /]+)/(?P<io_port>[^\s /]+)/set", HttpMethod::Post),
    (r"io/(?P<name>[^\s /]+)/set", HttpMethod::Post),
    (r"io/log", HttpMethod::Post),
    (r"io/read", HttpMethod::Get),
    (r"multicam/synchronize", HttpMethod::Post),
    (r"multicam/connect_camera/(?P<serial>[^\s /]+)", HttpMethod::Post),
    (r"multicam/disconnect_camera/(?P<serial>[^\s /]+)", HttpMethod::Post),
    (r"multicam/connect_all", HttpMethod::Post),
    (r"multicam/disconnect_all", HttpMethod::Post),
];

/// A compiled routing rule
#[derive(Debug, Clone)]
struct Route {
    pattern: String,
    regex: Regex,
    method: HttpMethod,
}

/// Result of resolving an endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteMatch<'a> {
    /// HTTP method to use
    pub method: HttpMethod,
    /// Pattern that matched, as declared
    pub pattern: &'a str,
    /// Named path segments captured by the pattern (informational only)
    pub params: BTreeMap<String, String>,
}

/// Ordered, immutable table of endpoint routes
#[derive(Debug, Clone)]
pub struct EndpointRouter {
    routes: Vec<Route>,
}

impl EndpointRouter {
    /// Compile a route table. Patterns keep their declaration order.
    pub fn new(table: &[(&str, HttpMethod)]) -> Result<Self> {
        let routes = table
            .iter()
            .map(|&(pattern, method)| -> Result<Route> {
                let regex = Regex::new(&format!("^(?:{})", pattern)).map_err(|e| {
                    ConfigError::InvalidRoute(format!("{}: {}", pattern, e))
                })?;
                Ok(Route {
                    pattern: pattern.to_string(),
                    regex,
                    method,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { routes })
    }

    /// Compile the built-in recorder route table
    pub fn motif() -> Result<Self> {
        Self::new(MOTIF_ROUTES)
    }

    /// Number of routes in the table
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Check if the table has no routes
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Resolve an endpoint to its route.
    ///
    /// A single leading `/` is ignored. Fails with
    /// [`Error::UnknownEndpoint`] carrying the endpoint exactly as given.
    pub fn resolve(&self, endpoint: &str) -> Result<RouteMatch<'_>> {
        let path = strip_leading_slash(endpoint);
        if path.is_empty() {
            return Err(Error::UnknownEndpoint(endpoint.to_string()));
        }

        for route in &self.routes {
            if let Some(caps) = route.regex.captures(path) {
                let params = route
                    .regex
                    .capture_names()
                    .flatten()
                    .filter_map(|name| {
                        caps.name(name)
                            .map(|m| (name.to_string(), m.as_str().to_string()))
                    })
                    .collect();

                return Ok(RouteMatch {
                    method: route.method,
                    pattern: &route.pattern,
                    params,
                });
            }
        }

        Err(Error::UnknownEndpoint(endpoint.to_string()))
    }

    /// Resolve an endpoint and return only its HTTP method
    pub fn method_for(&self, endpoint: &str) -> Result<HttpMethod> {
        self.resolve(endpoint).map(|m| m.method)
    }
}

/// Remove one leading `/`, if present
pub(crate) fn strip_leading_slash(endpoint: &str) -> &str {
    endpoint.strip_prefix('/').unwrap_or(endpoint)
}
