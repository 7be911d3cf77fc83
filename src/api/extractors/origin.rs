//! Health probe origin extractor.
//!
//! Client identity precedence:
//! 1. `ip` route variable
//! 2. `X-Real-IP` header
//! 3. host part of the remote address, which must parse as an IP
//!
//! The health endpoint normally sits behind a reverse proxy, so the header
//! outranks the socket address. A probe whose identity cannot be resolved is
//! still answered but does not touch the tracker.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts, RawPathParams};
use axum::http::Uri;
use axum::http::request::Parts;

use crate::drain::ProbeOrigin;

/// Header set by reverse proxies with the original client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Route variable that overrides every other identity source.
pub const IP_ROUTE_VAR: &str = "ip";

/// Query parameter marking deployment tooling probes.
pub const DEPLOYER_PARAM: &str = "deployer";

/// Textual remote address, for hosts that do not provide `ConnectInfo`.
///
/// Takes precedence over `ConnectInfo<SocketAddr>` when both are present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddr(pub String);

/// Pick the client identity for a health probe.
///
/// Empty values count as absent. The remote address is accepted as
/// `ip:port` or as a bare IP literal; anything else yields `None`.
#[must_use]
pub fn resolve_identity(
    route_ip: Option<&str>,
    real_ip: Option<&str>,
    remote_addr: Option<&str>,
) -> Option<String> {
    route_ip
        .filter(|ip| !ip.is_empty())
        .or_else(|| real_ip.filter(|ip| !ip.is_empty()))
        .map(ToString::to_string)
        .or_else(|| remote_addr.and_then(remote_host).map(|ip| ip.to_string()))
}

fn remote_host(addr: &str) -> Option<IpAddr> {
    addr.parse::<SocketAddr>()
        .map(|socket| socket.ip())
        .or_else(|_| addr.parse::<IpAddr>())
        .ok()
}

/// Whether the query string carries `deployer` (value ignored).
#[must_use]
pub fn is_deployer(uri: &Uri) -> bool {
    uri.query().is_some_and(|q| {
        url::form_urlencoded::parse(q.as_bytes()).any(|(k, _)| k == DEPLOYER_PARAM)
    })
}

impl<S> FromRequestParts<S> for ProbeOrigin
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let params = RawPathParams::from_request_parts(parts, state).await.ok();
        let route_ip = params
            .as_ref()
            .and_then(|p| p.iter().find(|(key, _)| *key == IP_ROUTE_VAR))
            .map(|(_, value)| value);

        let real_ip = parts
            .headers
            .get(REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok());

        let remote_addr = parts
            .extensions
            .get::<RemoteAddr>()
            .map(|addr| addr.0.clone())
            .or_else(|| {
                parts
                    .extensions
                    .get::<ConnectInfo<SocketAddr>>()
                    .map(|ConnectInfo(addr)| addr.to_string())
            });

        Ok(Self {
            identity: resolve_identity(route_ip, real_ip, remote_addr.as_deref()),
            deployer: is_deployer(&parts.uri),
        })
    }
}
