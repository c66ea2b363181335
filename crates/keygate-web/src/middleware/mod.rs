pub mod cache;
pub mod rate_limit;
pub mod security_headers;

use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderMap, Request};
use keygate_core::RequestContext;

/// Client identity for rate limiting: the proxy headers when trusted, then
/// the socket peer, then `"unknown"`.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trust_proxy_headers: bool) -> String {
    if trust_proxy_headers {
        let forwarded = headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = forwarded {
            return ip.to_string();
        }

        let real_ip = headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty());
        if let Some(ip) = real_ip {
            return ip.to_string();
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// The context attached by an earlier gate, or a fresh anonymous one.
pub fn request_context(req: &Request<Body>, trust_proxy_headers: bool) -> RequestContext {
    if let Some(context) = req.extensions().get::<RequestContext>() {
        return context.clone();
    }
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    RequestContext::anonymous(client_key(req.headers(), peer, trust_proxy_headers))
}
