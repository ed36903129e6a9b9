use axum::{
    extract::{ConnectInfo, FromRequestParts, Request, State},
    http::{request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use crate::state::AppState;

/// Caller address as reported to the payment gateway: first
/// `X-Forwarded-For` hop, then the socket peer. Client-controlled, so it
/// never keys the rate limiter.
#[derive(Debug, Clone)]
pub struct ClientIp(pub String);

impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ip = first_forwarded_hop(&parts.headers)
            .map(|ip| ip.to_string())
            .or_else(|| peer_ip(parts).map(|ip| ip.to_string()))
            .unwrap_or_else(|| "127.0.0.1".to_string());

        Ok(ClientIp(ip))
    }
}

fn first_forwarded_hop(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
}

fn peer_ip(parts: &Parts) -> Option<IpAddr> {
    parts
        .extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip())
}

/// Bucket key for the limiter. The forwarded header only counts when the
/// socket peer is one of the configured proxies.
fn limiter_key(peer: Option<IpAddr>, headers: &HeaderMap, trusted: &[IpAddr]) -> String {
    let client = match peer {
        Some(peer) if trusted.contains(&peer) => first_forwarded_hop(headers)
            .and_then(|hop| hop.parse::<IpAddr>().ok())
            .unwrap_or(peer),
        Some(peer) => peer,
        None => return "ratelimit:unknown".to_string(),
    };
    format!("ratelimit:{}", client)
}

pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let Some(redis) = state.redis.as_ref() else {
        return next.run(req).await;
    };

    let limit = &state.rate_limit;
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let key = limiter_key(peer, req.headers(), &limit.trusted_proxies);

    match redis
        .check_rate_limit(&key, limit.requests, limit.window_seconds)
        .await
    {
        Ok(true) => next.run(req).await,
        Ok(false) => {
            tracing::warn!("Rate limit exceeded for {}", key);
            (StatusCode::TOO_MANY_REQUESTS, "Rate limit exceeded").into_response()
        }
        Err(e) => {
            // Fail open
            tracing::warn!("Rate limiter unavailable: {}", e);
            next.run(req).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn forwarded(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_untrusted_peer_cannot_pick_its_bucket() {
        let peer: IpAddr = "203.0.113.9".parse().unwrap();
        for spoofed in ["10.0.0.1", "10.0.0.2", "10.0.0.3"] {
            let key = limiter_key(Some(peer), &forwarded(spoofed), &[]);
            assert_eq!(key, "ratelimit:203.0.113.9");
        }
    }

    #[test]
    fn test_trusted_proxy_forwards_client() {
        let proxy: IpAddr = "10.0.0.1".parse().unwrap();
        let headers = forwarded("198.51.100.7, 10.0.0.1");
        assert_eq!(limiter_key(Some(proxy), &headers, &[proxy]), "ratelimit:198.51.100.7");

        // garbage from the proxy falls back to the proxy itself
        let headers = forwarded("not-an-ip");
        assert_eq!(limiter_key(Some(proxy), &headers, &[proxy]), "ratelimit:10.0.0.1");
    }

    #[test]
    fn test_missing_peer_shares_one_bucket() {
        let key = limiter_key(None, &forwarded("198.51.100.7"), &[]);
        assert_eq!(key, "ratelimit:unknown");
    }
}
