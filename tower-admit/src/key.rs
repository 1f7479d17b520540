use std::net::SocketAddr;

use http::Request;

/// Derives the client key that quotas are tracked under.
pub trait KeyExtractor<Req>: Clone {
    /// Returns `None` when the request carries no usable client identity.
    fn extract(&self, req: &Req) -> Option<String>;
}

/// Keys by the connecting peer's IP address.
///
/// The peer address is read from request extensions: a plain `SocketAddr`, or axum's
/// `ConnectInfo<SocketAddr>` when the `axum` feature is enabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeerIp;

/// Keys by the originating client IP as reported by a reverse proxy.
///
/// Uses the first `X-Forwarded-For` entry, then `X-Real-IP`, then the peer address.
/// These headers are client-controlled unless a trusted proxy overwrites them, so only
/// use this extractor behind one.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealIp;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

fn peer_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    #[cfg(feature = "axum")]
    if let Some(axum::extract::ConnectInfo(addr)) = req
        .extensions()
        .get::<axum::extract::ConnectInfo<SocketAddr>>()
    {
        return Some(*addr);
    }
    req.extensions().get::<SocketAddr>().copied()
}

fn header<'a, B>(req: &'a Request<B>, name: &str) -> Option<&'a str> {
    req.headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

impl<B> KeyExtractor<Request<B>> for PeerIp {
    fn extract(&self, req: &Request<B>) -> Option<String> {
        peer_addr(req).map(|addr| addr.ip().to_string())
    }
}

impl<B> KeyExtractor<Request<B>> for RealIp {
    fn extract(&self, req: &Request<B>) -> Option<String> {
        if let Some(forwarded) = header(req, X_FORWARDED_FOR)
            && let Some(first) = forwarded.split(',').map(str::trim).find(|ip| !ip.is_empty())
        {
            return Some(first.to_string());
        }
        if let Some(real) = header(req, X_REAL_IP) {
            return Some(real.to_string());
        }
        PeerIp.extract(req)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> http::request::Builder {
        Request::builder().uri("/api/documents/abc")
    }

    #[test]
    fn test_forwarded_for_wins() {
        let mut req = request()
            .header(X_FORWARDED_FOR, "203.0.113.7, 10.0.0.1")
            .header(X_REAL_IP, "198.51.100.1")
            .body(())
            .unwrap();
        req.extensions_mut()
            .insert(SocketAddr::from(([127, 0, 0, 1], 4000)));

        assert_eq!(RealIp.extract(&req).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_real_ip_then_peer() {
        let req = request()
            .header(X_REAL_IP, " 198.51.100.1 ")
            .body(())
            .unwrap();
        assert_eq!(RealIp.extract(&req).as_deref(), Some("198.51.100.1"));

        let mut req = request().header(X_FORWARDED_FOR, " , ").body(()).unwrap();
        req.extensions_mut()
            .insert(SocketAddr::from(([192, 0, 2, 9], 5555)));
        assert_eq!(RealIp.extract(&req).as_deref(), Some("192.0.2.9"));
    }

    #[test]
    fn test_peer_ip_ignores_headers() {
        let mut req = request()
            .header(X_FORWARDED_FOR, "203.0.113.7")
            .body(())
            .unwrap();
        assert_eq!(PeerIp.extract(&req), None);

        req.extensions_mut()
            .insert(SocketAddr::from(([192, 0, 2, 9], 5555)));
        assert_eq!(PeerIp.extract(&req).as_deref(), Some("192.0.2.9"));
    }

    #[test]
    fn test_no_identity() {
        let req = request().body(()).unwrap();
        assert_eq!(RealIp.extract(&req), None);
    }
}
