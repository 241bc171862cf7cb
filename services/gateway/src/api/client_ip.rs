//! Client address extraction.
//!
//! Behind a proxy the transport peer is the proxy; the real client is the
//! leftmost non-private entry of `X-Forwarded-For`. Without one, fall back
//! to `X-Real-IP`, then to the peer address.

use axum::http::HeaderMap;
use std::net::IpAddr;

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                // fc00::/7 unique local
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                // fe80::/10 link local
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

#[must_use]
pub fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        for entry in forwarded.split(',') {
            if let Ok(ip) = entry.trim().parse::<IpAddr>()
                && !is_private(ip)
            {
                return ip.to_string();
            }
        }
    }

    if let Some(real_ip) = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<IpAddr>().ok())
    {
        return real_ip.to_string();
    }

    peer.map_or_else(|| "unknown".to_string(), |addr| addr.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(
                axum::http::HeaderName::from_bytes(name.as_bytes()).expect("header name"),
                HeaderValue::from_str(value).expect("header value"),
            );
        }
        headers
    }

    #[test]
    fn leftmost_public_forwarded_entry_wins() {
        let headers = headers(&[("x-forwarded-for", "10.0.0.1, 203.0.113.7, 198.51.100.2")]);
        assert_eq!(client_ip(&headers, None), "203.0.113.7");
    }

    #[test]
    fn all_private_entries_fall_through_to_real_ip() {
        let headers = headers(&[
            ("x-forwarded-for", "10.0.0.1, 192.168.1.5"),
            ("x-real-ip", "203.0.113.9"),
        ]);
        assert_eq!(client_ip(&headers, None), "203.0.113.9");
    }

    #[test]
    fn peer_address_is_the_last_resort() {
        let peer: IpAddr = "198.51.100.4".parse().expect("ip");
        assert_eq!(client_ip(&HeaderMap::new(), Some(peer)), "198.51.100.4");
        assert_eq!(client_ip(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn garbage_forwarded_entries_are_skipped() {
        let headers = headers(&[
            ("x-forwarded-for", "not-an-ip, 203.0.113.7"),
        ]);
        assert_eq!(client_ip(&headers, None), "203.0.113.7");
    }

    #[test]
    fn v6_unique_local_is_private() {
        let headers = headers(&[("x-forwarded-for", "fd12:3456:789a::1, 2001:db8::1")]);
        assert_eq!(client_ip(&headers, None), "2001:db8::1");
    }
}
