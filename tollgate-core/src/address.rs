//! Picking the source address of a login request.

/// Header carrying the client address set by some proxies.
pub const CLIENT_IP_HEADER: &str = "client-ip";
/// De-facto standard proxy header; the left-most entry is the original client.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Resolve the address a login attempt should be attributed to.
///
/// Precedence: the `Client-IP` header, then the first entry of
/// `X-Forwarded-For`, then the socket peer address. Empty values are skipped.
///
/// These headers are supplied by the client unless a trusted proxy rewrites
/// them; only pass them through when such a proxy sits in front.
pub fn client_address(
    client_ip: Option<&str>,
    forwarded_for: Option<&str>,
    remote_addr: &str,
) -> String {
    let from_client_ip = client_ip.map(str::trim).filter(|v| !v.is_empty());
    let from_forwarded = forwarded_for
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    from_client_ip
        .or(from_forwarded)
        .unwrap_or_else(|| remote_addr.trim())
        .to_string()
}
