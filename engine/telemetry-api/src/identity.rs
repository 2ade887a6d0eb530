//! Client identity for admission control

use std::net::SocketAddr;
use warp::{Filter, Rejection};

/// Identity of clients whose address cannot be determined
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the identity a request is rate limited under
///
/// Behind a trusted proxy the left-most `X-Forwarded-For` entry wins. IPv4
/// addresses mapped into IPv6 are reported in their IPv4 form.
pub fn resolve_identity(
    remote: Option<SocketAddr>,
    forwarded_for: Option<&str>,
    trust_proxy: bool,
) -> String {
    if trust_proxy {
        let forwarded = forwarded_for
            .and_then(|header| header.split(',').next())
            .map(str::trim)
            .filter(|client| !client.is_empty());
        if let Some(client) = forwarded {
            return client.to_string();
        }
    }

    remote
        .map(|addr| addr.ip().to_canonical().to_string())
        .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())
}

/// Extract the client identity of a request
pub fn client_identity(
    trust_proxy: bool,
) -> impl Filter<Extract = (String,), Error = Rejection> + Clone {
    warp::addr::remote().and(warp::header::optional::<String>("x-forwarded-for")).map(
        move |remote: Option<SocketAddr>, forwarded: Option<String>| {
            resolve_identity(remote, forwarded.as_deref(), trust_proxy)
        },
    )
}
