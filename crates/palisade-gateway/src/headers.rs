//! Header handling between the caller, the gateway and the backends.
//!
//! Backends learn who the caller is only through [`USER_ID_HEADER`] and
//! [`USER_ROLE_HEADER`]. Both are removed from every inbound request before
//! the verified values are added, so a caller can never assert an identity.

use http::header::{HeaderMap, HeaderName, HeaderValue, CONNECTION};
use palisade_core::{Identity, RequestId};
use palisade_middleware::REQUEST_ID_HEADER;

/// Header carrying the verified subject id to the backend.
pub static USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

/// Header carrying the verified role to the backend.
pub static USER_ROLE_HEADER: HeaderName = HeaderName::from_static("x-user-role");

/// Hop-by-hop headers (HTTP/1.1), never forwarded in either direction.
pub static HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "proxy-connection",
    "te",
    "trailer",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

/// Request headers that should NOT be forwarded to a backend.
pub static FILTERED_REQUEST_HEADERS: &[&str] = &[
    // Credentials stay at the gateway
    "authorization",
    "cookie",
    // Set by the client library from the target URL and body
    "host",
    "content-length",
    // Identity is injected, never passed through
    "x-user-id",
    "x-user-role",
    "x-request-id",
    // Caller-asserted network identity
    "x-forwarded-for",
    "x-real-ip",
];

/// Check if a header is hop-by-hop.
pub fn is_hop_by_hop_header(name: &str) -> bool {
    HOP_BY_HOP_HEADERS
        .iter()
        .any(|hop| hop.eq_ignore_ascii_case(name))
}

/// Check if a request header should be filtered (not forwarded).
pub fn should_filter_request_header(name: &str) -> bool {
    is_hop_by_hop_header(name)
        || FILTERED_REQUEST_HEADERS
            .iter()
            .any(|filtered| filtered.eq_ignore_ascii_case(name))
}

/// Header names listed in `Connection`, which are hop-by-hop for this message.
fn connection_listed(headers: &HeaderMap) -> Vec<String> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(|name| name.trim().to_ascii_lowercase())
        .filter(|name| !name.is_empty())
        .collect()
}

fn copy_headers(headers: &HeaderMap, drop: impl Fn(&str) -> bool) -> HeaderMap {
    let listed = connection_listed(headers);
    let mut filtered = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        let name_str = name.as_str();
        if drop(name_str) || listed.iter().any(|l| l == name_str) {
            continue;
        }
        filtered.append(name.clone(), value.clone());
    }

    filtered
}

/// Filter inbound headers for forwarding to a backend.
pub fn filter_request_headers(headers: &HeaderMap) -> HeaderMap {
    copy_headers(headers, should_filter_request_header)
}

/// Filter backend response headers for returning to the caller.
pub fn filter_response_headers(headers: &HeaderMap) -> HeaderMap {
    copy_headers(headers, is_hop_by_hop_header)
}

/// Add the gateway-asserted headers to an outbound request.
///
/// # Errors
///
/// Fails if the subject id cannot be carried in a header value. The request
/// must then not be forwarded, since the backend would see no identity.
pub fn inject_identity(
    headers: &mut HeaderMap,
    identity: Option<&Identity>,
    request_id: RequestId,
) -> Result<(), http::header::InvalidHeaderValue> {
    headers.insert(
        REQUEST_ID_HEADER.clone(),
        HeaderValue::from_str(&request_id.to_string())?,
    );

    if let Some(identity) = identity {
        headers.insert(
            USER_ID_HEADER.clone(),
            HeaderValue::from_str(identity.subject_id())?,
        );
        headers.insert(
            USER_ROLE_HEADER.clone(),
            HeaderValue::from_static(identity.role().as_str()),
        );
    }

    Ok(())
}
