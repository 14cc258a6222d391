//! Loopback enforcement and operational-manager authorization.
//!
//! The distilled authorization model has no bearer token: the admin surface
//! is reachable only from the same host, and the `/operations/*` and
//! `/memory/lanes/*` groups additionally require the caller to name a
//! `memberId` that resolves to a configured operational manager.

use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::api::error::forbidden;
use crate::state::AppState;

/// `127.*`, `::1`, and IPv4-mapped `::ffff:127.*` are loopback; everything
/// else is not.
pub fn is_loopback(addr: &IpAddr) -> bool {
    match addr {
        IpAddr::V4(v4) => v4.octets()[0] == 127,
        IpAddr::V6(v6) => {
            if v6.is_loopback() {
                return true;
            }
            match v6.to_ipv4_mapped() {
                Some(v4) => v4.octets()[0] == 127,
                None => false,
            }
        }
    }
}

/// Middleware applied to the loopback-gated router group. Rejects
/// non-loopback callers with 403 `forbidden` before the handler runs.
pub async fn require_loopback(
    State(_state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
    next: Next,
) -> Response {
    if !is_loopback(&addr.ip()) {
        tracing::warn!(remote = %addr, "rejected non-loopback admin request");
        return forbidden("forbidden");
    }
    next.run(request).await
}

/// Resolve `member_id` against the control plane's operational manager
/// list. Returns `Ok(member_id)` on success; on failure returns the
/// response to send and the outcome to audit.
pub fn require_operational_manager<'a>(
    state: &AppState,
    member_id: Option<&'a str>,
) -> Result<&'a str, (Response, &'static str)> {
    let Some(member_id) = member_id else {
        return Err((
            crate::api::error::bad_request("missing_member_id", "memberId query param is required"),
            "missing_member_id",
        ));
    };

    let is_manager = state
        .family
        .control_plane
        .as_ref()
        .map(|cp| cp.is_manager(member_id))
        .unwrap_or(false);

    if !is_manager {
        return Err((forbidden("not_operational_manager"), "not_operational_manager"));
    }

    Ok(member_id)
}
