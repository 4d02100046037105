//! Pure predicates that gate transitions.

use crate::config::LinkConfig;
use crate::context::Context;
use crate::status::ConnectionStatus;
use std::time::Instant;
use tether_core::LinkError;
use tether_queue::Priority;

/// Reconnection is enabled, attempts remain, and the failure is worth retrying.
pub fn can_retry(ctx: &Context, config: &LinkConfig, error: &LinkError) -> bool {
    config.reconnect
        && ctx.retry.within_limit()
        && error.is_transient()
        && config
            .reconnect_predicate
            .as_ref()
            .map_or(true, |predicate| predicate(error))
}

/// The socket is open and the rate limiter has room.
pub fn can_send(ctx: &Context, now: Instant) -> bool {
    ctx.connection.status == ConnectionStatus::Connected
        && ctx.connection.socket.is_some()
        && ctx.rate_limit.in_window(now) < ctx.rate_limit.config().messages()
}

/// The queue would admit a message of this priority.
pub fn has_queue_space(ctx: &Context, priority: Priority) -> bool {
    ctx.queue.has_space(priority)
}

/// Another reconnection attempt is allowed.
pub fn within_limit(ctx: &Context) -> bool {
    ctx.retry.within_limit()
}

/// `url` has the form `scheme://authority[path]` with an accepted scheme.
///
/// Schemes compare case-insensitively. The authority must name a host and may carry
/// user info and a numeric port.
pub fn valid_url(url: &str, schemes: &[String]) -> bool {
    let Some((scheme, rest)) = url.split_once("://") else {
        return false;
    };
    if !valid_scheme(scheme)
        || !schemes
            .iter()
            .any(|accepted| accepted.eq_ignore_ascii_case(scheme))
    {
        return false;
    }

    let authority = rest
        .split(|c: char| c == '/' || c == '?' || c == '#')
        .next()
        .unwrap_or_default();
    if authority.is_empty() || authority.chars().any(|c| c.is_whitespace() || c.is_control()) {
        return false;
    }
    let host_port = authority
        .rsplit_once('@')
        .map_or(authority, |(_, host_port)| host_port);

    let (host, port) = if let Some(bracketed) = host_port.strip_prefix('[') {
        // IPv6 literal
        match bracketed.split_once(']') {
            Some((host, "")) => (host, None),
            Some((host, tail)) => match tail.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return false,
            },
            None => return false,
        }
    } else {
        match host_port.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (host_port, None),
        }
    };

    !host.is_empty() && port.map_or(true, |port| port.parse::<u16>().is_ok())
}

fn valid_scheme(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
