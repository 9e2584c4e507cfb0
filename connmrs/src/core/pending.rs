//! Pending operations: a method call paired with the signal that completes it.
//!
//! The daemon acknowledges some calls before the work they start has
//! finished. `Connect` returns once the request is accepted, and the outcome
//! arrives later as a `State` change. The two may arrive in either order. A
//! pending operation resolves once both are in, exactly once.

use futures::stream::{BoxStream, StreamExt};
use futures::{FutureExt, select};
use futures_timer::Delay;
use log::{debug, warn};
use std::future::Future;
use std::pin::pin;
use std::time::Duration;

use crate::Result;
use crate::api::models::{ConnmanError, PropertyChange, PropertyValue, ServiceState};
use crate::types::constants::property;

/// Runs `ack` while watching `events` for the outcome chosen by `outcome`.
///
/// * An error from `ack` resolves the operation with that error.
/// * The first `Some` from `outcome` is kept; later ones are ignored.
/// * The operation resolves when `ack` has succeeded and an outcome is known.
/// * `Stuck` if `events` ends with no outcome, `Timeout` once `timeout` elapses.
///
/// `events` must be subscribed before `ack` is created so the outcome cannot
/// be missed.
pub(crate) async fn resolve_once<A, T, F>(
    ack: A,
    events: BoxStream<'static, PropertyChange>,
    mut outcome: F,
    timeout: Duration,
    method: &str,
) -> Result<T>
where
    A: Future<Output = Result<()>>,
    F: FnMut(&PropertyChange) -> Option<Result<T>>,
{
    let mut ack = pin!(ack.fuse());
    let mut events = events.fuse();
    let mut deadline = pin!(Delay::new(timeout).fuse());

    let mut acknowledged = false;
    let mut resolved: Option<Result<T>> = None;

    loop {
        select! {
            result = ack => {
                result?;
                debug!("{method} acknowledged");
                acknowledged = true;
            }
            change = events.next() => match change {
                Some(change) => {
                    if resolved.is_none() {
                        resolved = outcome(&change);
                    }
                }
                None if resolved.is_none() => {
                    warn!("Signal stream ended while waiting on {method}");
                    return Err(ConnmanError::Stuck(method.to_string()));
                }
                None => {}
            },
            _ = deadline => {
                warn!("{method} did not complete within {timeout:?}");
                return Err(ConnmanError::Timeout {
                    method: method.to_string(),
                    timeout,
                });
            }
        }

        if acknowledged {
            if let Some(result) = resolved.take() {
                return result;
            }
        }
    }
}

/// Tracks the outcome of a connection attempt from `State` and `Error` changes.
#[derive(Debug, Default)]
pub(crate) struct ConnectOutcome {
    last_error: Option<String>,
}

impl ConnectOutcome {
    /// Returns `Ok` on `ready`/`online` and `ConnectFailed` on `failure`.
    ///
    /// The failure reason is the most recent `Error` property seen.
    pub(crate) fn observe(&mut self, change: &PropertyChange) -> Option<Result<()>> {
        match change.name.as_str() {
            property::ERROR => {
                self.last_error = change.value.as_str().map(str::to_string);
                None
            }
            property::STATE => {
                let state = change.value.as_str()?.parse::<ServiceState>().ok()?;
                debug!("{} is now {state}", change.source);
                if state.is_connected() {
                    Some(Ok(()))
                } else if state.is_terminal_failure() {
                    let reason = self
                        .last_error
                        .take()
                        .unwrap_or_else(|| state.as_str().to_string());
                    Some(Err(ConnmanError::ConnectFailed(reason)))
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}

/// Returns true if `state` is a `State` value meaning connected.
pub(crate) fn is_connected_value(state: Option<&PropertyValue>) -> bool {
    state
        .and_then(PropertyValue::as_str)
        .and_then(|s| s.parse::<ServiceState>().ok())
        .is_some_and(ServiceState::is_connected)
}
