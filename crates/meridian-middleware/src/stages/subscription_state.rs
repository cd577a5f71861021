//! Subscription state gate.

use crate::context::RequestContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::logging::SUBSCRIPTION_ID_PARAM;
use crate::types::{Request, Response, ResponseExt};
use http::{Method, StatusCode};
use meridian_core::{attributes, CloudError, CloudErrorCode, SubscriptionState};
use meridian_store::DocumentStore;
use opentelemetry::KeyValue;
use std::sync::Arc;

/// Decides whether `method` may proceed against a subscription in `state`.
///
/// | State | Outcome |
/// |-------|---------|
/// | Registered | allowed |
/// | Unregistered | 400 |
/// | Warned, Suspended | `GET` and `DELETE` allowed, otherwise 409 |
/// | Deleted | 400 |
/// | anything else | 500 |
pub fn check_subscription_state(
    subscription_id: &str,
    state: &SubscriptionState,
    method: &Method,
) -> Result<(), CloudError> {
    let state_message = || format!("Request is not allowed in subscription in state '{state}'.");

    match state {
        SubscriptionState::Registered => Ok(()),
        SubscriptionState::Unregistered => Err(CloudError::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidSubscriptionState,
            format!("Request is not allowed in unregistered subscription '{subscription_id}'."),
        )),
        SubscriptionState::Warned | SubscriptionState::Suspended => {
            if matches!(*method, Method::GET | Method::DELETE) {
                Ok(())
            } else {
                Err(CloudError::new(
                    StatusCode::CONFLICT,
                    CloudErrorCode::InvalidSubscriptionState,
                    state_message(),
                ))
            }
        }
        SubscriptionState::Deleted => Err(CloudError::new(
            StatusCode::BAD_REQUEST,
            CloudErrorCode::InvalidSubscriptionState,
            state_message(),
        )),
        SubscriptionState::Unrecognized(_) => Err(CloudError::internal_server_error()),
    }
}

/// Looks up the subscription document and applies [`check_subscription_state`].
///
/// A subscription with no document is treated as `Unregistered`.
#[derive(Clone)]
pub struct SubscriptionStateMiddleware {
    store: Arc<dyn DocumentStore>,
}

impl SubscriptionStateMiddleware {
    /// Creates the stage over `store`.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl std::fmt::Debug for SubscriptionStateMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionStateMiddleware").finish_non_exhaustive()
    }
}

impl Middleware for SubscriptionStateMiddleware {
    fn name(&self) -> &'static str {
        "subscription_state"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut RequestContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let Some(subscription_id) = ctx.path_param(SUBSCRIPTION_ID_PARAM).map(str::to_string)
            else {
                return Response::cloud_error(&CloudError::invalid_parameter_missing(
                    SUBSCRIPTION_ID_PARAM,
                ));
            };

            let state = match self.store.get_subscription(&subscription_id).await {
                Ok(subscription) => subscription.state,
                Err(err) if err.is_not_found() => SubscriptionState::Unregistered,
                Err(err) => {
                    tracing::error!(%subscription_id, error = %err, "failed to read subscription");
                    return Response::cloud_error(&CloudError::internal_server_error());
                }
            };

            ctx.set_span_attribute(KeyValue::new(attributes::SUBSCRIPTION_STATE, state.to_string()));
            let verdict = check_subscription_state(&subscription_id, &state, request.method());
            ctx.set_subscription_state(state);

            if let Err(err) = verdict {
                if err.status().is_server_error() {
                    tracing::error!(%subscription_id, "subscription in unrecognized state");
                }
                return Response::cloud_error(&err);
            }
            next.run(ctx, request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUB: &str = "00000000-0000-0000-0000-000000000000";

    #[test]
    fn test_state_matrix() {
        let cases = [
            (SubscriptionState::Registered, Method::PUT, None),
            (SubscriptionState::Registered, Method::GET, None),
            (SubscriptionState::Unregistered, Method::GET, Some(StatusCode::BAD_REQUEST)),
            (SubscriptionState::Warned, Method::GET, None),
            (SubscriptionState::Warned, Method::DELETE, None),
            (SubscriptionState::Warned, Method::PATCH, Some(StatusCode::CONFLICT)),
            (SubscriptionState::Suspended, Method::DELETE, None),
            (SubscriptionState::Suspended, Method::PUT, Some(StatusCode::CONFLICT)),
            (SubscriptionState::Suspended, Method::POST, Some(StatusCode::CONFLICT)),
            (SubscriptionState::Deleted, Method::GET, Some(StatusCode::BAD_REQUEST)),
            (
                SubscriptionState::Unrecognized("Frozen".into()),
                Method::GET,
                Some(StatusCode::INTERNAL_SERVER_ERROR),
            ),
        ];

        for (state, method, expected) in cases {
            let result = check_subscription_state(SUB, &state, &method);
            assert_eq!(result.err().map(|e| e.status()), expected, "{state} {method}");
        }
    }

    #[test]
    fn test_messages() {
        let err = check_subscription_state(SUB, &SubscriptionState::Unregistered, &Method::GET).unwrap_err();
        assert_eq!(
            err.body().message,
            format!("Request is not allowed in unregistered subscription '{SUB}'.")
        );
        assert_eq!(err.body().code, "InvalidSubscriptionState");

        let err = check_subscription_state(SUB, &SubscriptionState::Suspended, &Method::PUT).unwrap_err();
        assert_eq!(
            err.body().message,
            "Request is not allowed in subscription in state 'Suspended'."
        );

        let err = check_subscription_state(
            SUB,
            &SubscriptionState::Unrecognized("Frozen".into()),
            &Method::GET,
        )
        .unwrap_err();
        assert_eq!(err.body().message, "Internal server error.");
    }
}
