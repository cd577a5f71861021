//! Subscription lifecycle endpoints, called by ARM on registration changes.

use super::{guarded, resource_id, store_failure};
use crate::frontend::Frontend;
use chrono::Utc;
use http::StatusCode;
use meridian_core::api::cluster_resource_type;
use meridian_core::{CloudError, ProvisioningState, ResourceId, Subscription, SubscriptionState};
use meridian_middleware::{RequestContext, Response, ResponseExt};
use meridian_store::Transaction;

impl Frontend {
    /// `GET /subscriptions/{id}`.
    pub(crate) async fn get_subscription(&self, ctx: &RequestContext) -> Result<Response, CloudError> {
        let subscription_id = resource_id(ctx)?;
        match guarded(ctx, self.store().get_subscription(subscription_id.name())).await? {
            Ok(subscription) => Ok(Response::json(StatusCode::OK, &subscription)),
            Err(err) if err.is_not_found() => Err(CloudError::resource_not_found(subscription_id)),
            Err(err) => Err(store_failure(&err, "read subscription")),
        }
    }

    /// `PUT /subscriptions/{id}`: records ARM's view of the subscription.
    ///
    /// Moving to `Deleted` starts deleting every cluster in it.
    pub(crate) async fn put_subscription(&self, ctx: &RequestContext) -> Result<Response, CloudError> {
        let subscription_id = resource_id(ctx)?;
        let raw = ctx.body().map(|bytes| bytes.as_ref()).unwrap_or_default();
        let mut subscription: Subscription =
            serde_json::from_slice(raw).map_err(CloudError::invalid_request_content)?;
        subscription.last_updated = Some(Utc::now());

        let id = subscription_id.name();
        match guarded(ctx, self.store().get_subscription(id)).await? {
            Ok(existing) => {
                for field in existing.changed_fields(&subscription) {
                    tracing::info!(subscription_id = %id, field, "updated subscription field");
                }
            }
            Err(err) if err.is_not_found() => {
                tracing::info!(subscription_id = %id, state = %subscription.state, "created document for subscription");
            }
            Err(err) => return Err(store_failure(&err, "read subscription")),
        }

        guarded(ctx, self.store().put_subscription(id, subscription.clone()))
            .await?
            .map_err(|err| store_failure(&err, "write subscription"))?;

        if subscription.state == SubscriptionState::Deleted {
            self.delete_all_resources(ctx, subscription_id).await?;
        }
        Ok(Response::json(StatusCode::OK, &subscription))
    }

    async fn delete_all_resources(&self, ctx: &RequestContext, subscription_id: &ResourceId) -> Result<(), CloudError> {
        let clusters = guarded(ctx, self.store().list_resources(subscription_id, &cluster_resource_type()))
            .await?
            .map_err(|err| store_failure(&err, "list resources"))?;

        let mut transaction = Transaction::new(subscription_id.name());
        let mut deleting = 0_usize;
        for doc in clusters {
            if doc.provisioning_state == ProvisioningState::Deleting {
                continue;
            }
            if self.begin_delete(ctx, doc, &mut transaction).await?.is_some() {
                deleting += 1;
            }
        }

        if !transaction.is_empty() {
            self.commit(ctx, transaction).await?;
        }
        tracing::info!(subscription_id = %subscription_id.name(), deleting, "deleting resources of deleted subscription");
        Ok(())
    }
}
