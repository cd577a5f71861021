//! The pipelines and route table of the frontend.

use crate::frontend::Frontend;
use crate::handlers::Endpoint;
use crate::router::{Mux, Route};
use http::Method;
use meridian_core::api::{
    CLUSTER_TYPE_NAME, DEPLOYMENTS_TYPE_NAME, EXTERNAL_AUTH_TYPE_NAME, LOCATIONS_TYPE_NAME, NODE_POOL_TYPE_NAME,
    OPERATION_RESULT_TYPE_NAME, OPERATION_STATUS_TYPE_NAME, PROVIDER_NAMESPACE, REQUEST_ADMIN_CREDENTIAL_ACTION,
    REVOKE_CREDENTIALS_ACTION, VERSION_TYPE_NAME,
};
use meridian_middleware::stages::{
    ApiVersionMiddleware, AuditMiddleware, BodyMiddleware, CorrelationMiddleware, LockMiddleware,
    LoggingMiddleware, LoggingPostMuxMiddleware, LowercaseMiddleware, MetricsMiddleware, PanicMiddleware,
    RefererMiddleware, ResourceIdMiddleware, SubscriptionStateMiddleware, SystemDataMiddleware,
    TracingMiddleware, ValidateStaticMiddleware,
};
use meridian_middleware::Pipeline;
use std::sync::Arc;

/// The stages every request runs before routing.
pub fn pre_dispatch_pipeline(frontend: &Frontend) -> Pipeline {
    let mut builder = Pipeline::builder()
        .stage(PanicMiddleware::new())
        .stage(RefererMiddleware::new())
        .stage(MetricsMiddleware::new())
        .stage(CorrelationMiddleware::new());
    if let Some(sink) = frontend.audit_sink() {
        builder = builder.stage(AuditMiddleware::new(Arc::clone(sink)));
    }
    builder
        .stage(TracingMiddleware::new())
        .stage(LowercaseMiddleware::new())
        .stage(LoggingMiddleware::new())
        .stage(PanicMiddleware::new())
        .stage(BodyMiddleware::new())
        .stage(SystemDataMiddleware::new())
        .stage(ValidateStaticMiddleware::new())
        .build()
}

/// Post-dispatch pipelines, one per route group.
struct Groups {
    read: Arc<Pipeline>,
    mutate: Arc<Pipeline>,
    subscription_read: Arc<Pipeline>,
    subscription_write: Arc<Pipeline>,
    preflight: Arc<Pipeline>,
}

impl Groups {
    fn new(frontend: &Frontend) -> Self {
        let versioned = || {
            Pipeline::builder()
                .stage(ResourceIdMiddleware::new())
                .stage(LoggingPostMuxMiddleware::new())
                .stage(ApiVersionMiddleware::new(frontend.api_registry().clone()))
                .stage(SubscriptionStateMiddleware::new(Arc::clone(frontend.store())))
        };
        let unversioned = || {
            Pipeline::builder()
                .stage(ResourceIdMiddleware::new())
                .stage(LoggingPostMuxMiddleware::new())
        };

        Self {
            read: Arc::new(versioned().build()),
            mutate: Arc::new(
                versioned()
                    .stage(LockMiddleware::new(Arc::clone(frontend.locks())))
                    .build(),
            ),
            subscription_read: Arc::new(unversioned().build()),
            subscription_write: Arc::new(
                unversioned()
                    .stage(LockMiddleware::new(Arc::clone(frontend.locks())))
                    .build(),
            ),
            // The query api-version names the caller's deployments API.
            preflight: Arc::new(
                Pipeline::builder()
                    .stage(LoggingPostMuxMiddleware::new())
                    .stage(SubscriptionStateMiddleware::new(Arc::clone(frontend.store())))
                    .build(),
            ),
        }
    }
}

fn lower(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Registers the routes of one resource type: collection `GET` plus
/// instance `GET`, `PUT`, `PATCH` and `DELETE`.
fn resource_routes(mux: &mut Mux, groups: &Groups, collection: &str, instance: &str) {
    mux.add(Route::new(Method::GET, collection, Endpoint::ResourceList, Arc::clone(&groups.read)))
        .add(Route::new(Method::GET, instance, Endpoint::ResourceRead, Arc::clone(&groups.read)))
        .add(Route::new(
            Method::PUT,
            instance,
            Endpoint::ResourceCreateOrUpdate,
            Arc::clone(&groups.mutate),
        ))
        .add(Route::new(Method::PATCH, instance, Endpoint::ResourcePatch, Arc::clone(&groups.mutate)))
        .add(Route::new(Method::DELETE, instance, Endpoint::ResourceDelete, Arc::clone(&groups.mutate)));
}

/// The frontend's route table.
pub fn route_table(frontend: &Arc<Frontend>) -> Mux {
    let groups = Groups::new(frontend);
    let mut mux = Mux::new(Arc::clone(frontend));

    let ns = lower(PROVIDER_NAMESPACE);
    let subscription = "/subscriptions/{subscriptionid}".to_string();
    let resource_group = format!("{subscription}/resourcegroups/{{resourcegroupname}}");
    let clusters = lower(CLUSTER_TYPE_NAME);
    let cluster = format!("{resource_group}/providers/{ns}/{clusters}/{{resourcename}}");
    let locations = format!("{subscription}/providers/{ns}/{}/{{location}}", lower(LOCATIONS_TYPE_NAME));

    mux.add(Route::new(
        Method::GET,
        &subscription,
        Endpoint::SubscriptionGet,
        Arc::clone(&groups.subscription_read),
    ))
    .add(Route::new(
        Method::PUT,
        &subscription,
        Endpoint::SubscriptionPut,
        Arc::clone(&groups.subscription_write),
    ))
    .add(Route::new(
        Method::GET,
        &format!("{subscription}/providers/{ns}/{clusters}"),
        Endpoint::ResourceList,
        Arc::clone(&groups.read),
    ));

    resource_routes(
        &mut mux,
        &groups,
        &format!("{resource_group}/providers/{ns}/{clusters}"),
        &cluster,
    );

    let node_pools = lower(NODE_POOL_TYPE_NAME);
    resource_routes(
        &mut mux,
        &groups,
        &format!("{cluster}/{node_pools}"),
        &format!("{cluster}/{node_pools}/{{nodepoolname}}"),
    );

    let external_auths = lower(EXTERNAL_AUTH_TYPE_NAME);
    resource_routes(
        &mut mux,
        &groups,
        &format!("{cluster}/{external_auths}"),
        &format!("{cluster}/{external_auths}/{{externalauthname}}"),
    );

    mux.add(Route::new(
        Method::POST,
        &format!("{cluster}/{REQUEST_ADMIN_CREDENTIAL_ACTION}"),
        Endpoint::RequestAdminCredential,
        Arc::clone(&groups.mutate),
    ))
    .add(Route::new(
        Method::POST,
        &format!("{cluster}/{REVOKE_CREDENTIALS_ACTION}"),
        Endpoint::RevokeCredentials,
        Arc::clone(&groups.mutate),
    ))
    .add(Route::new(
        Method::GET,
        &format!("{locations}/{}/{{operationid}}", lower(OPERATION_STATUS_TYPE_NAME)),
        Endpoint::OperationStatus,
        Arc::clone(&groups.read),
    ))
    .add(Route::new(
        Method::GET,
        &format!("{locations}/{}/{{operationid}}", lower(OPERATION_RESULT_TYPE_NAME)),
        Endpoint::OperationResult,
        Arc::clone(&groups.read),
    ))
    .add(Route::new(
        Method::POST,
        &format!(
            "{resource_group}/providers/{ns}/{}/{{deploymentname}}/preflight",
            lower(DEPLOYMENTS_TYPE_NAME)
        ),
        Endpoint::DeploymentPreflight,
        Arc::clone(&groups.preflight),
    ));

    let versions = format!("{locations}/{}", lower(VERSION_TYPE_NAME));
    mux.add(Route::new(Method::GET, &versions, Endpoint::VersionList, Arc::clone(&groups.read)))
        .add(Route::new(
            Method::GET,
            &format!("{versions}/{{resourcename}}"),
            Endpoint::VersionRead,
            Arc::clone(&groups.read),
        ));

    tracing::debug!(routes = mux.route_count(), "registered routes");
    mux
}
