//! # Meridian Core
//!
//! Core types for the Meridian resource-provider frontend.
//!
//! - [`ResourceId`] - ARM resource identifier parser
//! - [`CloudError`] - error responses in the ARM wire format
//! - [`CorrelationData`] - per-request correlation identifiers
//! - [`OperationDocument`] / [`ResourceDocument`] / [`Subscription`] - stored documents
//! - [`ApiRegistry`] - accepted API versions

#![doc(html_root_url = "https://docs.rs/meridian-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod api;
pub mod attributes;
mod correlation;
mod error;
pub mod headers;
mod operation;
mod resource;
mod resource_id;
mod subscription;
mod system_data;
pub mod validate;

pub use api::ApiRegistry;
pub use correlation::CorrelationData;
pub use error::{CloudError, CloudErrorBody, CloudErrorCode, CloudErrorEnvelope, CloudResult};
pub use operation::{OperationDocument, OperationRequest, OperationStatus, ProvisioningState};
pub use resource::ResourceDocument;
pub use resource_id::{ResourceId, ResourceIdError, ResourceType, RESOURCES_NAMESPACE};
pub use subscription::{Feature, Subscription, SubscriptionProperties, SubscriptionState};
pub use system_data::{CreatedByType, SystemData};
