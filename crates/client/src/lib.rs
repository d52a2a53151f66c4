//! Aviatrix controller client
//!
//! Typed access to the controller operations used by the provider resources.
//! Resources depend on [`ControllerApi`] rather than on [`Client`] so the
//! remote side can be swapped out in tests.

pub mod branch_router;
pub mod client;
pub mod error;

use async_trait::async_trait;

pub use branch_router::BranchRouterTransitGatewayAttachment;
pub use client::{ApiResponse, Client, ClientConfig};
pub use error::{Error, Result};

/// Controller operations used by provider resources
#[async_trait]
pub trait ControllerApi: Send + Sync {
    /// Attach a branch router to a transit gateway
    async fn create_branch_router_transit_gateway_attachment(
        &self,
        attachment: &BranchRouterTransitGatewayAttachment,
    ) -> Result<()>;

    /// Look up an attachment by connection name.
    ///
    /// Returns [`Error::NotFound`] when the controller has no such connection.
    async fn get_branch_router_transit_gateway_attachment(
        &self,
        connection_name: &str,
    ) -> Result<BranchRouterTransitGatewayAttachment>;

    /// Detach a branch router by connection name
    async fn delete_branch_router_attachment(&self, connection_name: &str) -> Result<()>;
}
