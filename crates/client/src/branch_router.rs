//! Branch router to transit gateway attachments

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::Client;
use crate::error::{Error, Result};
use crate::ControllerApi;

const ACTION_ATTACH: &str = "attach_cloudwan_device_to_transit_gateway";
const ACTION_GET_DETAIL: &str = "get_site2cloud_conn_detail";
const ACTION_DETACH: &str = "detach_cloudwan_device_from_cloud";

/// Attachment as the controller sees it. Every field travels as a string.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BranchRouterTransitGatewayAttachment {
    #[serde(rename = "device_name")]
    pub branch_name: String,
    #[serde(rename = "transit_gw")]
    pub transit_gateway_name: String,
    pub connection_name: String,
    pub routing_protocol: String,
    #[serde(rename = "bgp_local_as_number")]
    pub transit_gateway_bgp_asn: String,
    #[serde(rename = "external_device_as_number")]
    pub branch_router_bgp_asn: String,
    pub phase1_authentication: String,
    pub phase1_dh_groups: String,
    pub phase1_encryption: String,
    pub phase2_authentication: String,
    pub phase2_dh_groups: String,
    pub phase2_encryption: String,
    pub enable_global_accelerator: String,
    pub pre_shared_key: String,
    pub local_tunnel_ip: String,
    pub remote_tunnel_ip: String,
}

impl fmt::Debug for BranchRouterTransitGatewayAttachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BranchRouterTransitGatewayAttachment")
            .field("branch_name", &self.branch_name)
            .field("transit_gateway_name", &self.transit_gateway_name)
            .field("connection_name", &self.connection_name)
            .field("routing_protocol", &self.routing_protocol)
            .field("transit_gateway_bgp_asn", &self.transit_gateway_bgp_asn)
            .field("branch_router_bgp_asn", &self.branch_router_bgp_asn)
            .field("phase1_authentication", &self.phase1_authentication)
            .field("phase1_dh_groups", &self.phase1_dh_groups)
            .field("phase1_encryption", &self.phase1_encryption)
            .field("phase2_authentication", &self.phase2_authentication)
            .field("phase2_dh_groups", &self.phase2_dh_groups)
            .field("phase2_encryption", &self.phase2_encryption)
            .field("enable_global_accelerator", &self.enable_global_accelerator)
            .field("pre_shared_key", &"<sensitive>")
            .field("local_tunnel_ip", &self.local_tunnel_ip)
            .field("remote_tunnel_ip", &self.remote_tunnel_ip)
            .finish()
    }
}

#[derive(Serialize)]
struct ConnectionNameForm<'a> {
    connection_name: &'a str,
}

#[derive(Serialize)]
struct ConnDetailForm<'a> {
    conn_name: &'a str,
}

/// Map the controller's "no such connection" reply to the not-found signal
fn not_found_on_missing(err: Error) -> Error {
    match err {
        Error::Api { ref reason, .. } if reason.contains("does not exist") => Error::NotFound,
        Error::MissingResults { .. } => Error::NotFound,
        other => other,
    }
}

#[async_trait]
impl ControllerApi for Client {
    async fn create_branch_router_transit_gateway_attachment(
        &self,
        attachment: &BranchRouterTransitGatewayAttachment,
    ) -> Result<()> {
        debug!(connection = %attachment.connection_name, "attaching branch router");
        self.post_api(ACTION_ATTACH, attachment).await?;
        Ok(())
    }

    async fn get_branch_router_transit_gateway_attachment(
        &self,
        connection_name: &str,
    ) -> Result<BranchRouterTransitGatewayAttachment> {
        let form = ConnDetailForm {
            conn_name: connection_name,
        };
        let response = self
            .post_api(ACTION_GET_DETAIL, &form)
            .await
            .map_err(not_found_on_missing)?;

        response
            .results_field(ACTION_GET_DETAIL, "connections")
            .map_err(not_found_on_missing)
    }

    async fn delete_branch_router_attachment(&self, connection_name: &str) -> Result<()> {
        debug!(connection = %connection_name, "detaching branch router");
        let form = ConnectionNameForm { connection_name };
        self.post_api(ACTION_DETACH, &form).await?;
        Ok(())
    }
}
