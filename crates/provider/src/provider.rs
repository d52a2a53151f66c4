//! Aviatrix Terraform Provider Implementation
//!
//! Dispatches protocol requests to resource implementations by type name.

use std::collections::BTreeMap;
use std::sync::Arc;

use aviatrix_client::{Client, ControllerApi};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::config::ProviderConfig;
use crate::protocol::*;
use crate::resources::branch_router_transit_gateway_attachment::BranchRouterTransitGatewayAttachmentResource;
use crate::resources::Resource;
use crate::schema::{self, Schema};
use crate::state::{DynamicValue as LocalDynamicValue, ResourceData, ID_ATTR};

type AttachmentResource = BranchRouterTransitGatewayAttachmentResource;

/// Aviatrix Terraform Provider
pub struct AviatrixProvider {
    /// Controller client, set by `configure_provider`
    client: Arc<RwLock<Option<Arc<dyn ControllerApi>>>>,
}

impl Default for AviatrixProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AviatrixProvider {
    pub fn new() -> Self {
        Self {
            client: Arc::new(RwLock::new(None)),
        }
    }

    /// Provider that is already configured with the given client
    pub fn with_client(client: Arc<dyn ControllerApi>) -> Self {
        Self {
            client: Arc::new(RwLock::new(Some(client))),
        }
    }

    async fn get_client(&self) -> Result<Arc<dyn ControllerApi>, Diagnostic> {
        self.client.read().await.clone().ok_or_else(|| {
            Diagnostic::error(
                "Provider not configured",
                "configure_provider must succeed before resources can be managed",
            )
        })
    }

    fn resource_schema(type_name: &str) -> Result<Schema, Diagnostic> {
        match type_name {
            t if t == AttachmentResource::type_name() => Ok(AttachmentResource::schema()),
            _ => Err(unknown_resource_type(type_name)),
        }
    }

    /// Handle one protocol request
    pub async fn handle(&self, request: Request) -> Response {
        match request {
            Request::GetProviderSchema => Response::GetProviderSchema(self.get_provider_schema()),
            Request::ConfigureProvider { config } => {
                Response::ConfigureProvider(self.configure_provider(config.as_ref()).await)
            }
            Request::ValidateResourceConfig { type_name, config } => {
                Response::ValidateResourceConfig(
                    self.validate_resource_config(&type_name, config.as_ref()),
                )
            }
            Request::PlanResourceChange {
                type_name,
                prior_state,
                proposed_new_state,
            } => Response::PlanResourceChange(self.plan_resource_change(
                &type_name,
                prior_state.as_ref(),
                proposed_new_state.as_ref(),
            )),
            Request::ApplyResourceChange {
                type_name,
                prior_state,
                planned_state,
            } => Response::ApplyResourceChange(
                self.apply_resource_change(&type_name, prior_state.as_ref(), planned_state.as_ref())
                    .await,
            ),
            Request::ReadResource {
                type_name,
                current_state,
            } => Response::ReadResource(self.read_resource(&type_name, current_state.as_ref()).await),
            Request::ImportResourceState { type_name, id } => {
                Response::ImportResourceState(self.import_resource_state(&type_name, &id).await)
            }
            Request::StopProvider => {
                info!("StopProvider called");
                Response::StopProvider(StopProviderResponse::default())
            }
        }
    }

    pub fn get_provider_schema(&self) -> GetProviderSchemaResponse {
        info!("GetProviderSchema called");

        GetProviderSchemaResponse {
            provider: schema::provider_schema(),
            resource_schemas: BTreeMap::from([(
                AttachmentResource::type_name().to_string(),
                AttachmentResource::schema(),
            )]),
            diagnostics: vec![],
        }
    }

    pub async fn configure_provider(&self, config: Option<&DynamicValue>) -> DiagnosticsResponse {
        info!("ConfigureProvider called");

        let value = match decode_optional(config) {
            Ok(value) => value,
            Err(e) => return diagnostics(decode_error("config", e)),
        };

        let config = ProviderConfig::from_value(&value);
        let client_config = config.client_config();
        if let Err(e) = client_config.validate() {
            return diagnostics(Diagnostic::error(
                "Invalid provider configuration",
                e.to_string(),
            ));
        }

        info!("Connecting to controller at {}", config.controller_ip);

        match Client::login(&client_config).await {
            Ok(client) => {
                *self.client.write().await = Some(Arc::new(client));
                info!("Connected to controller successfully");
                DiagnosticsResponse::default()
            }
            Err(e) => {
                error!("Failed to log in to controller: {}", e);
                diagnostics(Diagnostic::error(
                    "Failed to connect to the Aviatrix controller",
                    format!("Could not log in to {}: {}", config.controller_ip, e),
                ))
            }
        }
    }

    pub fn validate_resource_config(
        &self,
        type_name: &str,
        config: Option<&DynamicValue>,
    ) -> DiagnosticsResponse {
        debug!("ValidateResourceConfig called for {}", type_name);

        let schema = match Self::resource_schema(type_name) {
            Ok(schema) => schema,
            Err(d) => return diagnostics(d),
        };
        let config = match decode_optional(config) {
            Ok(value) => value,
            Err(e) => return diagnostics(decode_error("config", e)),
        };

        DiagnosticsResponse {
            diagnostics: schema
                .validate(&config)
                .into_iter()
                .map(|e| {
                    let attribute = e.attribute().map(str::to_string);
                    let diagnostic = Diagnostic::error("Invalid resource configuration", e.to_string());
                    match attribute {
                        Some(attr) => diagnostic.with_attribute(attr),
                        None => diagnostic,
                    }
                })
                .collect(),
        }
    }

    pub fn plan_resource_change(
        &self,
        type_name: &str,
        prior_state: Option<&DynamicValue>,
        proposed_new_state: Option<&DynamicValue>,
    ) -> PlanResourceChangeResponse {
        debug!("PlanResourceChange called for {}", type_name);

        let schema = match Self::resource_schema(type_name) {
            Ok(schema) => schema,
            Err(d) => return plan_error(d),
        };
        let encoding = proposed_new_state
            .or(prior_state)
            .map(DynamicValue::encoding)
            .unwrap_or_default();

        let (prior, proposed) = match (decode_optional(prior_state), decode_optional(proposed_new_state)) {
            (Ok(prior), Ok(proposed)) => (prior, proposed),
            (Err(e), _) => return plan_error(decode_error("prior_state", e)),
            (_, Err(e)) => return plan_error(decode_error("proposed_new_state", e)),
        };

        // Destroy
        if proposed.is_null() {
            return PlanResourceChangeResponse::default();
        }

        let mut planned = schema.apply_defaults(&proposed);
        let requires_replace = if prior.is_null() {
            vec![]
        } else {
            schema.requires_replace(&prior, &planned)
        };

        if let LocalDynamicValue::Map(map) = &mut planned {
            let id = if prior.is_null() || !requires_replace.is_empty() {
                LocalDynamicValue::Unknown
            } else {
                prior.get(ID_ATTR).cloned().unwrap_or_default()
            };
            map.insert(ID_ATTR.to_string(), id);
        }

        match DynamicValue::encode(&planned, encoding) {
            Ok(planned_state) => PlanResourceChangeResponse {
                planned_state: Some(planned_state),
                requires_replace,
                diagnostics: vec![],
            },
            Err(e) => plan_error(encode_error(e)),
        }
    }

    pub async fn apply_resource_change(
        &self,
        type_name: &str,
        prior_state: Option<&DynamicValue>,
        planned_state: Option<&DynamicValue>,
    ) -> NewStateResponse {
        info!("ApplyResourceChange called for {}", type_name);

        let schema = match Self::resource_schema(type_name) {
            Ok(schema) => schema,
            Err(d) => return state_error(d),
        };
        let encoding = planned_state
            .or(prior_state)
            .map(DynamicValue::encoding)
            .unwrap_or_default();

        let (prior, planned) = match (decode_optional(prior_state), decode_optional(planned_state)) {
            (Ok(prior), Ok(planned)) => (prior, planned),
            (Err(e), _) => return state_error(decode_error("prior_state", e)),
            (_, Err(e)) => return state_error(decode_error("planned_state", e)),
        };

        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => return state_error(d),
        };

        let result = match (prior.is_null(), planned.is_null()) {
            // Create
            (true, false) => {
                let mut data = ResourceData::from_state(&schema, &planned);
                AttachmentResource::create(client.as_ref(), &mut data)
                    .await
                    .map(|_| data.to_state(&schema))
            }
            // Delete
            (false, true) => {
                let mut data = ResourceData::from_state(&schema, &prior);
                AttachmentResource::delete(client.as_ref(), &mut data)
                    .await
                    .map(|_| LocalDynamicValue::Null)
            }
            // Update
            (false, false) => Err(anyhow::anyhow!(
                "{} does not support in-place updates; every attribute forces replacement",
                type_name
            )),
            // No change
            (true, true) => Ok(LocalDynamicValue::Null),
        };

        match result {
            Ok(new_state) => encode_new_state(&new_state, encoding),
            Err(e) => state_error(Diagnostic::error(
                "Failed to apply resource change",
                format!("{:#}", e),
            )),
        }
    }

    pub async fn read_resource(
        &self,
        type_name: &str,
        current_state: Option<&DynamicValue>,
    ) -> NewStateResponse {
        info!("ReadResource called for {}", type_name);

        let schema = match Self::resource_schema(type_name) {
            Ok(schema) => schema,
            Err(d) => return state_error(d),
        };
        let encoding = current_state
            .map(DynamicValue::encoding)
            .unwrap_or_default();
        let current = match decode_optional(current_state) {
            Ok(value) => value,
            Err(e) => return state_error(decode_error("current_state", e)),
        };
        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => return state_error(d),
        };

        let mut data = ResourceData::from_state(&schema, &current);
        match AttachmentResource::read(client.as_ref(), &mut data).await {
            // A cleared identifier renders as null state: the object is gone
            Ok(()) => encode_new_state(&data.to_state(&schema), encoding),
            Err(e) => state_error(Diagnostic::error(
                "Failed to read resource",
                format!("{:#}", e),
            )),
        }
    }

    pub async fn import_resource_state(
        &self,
        type_name: &str,
        id: &str,
    ) -> ImportResourceStateResponse {
        info!("ImportResourceState called for {} with ID {}", type_name, id);

        let schema = match Self::resource_schema(type_name) {
            Ok(schema) => schema,
            Err(d) => return import_error(d),
        };
        let client = match self.get_client().await {
            Ok(client) => client,
            Err(d) => return import_error(d),
        };

        let data = match AttachmentResource::import(client.as_ref(), id).await {
            Ok(data) => data,
            Err(e) => {
                return import_error(Diagnostic::error(
                    "Failed to import resource",
                    format!("{:#}", e),
                ))
            }
        };

        if data.id().is_empty() {
            return import_error(Diagnostic::error(
                "Cannot import non-existent remote object",
                format!(
                    "While attempting to import an existing object to {}, the provider detected that no object exists with the given id {:?}.",
                    type_name, id
                ),
            ));
        }

        match DynamicValue::encode(&data.to_state(&schema), Encoding::Json) {
            Ok(state) => ImportResourceStateResponse {
                imported_resources: vec![ImportedResource {
                    type_name: type_name.to_string(),
                    state,
                }],
                diagnostics: vec![],
            },
            Err(e) => import_error(encode_error(e)),
        }
    }
}

fn unknown_resource_type(type_name: &str) -> Diagnostic {
    Diagnostic::error(
        "Unknown resource type",
        format!("The provider does not support resource type {:?}", type_name),
    )
}

fn decode_error(field: &str, e: anyhow::Error) -> Diagnostic {
    Diagnostic::error(format!("Failed to decode {}", field), e.to_string())
}

fn encode_error(e: anyhow::Error) -> Diagnostic {
    Diagnostic::error("Failed to encode state", e.to_string())
}

fn diagnostics(diagnostic: Diagnostic) -> DiagnosticsResponse {
    DiagnosticsResponse {
        diagnostics: vec![diagnostic],
    }
}

fn plan_error(diagnostic: Diagnostic) -> PlanResourceChangeResponse {
    PlanResourceChangeResponse {
        diagnostics: vec![diagnostic],
        ..Default::default()
    }
}

fn state_error(diagnostic: Diagnostic) -> NewStateResponse {
    NewStateResponse {
        new_state: None,
        diagnostics: vec![diagnostic],
    }
}

fn import_error(diagnostic: Diagnostic) -> ImportResourceStateResponse {
    ImportResourceStateResponse {
        imported_resources: vec![],
        diagnostics: vec![diagnostic],
    }
}

fn encode_new_state(state: &LocalDynamicValue, encoding: Encoding) -> NewStateResponse {
    if state.is_null() {
        return NewStateResponse::default();
    }
    match DynamicValue::encode(state, encoding) {
        Ok(new_state) => NewStateResponse {
            new_state: Some(new_state),
            diagnostics: vec![],
        },
        Err(e) => state_error(encode_error(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::make_state;

    const TYPE_NAME: &str = "aviatrix_branch_router_transit_gateway_attachment";

    fn json_value(value: &LocalDynamicValue) -> DynamicValue {
        DynamicValue::encode(value, Encoding::Json).unwrap()
    }

    fn config() -> LocalDynamicValue {
        make_state(vec![
            ("branch_name", "branch-1".into()),
            ("transit_gateway_name", "transit-1".into()),
            ("connection_name", "conn-1".into()),
            ("transit_gateway_bgp_asn", 65001.into()),
            ("branch_router_bgp_asn", 65002.into()),
        ])
    }

    #[test]
    fn test_schema_lists_the_attachment() {
        let provider = AviatrixProvider::new();
        let response = provider.get_provider_schema();

        assert!(response.resource_schemas.contains_key(TYPE_NAME));
        assert!(response.provider.attribute("controller_ip").is_some());
    }

    #[test]
    fn test_validate_reports_attribute_paths() {
        let provider = AviatrixProvider::new();
        let config = make_state(vec![("branch_name", "branch-1".into())]);

        let response = provider.validate_resource_config(TYPE_NAME, Some(&json_value(&config)));
        let attributes: Vec<_> = response
            .diagnostics
            .iter()
            .filter_map(|d| d.attribute.as_deref())
            .collect();
        assert_eq!(
            attributes,
            vec![
                "branch_router_bgp_asn",
                "connection_name",
                "transit_gateway_bgp_asn",
                "transit_gateway_name",
            ]
        );
    }

    #[test]
    fn test_unknown_type_is_a_diagnostic() {
        let provider = AviatrixProvider::new();
        let response = provider.validate_resource_config("aviatrix_vpc", None);
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(response.diagnostics[0].summary, "Unknown resource type");
    }

    #[test]
    fn test_plan_create_fills_defaults_and_unknown_id() {
        let provider = AviatrixProvider::new();
        let response =
            provider.plan_resource_change(TYPE_NAME, None, Some(&json_value(&config())));

        assert!(response.diagnostics.is_empty());
        assert!(response.requires_replace.is_empty());

        let planned = response.planned_state.unwrap().decode().unwrap();
        assert_eq!(planned.get("id"), Some(&LocalDynamicValue::Unknown));
        assert_eq!(
            planned.get("phase1_encryption").and_then(|v| v.as_string()),
            Some("AES-256-CBC")
        );
    }

    #[test]
    fn test_plan_change_requires_replace() {
        let provider = AviatrixProvider::new();
        let schema = AttachmentResource::schema();

        let mut prior = schema.apply_defaults(&config());
        if let LocalDynamicValue::Map(map) = &mut prior {
            map.insert("id".to_string(), "conn-1".into());
        }
        let mut proposed = config();
        if let LocalDynamicValue::Map(map) = &mut proposed {
            map.insert("branch_router_bgp_asn".to_string(), 65010.into());
        }

        let response = provider.plan_resource_change(
            TYPE_NAME,
            Some(&json_value(&prior)),
            Some(&json_value(&proposed)),
        );
        assert_eq!(response.requires_replace, vec!["branch_router_bgp_asn"]);

        let planned = response.planned_state.unwrap().decode().unwrap();
        assert_eq!(planned.get("id"), Some(&LocalDynamicValue::Unknown));
    }

    #[test]
    fn test_plan_no_change_keeps_id() {
        let provider = AviatrixProvider::new();
        let schema = AttachmentResource::schema();

        let mut prior = schema.apply_defaults(&config());
        if let LocalDynamicValue::Map(map) = &mut prior {
            map.insert("id".to_string(), "conn-1".into());
        }

        let response = provider.plan_resource_change(
            TYPE_NAME,
            Some(&json_value(&prior)),
            Some(&json_value(&config())),
        );
        assert!(response.requires_replace.is_empty());

        let planned = response.planned_state.unwrap().decode().unwrap();
        assert_eq!(planned.get("id").and_then(|v| v.as_string()), Some("conn-1"));
    }

    #[test]
    fn test_plan_destroy() {
        let provider = AviatrixProvider::new();
        let response =
            provider.plan_resource_change(TYPE_NAME, Some(&json_value(&config())), None);
        assert!(response.planned_state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_unconfigured_provider_reports_diagnostic() {
        let provider = AviatrixProvider::new();
        let response = provider
            .read_resource(TYPE_NAME, Some(&json_value(&config())))
            .await;

        assert!(response.new_state.is_none());
        assert_eq!(response.diagnostics[0].summary, "Provider not configured");
    }

    #[tokio::test]
    async fn test_configure_without_credentials_fails_before_login() {
        let provider = AviatrixProvider::new();
        let block = make_state(vec![
            ("controller_ip", "10.1.1.1".into()),
            ("username", "admin".into()),
            ("password", "".into()),
        ]);

        // The password may come from the environment; only assert when it doesn't
        if std::env::var(crate::config::ENV_PASSWORD).is_err() {
            let response = provider.configure_provider(Some(&json_value(&block))).await;
            assert_eq!(response.diagnostics.len(), 1);
            assert_eq!(response.diagnostics[0].summary, "Invalid provider configuration");
        }
    }
}
