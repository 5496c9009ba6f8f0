use crate::domain::{MappingRuleService, Simulator, UpsertMappingRuleRequest};
use bytes::Bytes;
use common::domain::{DomainError, DomainResult};
use common::garde::validate_struct;
use common::nats::{link_span_to_headers, ReceivedRequest, RequestHandler};
use futures::future::BoxFuture;
use garde::Validate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info_span, warn, Instrument};

/// Operations answered below the control subject prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlOperation {
    ListRules,
    GetRule,
    UpsertRule,
    RemoveRule,
    PublishOne,
    PublishBatch,
}

impl ControlOperation {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "rules.list" => Some(Self::ListRules),
            "rules.get" => Some(Self::GetRule),
            "rules.upsert" => Some(Self::UpsertRule),
            "rules.remove" => Some(Self::RemoveRule),
            "simulation.one" => Some(Self::PublishOne),
            "simulation.batch" => Some(Self::PublishBatch),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleNameBody {
    external_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RuleBody {
    external_name: String,
    internal_name: String,
}

const DEFAULT_BATCH_COUNT: usize = 100;

#[derive(Debug, Deserialize, Validate)]
struct BatchBody {
    #[garde(range(min = 1, max = 10_000))]
    #[serde(default = "default_batch_count")]
    count: usize,
}

fn default_batch_count() -> usize {
    DEFAULT_BATCH_COUNT
}

/// JSON reply envelope: `{"success": true, "data": ...}` or `{"success": false, "error": "..."}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControlReply {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ControlReply {
    fn ok(data: impl Serialize) -> DomainResult<Self> {
        let data = serde_json::to_value(data).map_err(|e| DomainError::RepositoryError(e.into()))?;
        Ok(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }

    fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.into()),
        }
    }

    pub fn to_bytes(&self) -> Bytes {
        match serde_json::to_vec(self) {
            Ok(body) => body.into(),
            Err(e) => {
                warn!(error = %e, "Failed to encode control reply");
                Bytes::from_static(br#"{"success":false}"#)
            }
        }
    }
}

fn parse_body<T: DeserializeOwned>(payload: &[u8]) -> DomainResult<T> {
    serde_json::from_slice(payload).map_err(|e| DomainError::MalformedInput(e.to_string()))
}

/// Rule management and on-demand simulation over NATS request/reply.
///
/// Subjects are `{prefix}.rules.{list,get,upsert,remove}` and
/// `{prefix}.simulation.{one,batch}`.
pub struct ControlHandler {
    rules: Arc<MappingRuleService>,
    simulator: Arc<Simulator>,
    subject_prefix: String,
}

impl ControlHandler {
    pub fn new(
        rules: Arc<MappingRuleService>,
        simulator: Arc<Simulator>,
        subject_prefix: impl Into<String>,
    ) -> Self {
        Self {
            rules,
            simulator,
            subject_prefix: subject_prefix.into(),
        }
    }

    /// Subscription subject covering every operation
    pub fn subscription_subject(&self) -> String {
        format!("{}.>", self.subject_prefix)
    }

    pub async fn handle(&self, subject: &str, payload: &[u8]) -> ControlReply {
        let operation = subject
            .strip_prefix(self.subject_prefix.as_str())
            .and_then(|rest| rest.strip_prefix('.'))
            .and_then(ControlOperation::from_suffix);

        let Some(operation) = operation else {
            return ControlReply::failed(format!("Unknown control subject: {}", subject));
        };

        debug!(?operation, "Handling control request");
        match self.dispatch(operation, payload).await {
            Ok(reply) => reply,
            Err(e) => ControlReply::failed(e.to_string()),
        }
    }

    async fn dispatch(
        &self,
        operation: ControlOperation,
        payload: &[u8],
    ) -> DomainResult<ControlReply> {
        match operation {
            ControlOperation::ListRules => ControlReply::ok(self.rules.list_rules().await?),
            ControlOperation::GetRule => {
                let body: RuleNameBody = parse_body(payload)?;
                ControlReply::ok(self.rules.get_rule(&body.external_name).await?)
            }
            ControlOperation::UpsertRule => {
                let body: RuleBody = parse_body(payload)?;
                let rule = self
                    .rules
                    .upsert_rule(UpsertMappingRuleRequest::new(
                        body.external_name,
                        body.internal_name,
                    ))
                    .await?;
                ControlReply::ok(rule)
            }
            ControlOperation::RemoveRule => {
                let body: RuleNameBody = parse_body(payload)?;
                let removed = self.rules.remove_rule(&body.external_name).await?;
                ControlReply::ok(json!({ "removed": removed }))
            }
            ControlOperation::PublishOne => {
                let result = self.simulator.publish_one().await;
                Ok(ControlReply {
                    success: result.success,
                    data: None,
                    error: result.error,
                })
            }
            ControlOperation::PublishBatch => {
                let body = if payload.iter().all(u8::is_ascii_whitespace) {
                    BatchBody {
                        count: DEFAULT_BATCH_COUNT,
                    }
                } else {
                    parse_body(payload)?
                };
                validate_struct(&body)?;
                ControlReply::ok(self.simulator.publish_batch(body.count).await)
            }
        }
    }
}

/// Request handler that answers every control request with a JSON reply
pub fn create_control_request_handler(handler: Arc<ControlHandler>) -> RequestHandler {
    Box::new(move |request: ReceivedRequest| -> BoxFuture<'static, Bytes> {
        let handler = handler.clone();
        Box::pin(async move {
            let span = info_span!("control_request", subject = %request.subject);
            link_span_to_headers(&span, request.headers.as_ref());
            handler
                .handle(&request.subject, &request.payload)
                .instrument(span)
                .await
                .to_bytes()
        })
    })
}
