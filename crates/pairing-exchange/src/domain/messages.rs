//! # Typed Message Payloads
//!
//! Each payload is serialized to JSON before encryption. The message type
//! tag travels in the envelope header so a receiver knows which shape to
//! expect before decrypting.

use super::value_objects::PublicKey;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Closed set of message type tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MessageType {
    /// Pairing handshake request or response.
    Link,
    /// Liveness probe.
    Ping,
    /// Liveness reply.
    Pong,
    /// Request for a receive address.
    AccountRequest,
    /// Reply to an account request.
    AccountResponse,
    /// Request to send funds.
    PaymentRequest,
    /// Reply to a payment request.
    PaymentResponse,
    /// Request to call a contract.
    CallRequest,
    /// Reply to a call request.
    CallResponse,
}

impl MessageType {
    /// Stable label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Link => "link",
            MessageType::Ping => "ping",
            MessageType::Pong => "pong",
            MessageType::AccountRequest => "accountRequest",
            MessageType::AccountResponse => "accountResponse",
            MessageType::PaymentRequest => "paymentRequest",
            MessageType::PaymentResponse => "paymentResponse",
            MessageType::CallRequest => "callRequest",
            MessageType::CallResponse => "callResponse",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binds a payload shape to its envelope tag.
pub trait Payload: Serialize + DeserializeOwned + Send + Sync {
    /// Tag written into the envelope header.
    const MESSAGE_TYPE: MessageType;
}

/// Outcome carried by every response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    /// Request honoured.
    Accepted,
    /// Request declined; see the accompanying error code.
    Rejected,
}

/// Machine-readable reason attached to a rejected response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// The user declined.
    UserRejected,
    /// The requested scope is not available on this wallet.
    UnsupportedScope,
    /// Signing or broadcasting failed.
    TransactionFailed,
    /// The request could not be understood.
    InvalidRequest,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCode::UserRejected => "user_rejected",
            ErrorCode::UnsupportedScope => "unsupported_scope",
            ErrorCode::TransactionFailed => "transaction_failed",
            ErrorCode::InvalidRequest => "invalid_request",
        };
        f.write_str(label)
    }
}

/// LINK request and response share one shape.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkMessage {
    /// Fresh id chosen by the initiator.
    pub correlation_id: Uuid,
    /// Identifier the pairing key was derived from.
    pub identifier: String,
    /// Sender's pairing public key.
    pub public_key: PublicKey,
    /// Accepted for a request or approval, rejected for a refusal.
    pub status: ResponseStatus,
    /// Present when `status` is rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl LinkMessage {
    /// Pairing request or approval.
    pub fn accepted(identifier: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            correlation_id: Uuid::new_v4(),
            identifier: identifier.into(),
            public_key,
            status: ResponseStatus::Accepted,
            error: None,
        }
    }

    /// Refusal sent by the user.
    pub fn rejected(identifier: impl Into<String>, public_key: PublicKey) -> Self {
        Self {
            status: ResponseStatus::Rejected,
            error: Some(ErrorCode::UserRejected),
            ..Self::accepted(identifier, public_key)
        }
    }
}

impl Payload for LinkMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Link;
}

/// Liveness probe.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingMessage {
    /// Free text echoed back in the pong.
    pub message: String,
}

impl Payload for PingMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Ping;
}

/// Liveness reply.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PongMessage {
    /// Text copied from the ping.
    pub message: String,
}

impl Payload for PongMessage {
    const MESSAGE_TYPE: MessageType = MessageType::Pong;
}

/// Ask the peer for a receive address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRequest {
    /// Chain or asset scope, e.g. `"ethereum:1"`.
    pub scope: String,
}

impl Payload for AccountRequest {
    const MESSAGE_TYPE: MessageType = MessageType::AccountRequest;
}

/// Answer to an [`AccountRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountResponse {
    /// Accepted with an address, or rejected with an error.
    pub status: ResponseStatus,
    /// Scope the request asked for.
    pub scope: String,
    /// Receive address for the scope.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Reason for rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl AccountResponse {
    /// Accepted response carrying an address.
    pub fn accepted(scope: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            status: ResponseStatus::Accepted,
            scope: scope.into(),
            address: Some(address.into()),
            error: None,
        }
    }

    /// Rejected response.
    pub fn rejected(scope: impl Into<String>, code: ErrorCode) -> Self {
        Self {
            status: ResponseStatus::Rejected,
            scope: scope.into(),
            address: None,
            error: Some(code),
        }
    }
}

impl Payload for AccountResponse {
    const MESSAGE_TYPE: MessageType = MessageType::AccountResponse;
}

/// Ask the peer to send funds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRequest {
    /// Chain or asset scope.
    pub scope: String,
    /// Destination address.
    pub recipient: String,
    /// Decimal amount as a string, in the scope's base unit.
    pub amount: String,
    /// Optional note shown to the user.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memo: Option<String>,
}

impl Payload for PaymentRequest {
    const MESSAGE_TYPE: MessageType = MessageType::PaymentRequest;
}

/// Answer to a [`PaymentRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    /// Accepted with a transaction id, or rejected.
    pub status: ResponseStatus,
    /// Broadcast transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Reason for rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl PaymentResponse {
    /// Map the host's send result onto a response.
    pub fn from_result(result: &SendResult) -> Self {
        let (status, transaction_id, error) = result.response_parts();
        Self {
            status,
            transaction_id,
            error,
        }
    }
}

impl Payload for PaymentResponse {
    const MESSAGE_TYPE: MessageType = MessageType::PaymentResponse;
}

/// Ask the peer to call a contract.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CallRequest {
    /// Chain scope.
    pub scope: String,
    /// Contract address.
    pub contract: String,
    /// Method name.
    pub method: String,
    /// Method arguments, passed through untouched.
    #[serde(default)]
    pub arguments: serde_json::Value,
    /// Value attached to the call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}

impl Payload for CallRequest {
    const MESSAGE_TYPE: MessageType = MessageType::CallRequest;
}

/// Answer to a [`CallRequest`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallResponse {
    /// Accepted with a transaction id, or rejected.
    pub status: ResponseStatus,
    /// Broadcast transaction id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    /// Reason for rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorCode>,
}

impl CallResponse {
    /// Map the host's send result onto a response.
    pub fn from_result(result: &SendResult) -> Self {
        let (status, transaction_id, error) = result.response_parts();
        Self {
            status,
            transaction_id,
            error,
        }
    }
}

impl Payload for CallResponse {
    const MESSAGE_TYPE: MessageType = MessageType::CallResponse;
}

/// What the host did with a payment or call request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SendResult {
    /// Transaction broadcast.
    Sent {
        /// Id of the broadcast transaction
        transaction_id: String,
    },
    /// The user declined.
    Cancelled,
    /// Not enough balance for amount plus fees.
    InsufficientFunds,
    /// Signing or broadcast failed.
    Failed(String),
}

impl SendResult {
    /// Transaction id for a successful send.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            SendResult::Sent { transaction_id } => Some(transaction_id),
            _ => None,
        }
    }

    fn response_parts(&self) -> (ResponseStatus, Option<String>, Option<ErrorCode>) {
        match self {
            SendResult::Sent { transaction_id } => {
                (ResponseStatus::Accepted, Some(transaction_id.clone()), None)
            }
            _ => (
                ResponseStatus::Rejected,
                None,
                Some(ErrorCode::TransactionFailed),
            ),
        }
    }
}

/// Request handed to the host for the user to approve.
#[derive(Clone, Debug, PartialEq)]
pub enum IncomingRequest {
    /// Payment to approve.
    Payment(PaymentRequest),
    /// Contract call to approve.
    Call(CallRequest),
}

impl IncomingRequest {
    /// Envelope tag of the request.
    pub fn message_type(&self) -> MessageType {
        match self {
            IncomingRequest::Payment(_) => MessageType::PaymentRequest,
            IncomingRequest::Call(_) => MessageType::CallRequest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_message_wire_shape() {
        let msg = LinkMessage::rejected("wallet-a", PublicKey::new([2; 32]));
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();

        assert_eq!(json["identifier"], "wallet-a");
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["error"], "user_rejected");
        assert!(json.get("correlationId").is_some());
        assert!(json.get("publicKey").is_some());
    }

    #[test]
    fn test_accepted_link_omits_error() {
        let msg = LinkMessage::accepted("wallet-a", PublicKey::new([2; 32]));
        let json: serde_json::Value = serde_json::to_value(&msg).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_send_result_mapping() {
        let sent = PaymentResponse::from_result(&SendResult::Sent {
            transaction_id: "0xabc".into(),
        });
        assert_eq!(sent.status, ResponseStatus::Accepted);
        assert_eq!(sent.transaction_id.as_deref(), Some("0xabc"));
        assert_eq!(sent.error, None);

        for failure in [
            SendResult::Cancelled,
            SendResult::InsufficientFunds,
            SendResult::Failed("nonce too low".into()),
        ] {
            let response = CallResponse::from_result(&failure);
            assert_eq!(response.status, ResponseStatus::Rejected);
            assert_eq!(response.error, Some(ErrorCode::TransactionFailed));
            assert!(response.transaction_id.is_none());
        }
    }

    #[test]
    fn test_payload_tags() {
        assert_eq!(PingMessage::MESSAGE_TYPE, MessageType::Ping);
        assert_eq!(CallResponse::MESSAGE_TYPE.as_str(), "callResponse");
    }
}
