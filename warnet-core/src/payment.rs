use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use warnet_shared::Masked;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    Qris,
    EWallet,
    /// Paid out of the member's banked minutes at the venue.
    MemberWallet,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::Qris => "qris",
            PaymentMethod::EWallet => "e_wallet",
            PaymentMethod::MemberWallet => "member_wallet",
        }
    }

    pub fn is_member_wallet(&self) -> bool {
        matches!(self, PaymentMethod::MemberWallet)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Succeeded,
    Processing,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfirmation {
    pub booking_id: Uuid,
    pub method: PaymentMethod,
    pub proof_of_payment: Option<Masked<String>>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Settle a payment. The core only calls `confirm_payment` after this succeeds.
    async fn settle(&self, confirmation: &PaymentConfirmation) -> CoreResult<PaymentStatus>;
}

/// Accepts everything except transfers that arrive without a receipt.
pub struct MockPaymentGateway;

#[async_trait]
impl PaymentGateway for MockPaymentGateway {
    async fn settle(&self, confirmation: &PaymentConfirmation) -> CoreResult<PaymentStatus> {
        if confirmation.method == PaymentMethod::BankTransfer && confirmation.proof_of_payment.is_none() {
            return Err(CoreError::PaymentRejected("bank transfer requires proof of payment".to_string()));
        }
        if confirmation.proof_of_payment.as_ref().map(|p| p.expose().as_str()) == Some("fail-gateway") {
            return Ok(PaymentStatus::Failed);
        }
        tracing::debug!("Mock gateway settled booking {} via {}", confirmation.booking_id, confirmation.method.as_str());
        Ok(PaymentStatus::Succeeded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_gateway_requires_transfer_proof() {
        let gateway = MockPaymentGateway;
        let mut confirmation = PaymentConfirmation {
            booking_id: Uuid::new_v4(),
            method: PaymentMethod::BankTransfer,
            proof_of_payment: None,
        };
        assert!(gateway.settle(&confirmation).await.is_err());

        confirmation.proof_of_payment = Some(Masked::new("receipt-001".to_string()));
        assert_eq!(gateway.settle(&confirmation).await.unwrap(), PaymentStatus::Succeeded);
    }

    #[test]
    fn test_method_wire_names() {
        let method: PaymentMethod = serde_json::from_str("\"member_wallet\"").unwrap();
        assert!(method.is_member_wallet());
        assert_eq!(method.as_str(), "member_wallet");
    }
}
