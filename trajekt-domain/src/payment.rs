use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Payment status as reconciled with the gateway
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Pending,
    Success,
    Failed,
    Refunded,
    PartialRefund,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "PENDING",
            PaymentStatus::Success => "SUCCESS",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
            PaymentStatus::PartialRefund => "PARTIAL_REFUND",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(PaymentStatus::Pending),
            "SUCCESS" => Some(PaymentStatus::Success),
            "FAILED" => Some(PaymentStatus::Failed),
            "REFUNDED" => Some(PaymentStatus::Refunded),
            "PARTIAL_REFUND" => Some(PaymentStatus::PartialRefund),
            _ => None,
        }
    }

    /// Anything but Pending: polling the gateway cannot change it on its own
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Bank {
    Bca,
    Bni,
    Bri,
    Mandiri,
    Permata,
}

impl Bank {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bank::Bca => "bca",
            Bank::Bni => "bni",
            Bank::Bri => "bri",
            Bank::Mandiri => "mandiri",
            Bank::Permata => "permata",
        }
    }

    pub fn from_gateway(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "bca" => Some(Bank::Bca),
            "bni" => Some(Bank::Bni),
            "bri" => Some(Bank::Bri),
            "mandiri" => Some(Bank::Mandiri),
            "permata" => Some(Bank::Permata),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EWalletProvider {
    Gopay,
    Shopeepay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PayLaterProvider {
    Akulaku,
    Kredivo,
}

/// Payment channel, tagged so each variant carries exactly the detail it needs.
/// Serialized form matches the API request shape, e.g.
/// `{"type": "virtual_account", "bank": "bca"}` or `{"type": "qris"}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentChannel {
    VirtualAccount { bank: Bank },
    Qris,
    CreditCard,
    EWallet { provider: EWalletProvider },
    PayLater { provider: PayLaterProvider },
}

impl PaymentChannel {
    /// `payment_type` field sent to and received from the gateway
    pub fn gateway_payment_type(&self) -> &'static str {
        match self {
            PaymentChannel::VirtualAccount { .. } => "bank_transfer",
            PaymentChannel::Qris => "qris",
            PaymentChannel::CreditCard => "credit_card",
            PaymentChannel::EWallet { provider: EWalletProvider::Gopay } => "gopay",
            PaymentChannel::EWallet { provider: EWalletProvider::Shopeepay } => "shopeepay",
            PaymentChannel::PayLater { provider: PayLaterProvider::Akulaku } => "akulaku",
            PaymentChannel::PayLater { provider: PayLaterProvider::Kredivo } => "kredivo",
        }
    }

    /// Reverse of `gateway_payment_type`, for callbacks. Bank transfers need
    /// the va bank from the notification body to pick the variant.
    pub fn from_gateway(payment_type: &str, va_bank: Option<&str>) -> Option<Self> {
        match payment_type {
            "bank_transfer" | "echannel" => {
                let bank = va_bank.and_then(Bank::from_gateway)?;
                Some(PaymentChannel::VirtualAccount { bank })
            }
            "qris" => Some(PaymentChannel::Qris),
            "credit_card" => Some(PaymentChannel::CreditCard),
            "gopay" => Some(PaymentChannel::EWallet { provider: EWalletProvider::Gopay }),
            "shopeepay" => Some(PaymentChannel::EWallet { provider: EWalletProvider::Shopeepay }),
            "akulaku" => Some(PaymentChannel::PayLater { provider: PayLaterProvider::Akulaku }),
            "kredivo" => Some(PaymentChannel::PayLater { provider: PayLaterProvider::Kredivo }),
            _ => None,
        }
    }

    /// Channels we can open a transaction for ourselves (the rest redirect
    /// through the gateway's own pages and only come back via callback)
    pub fn is_chargeable(&self) -> bool {
        matches!(self, PaymentChannel::VirtualAccount { .. } | PaymentChannel::Qris)
    }

    /// Gateway refund terms per channel
    pub fn refund_policy(&self) -> RefundPolicy {
        match self {
            PaymentChannel::VirtualAccount { .. } => RefundPolicy::none(),
            PaymentChannel::Qris => RefundPolicy::window(7, "1-20 business days"),
            PaymentChannel::CreditCard => RefundPolicy::window(180, "7-14 business days"),
            PaymentChannel::EWallet { provider: EWalletProvider::Gopay } => {
                RefundPolicy::window(45, "1 business day")
            }
            PaymentChannel::EWallet { provider: EWalletProvider::Shopeepay } => {
                RefundPolicy::window(365, "20 days")
            }
            PaymentChannel::PayLater { provider: PayLaterProvider::Akulaku } => {
                RefundPolicy::window(180, "1 business day")
            }
            PaymentChannel::PayLater { provider: PayLaterProvider::Kredivo } => {
                RefundPolicy::window(14, "1 business day")
            }
        }
    }
}

/// Refund window and settlement expectation for one channel
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct RefundPolicy {
    pub refundable: bool,
    pub window_days: i64,
    pub sla: &'static str,
}

impl RefundPolicy {
    pub fn none() -> Self {
        Self { refundable: false, window_days: 0, sla: "not supported" }
    }

    pub fn window(days: i64, sla: &'static str) -> Self {
        Self { refundable: true, window_days: days, sla }
    }

    pub fn within_window(&self, paid_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.refundable && now - paid_at <= chrono::Duration::days(self.window_days)
    }
}

/// One gateway transaction for a booking. A booking keeps its payment
/// history; the newest record is the active one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub booking_id: Uuid,
    /// Order id as known to the gateway; the signature is computed over it
    pub order_id: String,
    pub status: PaymentStatus,
    pub channel: PaymentChannel,
    /// Gross amount in minor currency units
    pub amount: i64,
    pub transaction_id: Option<String>,
    pub va_number: Option<String>,
    pub qr_reference: Option<String>,
    /// True when the reference was issued locally during a gateway outage;
    /// such a payment is only ever settled by a verified callback or poll
    pub is_fallback: bool,
    pub expires_at: Option<DateTime<Utc>>,
    pub paid_at: Option<DateTime<Utc>>,
    pub refund_amount: Option<i64>,
    pub refunded_at: Option<DateTime<Utc>>,
    pub raw_response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(booking_id: Uuid, order_id: String, channel: PaymentChannel, amount: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_id,
            order_id,
            status: PaymentStatus::Pending,
            channel,
            amount,
            transaction_id: None,
            va_number: None,
            qr_reference: None,
            is_fallback: false,
            expires_at: None,
            paid_at: None,
            refund_amount: None,
            refunded_at: None,
            raw_response: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_success(&mut self, transaction_id: Option<String>) {
        self.status = PaymentStatus::Success;
        if transaction_id.is_some() {
            self.transaction_id = transaction_id;
        }
        self.paid_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self) {
        self.status = PaymentStatus::Failed;
        self.updated_at = Utc::now();
    }

    /// Record a refund of `amount`; flips to Refunded once fully covered
    pub fn apply_refund(&mut self, amount: i64) {
        let total = self.refund_total() + amount;
        self.refund_amount = Some(total);
        self.refunded_at = Some(Utc::now());
        self.status = if total >= self.amount {
            PaymentStatus::Refunded
        } else {
            PaymentStatus::PartialRefund
        };
        self.updated_at = Utc::now();
    }

    pub fn refund_total(&self) -> i64 {
        self.refund_amount.unwrap_or(0)
    }

    pub fn remaining_refundable(&self) -> i64 {
        self.amount - self.refund_total()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(expires) if now >= expires)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_gateway_round_trip() {
        let channels = [
            PaymentChannel::VirtualAccount { bank: Bank::Bca },
            PaymentChannel::Qris,
            PaymentChannel::CreditCard,
            PaymentChannel::EWallet { provider: EWalletProvider::Gopay },
            PaymentChannel::PayLater { provider: PayLaterProvider::Kredivo },
        ];
        for channel in channels {
            let payment_type = channel.gateway_payment_type();
            let va_bank = match channel {
                PaymentChannel::VirtualAccount { bank } => Some(bank.as_str()),
                _ => None,
            };
            assert_eq!(PaymentChannel::from_gateway(payment_type, va_bank), Some(channel));
        }
        assert_eq!(PaymentChannel::from_gateway("cstore", None), None);
        // bank transfer without a recognizable bank cannot be mapped
        assert_eq!(PaymentChannel::from_gateway("bank_transfer", None), None);
    }

    #[test]
    fn test_channel_serde_shape() {
        let channel = PaymentChannel::VirtualAccount { bank: Bank::Bca };
        let json = serde_json::to_value(&channel).unwrap();
        assert_eq!(json, serde_json::json!({"type": "virtual_account", "bank": "bca"}));

        let parsed: PaymentChannel = serde_json::from_value(serde_json::json!({"type": "qris"})).unwrap();
        assert_eq!(parsed, PaymentChannel::Qris);
    }

    #[test]
    fn test_refund_policy_matrix() {
        assert!(!PaymentChannel::VirtualAccount { bank: Bank::Bni }.refund_policy().refundable);
        assert_eq!(PaymentChannel::CreditCard.refund_policy().window_days, 180);
        assert_eq!(
            PaymentChannel::EWallet { provider: EWalletProvider::Gopay }.refund_policy().window_days,
            45
        );
        assert_eq!(
            PaymentChannel::EWallet { provider: EWalletProvider::Shopeepay }.refund_policy().window_days,
            365
        );
        assert_eq!(PaymentChannel::Qris.refund_policy().window_days, 7);
        assert_eq!(
            PaymentChannel::PayLater { provider: PayLaterProvider::Kredivo }.refund_policy().window_days,
            14
        );
    }

    #[test]
    fn test_refund_window_boundaries() {
        let policy = PaymentChannel::Qris.refund_policy();
        let paid_at = Utc::now();
        assert!(policy.within_window(paid_at, paid_at + chrono::Duration::days(7)));
        assert!(!policy.within_window(paid_at, paid_at + chrono::Duration::days(8)));
    }

    #[test]
    fn test_partial_then_full_refund() {
        let mut payment = Payment::new(Uuid::new_v4(), "TRJ-TEST1234".to_string(), PaymentChannel::CreditCard, 250_000);
        payment.mark_success(Some("tx-1".to_string()));

        payment.apply_refund(100_000);
        assert_eq!(payment.status, PaymentStatus::PartialRefund);
        assert_eq!(payment.remaining_refundable(), 150_000);

        payment.apply_refund(150_000);
        assert_eq!(payment.status, PaymentStatus::Refunded);
        assert_eq!(payment.remaining_refundable(), 0);
    }
}
