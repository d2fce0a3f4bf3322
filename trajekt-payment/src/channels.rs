use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use trajekt_domain::payment::PaymentChannel;

/// Buyer identity forwarded to the gateway with a charge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub first_name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Build the gateway charge body for one channel. The shared frame (order,
/// amount, customer, a single item line, short expiry) is the same for every
/// channel; each variant contributes its own block on top.
pub fn charge_payload(
    channel: &PaymentChannel,
    order_id: &str,
    amount: i64,
    item_name: &str,
    customer: &CustomerDetails,
    expiry_minutes: i64,
) -> Value {
    let mut payload = json!({
        "payment_type": channel.gateway_payment_type(),
        "transaction_details": {
            "order_id": order_id,
            "gross_amount": amount,
        },
        "customer_details": customer,
        "item_details": [{
            "id": order_id,
            "price": amount,
            "quantity": 1,
            "name": item_name,
        }],
        "custom_expiry": {
            "expiry_duration": expiry_minutes,
            "unit": "minute",
        },
    });

    match channel {
        PaymentChannel::VirtualAccount { bank } => {
            payload["bank_transfer"] = json!({ "bank": bank.as_str() });
        }
        PaymentChannel::CreditCard => {
            payload["credit_card"] = json!({ "secure": true });
        }
        // qris, e-wallets and paylater carry no extra block
        _ => {}
    }

    payload
}
