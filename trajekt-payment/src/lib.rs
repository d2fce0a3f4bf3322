pub mod channels;
pub mod gateway;
pub mod recon;

pub use channels::CustomerDetails;
pub use gateway::{
    GatewayError, GatewayResult, GatewayTransaction, GatewayTransport, HttpTransport,
    MockTransport, PaymentGateway, RetryPolicy,
};
pub use recon::{ReconEngine, ReconError, SignaturePolicy};
