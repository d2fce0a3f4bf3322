use std::sync::Arc;

use trajekt_booking::BookingEngine;
use trajekt_payment::ReconEngine;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<BookingEngine>,
    pub recon: Arc<ReconEngine>,
}
