use trajekt_domain::booking::BookingStatus;

/// The status graph for a booking:
///
/// ```text
/// PENDING ──> CONFIRMED ──> COMPLETED ──> REFUNDED
///    │             │                          ▲
///    └──────> CANCELLED ──────────────────────┘
/// ```
///
/// REFUNDED is terminal; everything else follows the edges above.
pub fn permits(from: BookingStatus, to: BookingStatus) -> bool {
    targets(from).contains(&to)
}

/// Statuses reachable in one step from `from`
pub fn targets(from: BookingStatus) -> &'static [BookingStatus] {
    use BookingStatus::*;
    match from {
        Pending => &[Confirmed, Cancelled],
        Confirmed => &[Completed, Cancelled],
        Completed => &[Refunded],
        Cancelled => &[Refunded],
        Refunded => &[],
    }
}
