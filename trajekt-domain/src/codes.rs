use uuid::Uuid;

/// Crockford-style alphabet: no 0/O, 1/I/L ambiguity on printed tickets
const ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

fn random_block(len: usize) -> String {
    let mut n = Uuid::new_v4().as_u128();
    let base = ALPHABET.len() as u128;
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        out.push(ALPHABET[(n % base) as usize] as char);
        n /= base;
    }
    out
}

/// Booking reference, e.g. `TRJ-K7M2XQ4A`. Also used as the gateway order id.
pub fn booking_code() -> String {
    format!("TRJ-{}", random_block(8))
}

/// Ticket reference, e.g. `TKT-9QW3ZK2MHB`
pub fn ticket_code() -> String {
    format!("TKT-{}", random_block(10))
}

/// Opaque boarding credential encoded into the ticket QR
pub fn qr_token() -> String {
    random_block(20)
}

/// Suffix appended to a booking code when a payment is re-initiated,
/// so the gateway sees a fresh order id
pub fn order_suffix() -> String {
    random_block(4)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_code_shapes() {
        let booking = booking_code();
        assert!(booking.starts_with("TRJ-"));
        assert_eq!(booking.len(), 12);

        let ticket = ticket_code();
        assert!(ticket.starts_with("TKT-"));
        assert_eq!(ticket.len(), 14);

        assert_eq!(qr_token().len(), 20);
        assert_eq!(order_suffix().len(), 4);
    }

    #[test]
    fn test_no_ambiguous_characters() {
        for _ in 0..50 {
            let code = booking_code();
            for c in code.trim_start_matches("TRJ-").chars() {
                assert!(!"0O1IL".contains(c), "ambiguous character {c} in {code}");
            }
        }
    }

    #[test]
    fn test_codes_are_distinct() {
        let mut seen = HashSet::new();
        for _ in 0..1000 {
            assert!(seen.insert(booking_code()));
        }
    }
}
