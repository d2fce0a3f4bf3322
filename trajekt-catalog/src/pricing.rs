use serde::Serialize;

use trajekt_domain::schedule::{Route, VehicleClass};

use crate::ledger::VehicleCounts;

/// Itemized fare for a booking request, in minor currency units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FareBreakdown {
    pub passenger_fare: i64,
    pub vehicle_fare: i64,
    pub total: i64,
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Route has no fare for vehicle class {0}")]
    UnpricedVehicleClass(VehicleClass),
}

/// Quote a crossing: per-seat base fare plus per-slot vehicle fares.
/// A vehicle class the route has no fare for is not sold on that route.
pub fn quote(route: &Route, passengers: i32, vehicles: VehicleCounts) -> Result<FareBreakdown, PricingError> {
    let passenger_fare = route.base_price * passengers as i64;

    let mut vehicle_fare = 0i64;
    for class in VehicleClass::ALL {
        let count = vehicles.get(class);
        if count == 0 {
            continue;
        }
        let price = route
            .vehicle_price(class)
            .ok_or(PricingError::UnpricedVehicleClass(class))?;
        vehicle_fare += price * count as i64;
    }

    Ok(FareBreakdown {
        passenger_fare,
        vehicle_fare,
        total: passenger_fare + vehicle_fare,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_two_passengers_one_car() {
        let route = Route::new("Merak".to_string(), "Bakauheni".to_string(), 75_000)
            .with_vehicle_price(VehicleClass::Car, 100_000);

        let fare = quote(&route, 2, VehicleCounts { car: 1, ..Default::default() }).unwrap();
        assert_eq!(fare.passenger_fare, 150_000);
        assert_eq!(fare.vehicle_fare, 100_000);
        assert_eq!(fare.total, 250_000);
    }

    #[test]
    fn test_quote_passengers_only() {
        let route = Route::new("Ketapang".to_string(), "Gilimanuk".to_string(), 12_500);
        let fare = quote(&route, 4, VehicleCounts::default()).unwrap();
        assert_eq!(fare.total, 50_000);
        assert_eq!(fare.vehicle_fare, 0);
    }

    #[test]
    fn test_quote_rejects_unpriced_class() {
        let route = Route::new("Merak".to_string(), "Bakauheni".to_string(), 75_000)
            .with_vehicle_price(VehicleClass::Car, 100_000);

        let err = quote(&route, 1, VehicleCounts { truck: 1, ..Default::default() }).unwrap_err();
        assert!(matches!(err, PricingError::UnpricedVehicleClass(VehicleClass::Truck)));
    }
}
