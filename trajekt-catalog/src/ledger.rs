use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use trajekt_domain::booking::Vehicle;
use trajekt_domain::repository::LedgerUpdate;
use trajekt_domain::schedule::{DepartureStatus, ScheduleDate, Vessel, VehicleClass};

/// Which pool of capacity a request exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityClass {
    Passenger,
    Vehicle(VehicleClass),
}

impl std::fmt::Display for CapacityClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityClass::Passenger => f.write_str("passenger seats"),
            CapacityClass::Vehicle(class) => write!(f, "{class} slots"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CapacityError {
    #[error("Capacity exceeded for {class}: requested {requested}, remaining {remaining}")]
    Exceeded {
        class: CapacityClass,
        requested: i32,
        remaining: i32,
    },

    #[error("Departure on {date} is not open for booking ({status})")]
    NotOpen {
        date: NaiveDate,
        status: DepartureStatus,
    },
}

/// Vehicle slots requested per class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VehicleCounts {
    pub motorcycle: i32,
    pub car: i32,
    pub bus: i32,
    pub truck: i32,
}

impl VehicleCounts {
    pub fn from_vehicles(vehicles: &[Vehicle]) -> Self {
        let mut counts = Self::default();
        for vehicle in vehicles {
            counts.add(vehicle.class, 1);
        }
        counts
    }

    pub fn add(&mut self, class: VehicleClass, n: i32) {
        match class {
            VehicleClass::Motorcycle => self.motorcycle += n,
            VehicleClass::Car => self.car += n,
            VehicleClass::Bus => self.bus += n,
            VehicleClass::Truck => self.truck += n,
        }
    }

    pub fn get(&self, class: VehicleClass) -> i32 {
        match class {
            VehicleClass::Motorcycle => self.motorcycle,
            VehicleClass::Car => self.car,
            VehicleClass::Bus => self.bus,
            VehicleClass::Truck => self.truck,
        }
    }

    pub fn total(&self) -> i32 {
        self.motorcycle + self.car + self.bus + self.truck
    }
}

/// Plan a seat and vehicle-slot reservation against the ledger entry as read.
///
/// Pure planning: nothing is held anywhere until the returned update commits,
/// and the commit fails if the entry's version moved in the meantime. The
/// caller reloads and replans on conflict.
pub fn plan_reserve(
    existing: Option<&ScheduleDate>,
    vessel: &Vessel,
    schedule_id: Uuid,
    date: NaiveDate,
    passengers: i32,
    vehicles: VehicleCounts,
    now: DateTime<Utc>,
) -> Result<LedgerUpdate, CapacityError> {
    let mut entry = match existing {
        Some(e) => e.clone(),
        None => ScheduleDate::open(schedule_id, date),
    };

    let status = entry.effective_status(now);
    if status != DepartureStatus::Available {
        return Err(CapacityError::NotOpen { date, status });
    }

    let seats_remaining = vessel.passenger_capacity - entry.passenger_count;
    if passengers > seats_remaining {
        return Err(CapacityError::Exceeded {
            class: CapacityClass::Passenger,
            requested: passengers,
            remaining: seats_remaining,
        });
    }

    for class in VehicleClass::ALL {
        let requested = vehicles.get(class);
        if requested == 0 {
            continue;
        }
        let remaining = vessel.capacity_for(class) - entry.count_for(class);
        if requested > remaining {
            return Err(CapacityError::Exceeded {
                class: CapacityClass::Vehicle(class),
                requested,
                remaining,
            });
        }
    }

    let expected_version = existing.map(|e| e.version);

    entry.passenger_count += passengers;
    for class in VehicleClass::ALL {
        entry.set_count(class, entry.count_for(class) + vehicles.get(class));
    }

    // Every booking carries at least one passenger, so seats are the binding
    // pool for the Full flag. A spent operator override is cleared here.
    entry.status = if entry.passenger_count >= vessel.passenger_capacity {
        DepartureStatus::Full
    } else {
        DepartureStatus::Available
    };
    entry.status_reason = None;
    entry.status_expires_at = None;
    if existing.is_some() {
        entry.version += 1;
    }

    Ok(LedgerUpdate { expected_version, entry })
}

/// Plan the capacity release for a cancelled booking. Never fails: counts are
/// clamped at zero, and only the computed Full flag reopens the departure.
pub fn plan_release(
    existing: &ScheduleDate,
    vessel: &Vessel,
    passengers: i32,
    vehicles: VehicleCounts,
) -> LedgerUpdate {
    let mut entry = existing.clone();

    entry.passenger_count = (entry.passenger_count - passengers).max(0);
    for class in VehicleClass::ALL {
        entry.set_count(class, (entry.count_for(class) - vehicles.get(class)).max(0));
    }

    if entry.status == DepartureStatus::Full && entry.passenger_count < vessel.passenger_capacity {
        entry.status = DepartureStatus::Available;
    }
    entry.version += 1;

    LedgerUpdate {
        expected_version: Some(existing.version),
        entry,
    }
}

/// Plan an operator status override for a departure, creating the ledger
/// entry if nobody has booked it yet.
pub fn plan_status_override(
    existing: Option<&ScheduleDate>,
    schedule_id: Uuid,
    date: NaiveDate,
    status: DepartureStatus,
    reason: Option<String>,
    expires_at: Option<DateTime<Utc>>,
) -> LedgerUpdate {
    let mut entry = match existing {
        Some(e) => e.clone(),
        None => ScheduleDate::open(schedule_id, date),
    };
    let expected_version = existing.map(|e| e.version);
    if existing.is_some() {
        entry.version += 1;
    }
    entry.status = status;
    entry.status_reason = reason;
    entry.status_expires_at = expires_at;

    LedgerUpdate { expected_version, entry }
}
