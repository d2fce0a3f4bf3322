use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Vehicle classes a vessel can carry, each with its own deck capacity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum VehicleClass {
    Motorcycle,
    Car,
    Bus,
    Truck,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] = [
        VehicleClass::Motorcycle,
        VehicleClass::Car,
        VehicleClass::Bus,
        VehicleClass::Truck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleClass::Motorcycle => "motorcycle",
            VehicleClass::Car => "car",
            VehicleClass::Bus => "bus",
            VehicleClass::Truck => "truck",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "motorcycle" => Some(VehicleClass::Motorcycle),
            "car" => Some(VehicleClass::Car),
            "bus" => Some(VehicleClass::Bus),
            "truck" => Some(VehicleClass::Truck),
            _ => None,
        }
    }
}

impl std::fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A crossing between two harbours with its fare card
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    /// Fare per passenger seat, in minor currency units
    pub base_price: i64,
    /// Fare per vehicle slot, keyed by class; a missing class is not sold on this route
    pub vehicle_prices: HashMap<VehicleClass, i64>,
}

impl Route {
    pub fn new(origin: String, destination: String, base_price: i64) -> Self {
        Self {
            id: Uuid::new_v4(),
            origin,
            destination,
            base_price,
            vehicle_prices: HashMap::new(),
        }
    }

    pub fn with_vehicle_price(mut self, class: VehicleClass, price: i64) -> Self {
        self.vehicle_prices.insert(class, price);
        self
    }

    pub fn vehicle_price(&self, class: VehicleClass) -> Option<i64> {
        self.vehicle_prices.get(&class).copied()
    }

    pub fn label(&self) -> String {
        format!("{} - {}", self.origin, self.destination)
    }
}

/// A vessel and its per-class capacities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vessel {
    pub id: Uuid,
    pub name: String,
    pub passenger_capacity: i32,
    pub motorcycle_capacity: i32,
    pub car_capacity: i32,
    pub bus_capacity: i32,
    pub truck_capacity: i32,
}

impl Vessel {
    pub fn capacity_for(&self, class: VehicleClass) -> i32 {
        match class {
            VehicleClass::Motorcycle => self.motorcycle_capacity,
            VehicleClass::Car => self.car_capacity,
            VehicleClass::Bus => self.bus_capacity,
            VehicleClass::Truck => self.truck_capacity,
        }
    }
}

/// Days of week a schedule operates, packed into a bitmask (bit 0 = Monday)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct OperatingDays(pub u8);

impl OperatingDays {
    pub const DAILY: OperatingDays = OperatingDays(0b0111_1111);

    pub fn from_weekdays(days: &[Weekday]) -> Self {
        let mut mask = 0u8;
        for day in days {
            mask |= 1 << day.num_days_from_monday();
        }
        OperatingDays(mask)
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }
}

/// A recurring departure: route + vessel + departure time + operating days
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub route_id: Uuid,
    pub vessel_id: Uuid,
    pub departure_time: NaiveTime,
    pub days: OperatingDays,
    pub active: bool,
}

impl Schedule {
    pub fn new(route_id: Uuid, vessel_id: Uuid, departure_time: NaiveTime, days: OperatingDays) -> Self {
        Self {
            id: Uuid::new_v4(),
            route_id,
            vessel_id,
            departure_time,
            days,
            active: true,
        }
    }

    pub fn operates_on(&self, date: NaiveDate) -> bool {
        self.days.contains(date.weekday())
    }
}

/// Sale state of one concrete departure
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DepartureStatus {
    Available,
    Full,
    Cancelled,
    WeatherIssue,
    Inactive,
}

impl DepartureStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DepartureStatus::Available => "AVAILABLE",
            DepartureStatus::Full => "FULL",
            DepartureStatus::Cancelled => "CANCELLED",
            DepartureStatus::WeatherIssue => "WEATHER_ISSUE",
            DepartureStatus::Inactive => "INACTIVE",
        }
    }

    pub fn from_db(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(DepartureStatus::Available),
            "FULL" => Some(DepartureStatus::Full),
            "CANCELLED" => Some(DepartureStatus::Cancelled),
            "WEATHER_ISSUE" => Some(DepartureStatus::WeatherIssue),
            "INACTIVE" => Some(DepartureStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for DepartureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capacity ledger entry for one schedule on one calendar date.
///
/// Created lazily on first booking. `version` guards every write: a writer
/// states the version it read, and the store rejects the write if the row
/// has moved on since.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleDate {
    pub schedule_id: Uuid,
    pub date: NaiveDate,
    pub passenger_count: i32,
    pub motorcycle_count: i32,
    pub car_count: i32,
    pub bus_count: i32,
    pub truck_count: i32,
    pub status: DepartureStatus,
    pub status_reason: Option<String>,
    pub status_expires_at: Option<DateTime<Utc>>,
    pub version: i64,
}

impl ScheduleDate {
    /// Fresh entry for a departure nobody has booked yet
    pub fn open(schedule_id: Uuid, date: NaiveDate) -> Self {
        Self {
            schedule_id,
            date,
            passenger_count: 0,
            motorcycle_count: 0,
            car_count: 0,
            bus_count: 0,
            truck_count: 0,
            status: DepartureStatus::Available,
            status_reason: None,
            status_expires_at: None,
            version: 0,
        }
    }

    pub fn count_for(&self, class: VehicleClass) -> i32 {
        match class {
            VehicleClass::Motorcycle => self.motorcycle_count,
            VehicleClass::Car => self.car_count,
            VehicleClass::Bus => self.bus_count,
            VehicleClass::Truck => self.truck_count,
        }
    }

    pub fn set_count(&mut self, class: VehicleClass, count: i32) {
        match class {
            VehicleClass::Motorcycle => self.motorcycle_count = count,
            VehicleClass::Car => self.car_count = count,
            VehicleClass::Bus => self.bus_count = count,
            VehicleClass::Truck => self.truck_count = count,
        }
    }

    /// Status with any expired operator override resolved back to Available
    pub fn effective_status(&self, now: DateTime<Utc>) -> DepartureStatus {
        match self.status {
            DepartureStatus::Available | DepartureStatus::Full => self.status,
            other => match self.status_expires_at {
                Some(expires) if now >= expires => DepartureStatus::Available,
                _ => other,
            },
        }
    }
}
