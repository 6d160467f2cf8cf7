use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Room category a bed belongs to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoomType {
    Dormitory,
    Private,
}

impl RoomType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomType::Dormitory => "DORMITORY",
            RoomType::Private => "PRIVATE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DORMITORY" => Some(RoomType::Dormitory),
            "PRIVATE" => Some(RoomType::Private),
            _ => None,
        }
    }
}

/// Current standing claim on a bed. Mutated only through the reservation
/// lifecycle transitions, never by request handlers directly.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BedStatus {
    Available,
    Reserved,
    Occupied,
    Maintenance,
}

impl BedStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BedStatus::Available => "AVAILABLE",
            BedStatus::Reserved => "RESERVED",
            BedStatus::Occupied => "OCCUPIED",
            BedStatus::Maintenance => "MAINTENANCE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(BedStatus::Available),
            "RESERVED" => Some(BedStatus::Reserved),
            "OCCUPIED" => Some(BedStatus::Occupied),
            "MAINTENANCE" => Some(BedStatus::Maintenance),
            _ => None,
        }
    }
}

/// A physical bed in the hostel. `(room_number, bed_number)` is the natural key;
/// the catalog is seeded once and prices never change after seeding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bed {
    pub id: Uuid,
    pub room_number: i32,
    pub bed_number: i32,
    pub room_name: String,
    pub room_type: RoomType,
    pub price_cents: i32,
    pub currency: String,
    pub status: BedStatus,
    pub held_until: Option<DateTime<Utc>>,
}

impl Bed {
    pub fn new(
        room_number: i32,
        bed_number: i32,
        room_name: impl Into<String>,
        room_type: RoomType,
        price_cents: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            room_number,
            bed_number,
            room_name: room_name.into(),
            room_type,
            price_cents,
            currency: "EUR".to_string(),
            status: BedStatus::Available,
            held_until: None,
        }
    }

    /// Natural key used for idempotent seeding.
    pub fn position(&self) -> (i32, i32) {
        (self.room_number, self.bed_number)
    }

    /// Invariant: RESERVED carries a held_until, AVAILABLE carries none.
    pub fn hold_consistent(&self) -> bool {
        match self.status {
            BedStatus::Reserved => self.held_until.is_some(),
            BedStatus::Available => self.held_until.is_none(),
            _ => true,
        }
    }
}

/// Point-in-time counts over the bed table for the staff dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OccupancyStats {
    pub available: usize,
    pub reserved: usize,
    pub occupied: usize,
    pub maintenance: usize,
    pub occupancy_rate: f64,
}

impl OccupancyStats {
    pub fn from_beds(beds: &[Bed]) -> Self {
        let mut stats = OccupancyStats {
            available: 0,
            reserved: 0,
            occupied: 0,
            maintenance: 0,
            occupancy_rate: 0.0,
        };
        for bed in beds {
            match bed.status {
                BedStatus::Available => stats.available += 1,
                BedStatus::Reserved => stats.reserved += 1,
                BedStatus::Occupied => stats.occupied += 1,
                BedStatus::Maintenance => stats.maintenance += 1,
            }
        }
        if !beds.is_empty() {
            stats.occupancy_rate = stats.occupied as f64 / beds.len() as f64;
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_bed_is_available_without_hold() {
        let bed = Bed::new(1, 3, "Dormitorio A", RoomType::Dormitory, 1200);
        assert_eq!(bed.status, BedStatus::Available);
        assert!(bed.held_until.is_none());
        assert!(bed.hold_consistent());
        assert_eq!(bed.position(), (1, 3));
    }

    #[test]
    fn reserved_without_deadline_violates_invariant() {
        let mut bed = Bed::new(1, 1, "Dormitorio A", RoomType::Dormitory, 1200);
        bed.status = BedStatus::Reserved;
        assert!(!bed.hold_consistent());

        bed.held_until = Some(Utc::now());
        assert!(bed.hold_consistent());
    }

    #[test]
    fn status_round_trips_through_str() {
        for status in [
            BedStatus::Available,
            BedStatus::Reserved,
            BedStatus::Occupied,
            BedStatus::Maintenance,
        ] {
            assert_eq!(BedStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(BedStatus::parse("BROKEN"), None);
    }

    #[test]
    fn occupancy_stats_counts_by_status() {
        let mut beds = vec![
            Bed::new(1, 1, "Dormitorio A", RoomType::Dormitory, 1200),
            Bed::new(1, 2, "Dormitorio A", RoomType::Dormitory, 1200),
            Bed::new(3, 1, "Habitación 3", RoomType::Private, 2500),
            Bed::new(3, 2, "Habitación 3", RoomType::Private, 2500),
        ];
        beds[1].status = BedStatus::Occupied;
        beds[2].status = BedStatus::Reserved;
        beds[2].held_until = Some(Utc::now());
        beds[3].status = BedStatus::Maintenance;

        let stats = OccupancyStats::from_beds(&beds);
        assert_eq!(stats.available, 1);
        assert_eq!(stats.reserved, 1);
        assert_eq!(stats.occupied, 1);
        assert_eq!(stats.maintenance, 1);
        assert!((stats.occupancy_rate - 0.25).abs() < f64::EPSILON);
    }
}
