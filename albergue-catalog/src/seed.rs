use crate::bed::{Bed, RoomType};

/// The fixed bed layout of the hostel. Seeded once at startup; the store's
/// `seed_beds` skips positions that already exist, so re-running this at every
/// boot neither duplicates beds nor touches existing prices.
///
/// Dormitorio A is the big room and deliberately listed first; the allocation
/// tie-break prefers larger dormitories, which keeps walk-in groups together.
pub fn seed_catalog() -> Vec<Bed> {
    let mut beds = Vec::new();

    // Room 1: Dormitorio A, 8 bunks
    for bed_number in 1..=8 {
        beds.push(Bed::new(1, bed_number, "Dormitorio A", RoomType::Dormitory, 1200));
    }

    // Room 2: Dormitorio B, 6 bunks
    for bed_number in 1..=6 {
        beds.push(Bed::new(2, bed_number, "Dormitorio B", RoomType::Dormitory, 1400));
    }

    // Room 3: double private room
    for bed_number in 1..=2 {
        beds.push(Bed::new(3, bed_number, "Habitación Doble", RoomType::Private, 2500));
    }

    // Room 4: single private room
    beds.push(Bed::new(4, 1, "Habitación Individual", RoomType::Private, 3000));

    beds
}
