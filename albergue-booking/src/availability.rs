use std::collections::HashMap;

use albergue_catalog::{Bed, BedStatus, RoomType};

use crate::models::{AvailabilitySummary, Reservation, StayRange};

// ── Availability Index ────────────────────────────────────────────
//
// Pure reads over a snapshot of beds and non-terminal reservations. The
// result is advisory: the hold-creation path re-runs the same checks inside
// its own atomic unit, so a stale read here can cost a retry but never a
// double allocation.

/// Half-open overlap test: two stays collide iff they share at least one night.
pub fn overlaps(a: &StayRange, b: &StayRange) -> bool {
    a.check_in < b.check_out && a.check_out > b.check_in
}

/// Beds bookable for `stay`, in allocation order.
///
/// A bed qualifies iff it is not under maintenance and no reservation that
/// still claims a bed (RESERVED, CONFIRMED, CHECKED_IN) overlaps the stay on
/// it. Ordering is deterministic, never random:
///   1. beds matching the requested room type, when one is given;
///   2. within dormitories, larger rooms first (Dormitorio A before B);
///   3. room number, then bed number.
/// A preference that cannot be met falls back to the other room type rather
/// than failing.
pub fn find_available<'a>(
    beds: &'a [Bed],
    active: &[Reservation],
    stay: &StayRange,
    preference: Option<RoomType>,
) -> Vec<&'a Bed> {
    let room_sizes = dormitory_sizes(beds);

    let mut free: Vec<&Bed> = beds
        .iter()
        .filter(|bed| bed.status != BedStatus::Maintenance)
        .filter(|bed| !has_overlapping_claim(bed, active, stay))
        .collect();

    free.sort_by_key(|bed| allocation_rank(bed, preference, &room_sizes));
    free
}

/// True if any still-claiming reservation on this bed collides with the stay.
pub fn has_overlapping_claim(bed: &Bed, active: &[Reservation], stay: &StayRange) -> bool {
    active.iter().any(|r| {
        r.bed_id == Some(bed.id) && r.status.claims_bed() && overlaps(&r.stay, stay)
    })
}

/// Best-effort counts for the query surface. `available + occupied` can fall
/// short of `total` when beds are under maintenance.
pub fn availability_summary(
    beds: &[Bed],
    active: &[Reservation],
    stay: &StayRange,
) -> AvailabilitySummary {
    let occupied_beds = beds
        .iter()
        .filter(|bed| has_overlapping_claim(bed, active, stay))
        .count();
    AvailabilitySummary {
        total_beds: beds.len(),
        available_beds: find_available(beds, active, stay, None).len(),
        occupied_beds,
    }
}

fn dormitory_sizes(beds: &[Bed]) -> HashMap<i32, usize> {
    let mut sizes = HashMap::new();
    for bed in beds {
        if bed.room_type == RoomType::Dormitory {
            *sizes.entry(bed.room_number).or_insert(0) += 1;
        }
    }
    sizes
}

fn allocation_rank(
    bed: &Bed,
    preference: Option<RoomType>,
    room_sizes: &HashMap<i32, usize>,
) -> (u8, i64, i32, i32) {
    let preference_rank = match preference {
        Some(wanted) if bed.room_type == wanted => 0,
        Some(_) => 1,
        None => 0,
    };
    // Larger dormitories sort first; private rooms keep plain room order.
    let size_rank = match bed.room_type {
        RoomType::Dormitory => -(room_sizes.get(&bed.room_number).copied().unwrap_or(0) as i64),
        RoomType::Private => 0,
    };
    (preference_rank, size_rank, bed.room_number, bed.bed_number)
}
