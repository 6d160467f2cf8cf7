pub mod bed;
pub mod seed;

pub use bed::{Bed, BedStatus, OccupancyStats, RoomType};
pub use seed::seed_catalog;
