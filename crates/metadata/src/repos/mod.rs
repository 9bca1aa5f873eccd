//! Repository traits for housekeeping metadata.

pub mod history;
pub mod housekeeping;

pub use history::HistoryRepo;
pub use housekeeping::{HousekeepingRepo, Page, PageRequest};
