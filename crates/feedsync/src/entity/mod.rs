//! SeaORM entity definitions for the feedsync database schema.

pub mod cycle_run;
pub mod mirror_record;
pub mod prelude;
pub mod sync_status;
