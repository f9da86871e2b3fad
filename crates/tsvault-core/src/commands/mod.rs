pub mod backup;
pub mod monitor;
pub mod report;
pub mod restore;
pub mod retention;
pub mod schedule;
pub mod util;
pub mod verify;
