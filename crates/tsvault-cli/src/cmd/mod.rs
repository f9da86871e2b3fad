pub(crate) mod backup;
pub(crate) mod cron;
pub(crate) mod monitor;
pub(crate) mod report;
pub(crate) mod restore;
