//! Export rendering, archiving and batch reports

pub mod formatter;
pub mod archive;
pub mod report;
