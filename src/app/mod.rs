pub mod report;
pub mod script;
