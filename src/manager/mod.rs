pub mod task;
pub mod workspace;
