pub mod projection;
pub mod reorder;
pub mod repository;
pub mod search;
pub mod task_ops;
