//! A single-user task board: tasks in fixed status columns, created, edited,
//! deleted and reordered through [`ops::task_ops::TaskBoard`], persisted to a
//! string key-value store after every change.

pub mod cli;
pub mod io;
pub mod model;
pub mod ops;
pub mod util;
