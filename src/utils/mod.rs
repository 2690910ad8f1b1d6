pub mod parsing;
pub mod task_supervisor;
