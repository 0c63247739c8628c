pub mod analytics_data;
pub mod error;
pub mod scheduler;
pub mod state;
pub mod sync;
