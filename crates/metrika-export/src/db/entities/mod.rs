//! Database entities.

pub mod exported_event;
pub mod log_process;

pub use exported_event::Entity as ExportedEventEntity;
pub use log_process::Entity as LogProcessEntity;
pub use log_process::LogProcessStatus;
