pub mod cancellation;
pub mod completion;
pub mod consistency;
pub mod coordinator;
pub mod directory;
pub mod lifecycle;
pub mod listing;
pub mod memory;
pub mod remote;
pub mod reservation;
pub mod validation;
