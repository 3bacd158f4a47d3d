pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod slots;

pub use router::booking_routes;
pub use services::coordinator::BookingCoordinator;
