/// Web API Handlers
///
/// This module contains the handlers for the RESTful API endpoints.
/// Each handler extracts and validates its inputs, calls into the service
/// layer or the repositories, and returns JSON or an `ApiError`.

mod health_handlers;
mod card_handlers;
mod reading_handlers;
mod share_handlers;
mod daily_handlers;

// Re-export all handlers
pub use health_handlers::*;
pub use card_handlers::*;
pub use reading_handlers::*;
pub use share_handlers::*;
pub use daily_handlers::*;
