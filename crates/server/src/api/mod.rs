pub mod handlers;
pub mod history;
pub mod middleware;
pub mod offschedule;
pub mod queue;
pub mod routes;
pub mod search;
pub mod synonyms;

pub use routes::create_router;
