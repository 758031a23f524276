pub mod handlers;
pub mod middleware;
pub mod serve;
pub mod state;
