pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use server::{build_router, run_server};
pub use state::AppState;
