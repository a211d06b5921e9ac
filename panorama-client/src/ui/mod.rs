//! Terminal user interface for the render client

mod app;
mod render;
mod state;
mod terminal;

pub use app::App;
pub use state::Scroll;
pub use terminal::install_panic_hook;
