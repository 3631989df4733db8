mod handler;
mod model;

pub use handler::{stop_typing, stream_typing, update_typing};
