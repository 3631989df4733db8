mod handler;
mod model;

pub use handler::{delete_message, list_messages, search_messages, send_message, stream_messages};
