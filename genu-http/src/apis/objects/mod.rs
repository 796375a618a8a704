pub mod handler;

pub use handler::{handle_get_object, handle_healthcheck, object_key, FALLBACK_KEY};
