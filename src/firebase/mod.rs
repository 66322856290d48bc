pub mod client;
pub mod endpoints;
pub mod protocol;
pub mod store;

pub use client::FirebaseClient;
pub use endpoints::{redacted, Endpoints};
pub use protocol::{Frame, LineBuffer, PutEvent};
pub use store::{ByteStream, RemoteStore};
