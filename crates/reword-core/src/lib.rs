pub mod chunk;
pub mod credentials;
pub mod errors;
pub mod events;
pub mod ids;
pub mod policy;
pub mod transport;
