pub mod broadcaster;
pub mod connect_four;

pub use broadcaster::GameBroadcaster;
