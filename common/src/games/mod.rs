pub mod connect_four;
mod session_rng;

pub use session_rng::SessionRng;
