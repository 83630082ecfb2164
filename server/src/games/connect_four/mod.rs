mod session;

pub use session::{AppliedMove, GameSession, Seat};
