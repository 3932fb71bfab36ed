pub mod fixture;
pub mod leaderboard;
pub mod prediction;
pub mod state;

pub use fixture::*;
pub use leaderboard::*;
pub use prediction::*;
pub use state::*;
