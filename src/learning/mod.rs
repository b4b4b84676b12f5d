//! Pure learning-domain rules: wallet addresses, quiz grading, round-ups, deep links.

mod links;
mod rewards;
mod scoring;
mod wallet;

pub use links::quiz_link;
pub use rewards::{RoundUp, round_up};
pub use scoring::{QuizScore, grade};
pub use wallet::normalize_address;
