pub mod error;
pub mod filters;
pub mod models;
pub mod validation;
pub mod user_info;
pub mod views;
pub mod vote_logic;

pub use error::{ErrorCode, ErrorResponse};
pub use filters::*;
pub use models::*;
pub use validation::*;
pub use user_info::*;
pub use views::{AffectedView, Mutation};
pub use vote_logic::{plan_vote, SetOp, VoteAction, VoteError, VoteIntent, VoteSnapshot, VoteUpdate, VoterId, VoterSets};

#[cfg(test)]
mod tests;
