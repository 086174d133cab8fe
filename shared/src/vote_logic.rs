use std::collections::HashSet;
use std::hash::Hash;
use thiserror::Error;
use serde::{Serialize, Deserialize};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VoteError {
    #[error("Missing voter id")] MissingVoter,
    #[error("Missing vote target")] MissingTarget,
    #[error("Vote state cannot be both upvoted and downvoted")] InconsistentSnapshot,
}

/// Identifier of a voter or a votable entity. Blank identifiers are rejected
/// before any update is planned.
pub trait VoterId: Clone + Eq + Hash {
    fn is_blank(&self) -> bool;
}

impl VoterId for Uuid {
    fn is_blank(&self) -> bool { self.is_nil() }
}

impl VoterId for String {
    fn is_blank(&self) -> bool { self.trim().is_empty() }
}

impl VoterId for &str {
    fn is_blank(&self) -> bool { self.trim().is_empty() }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteAction { Upvote, Downvote }

impl VoteAction {
    pub const fn as_str(self) -> &'static str {
        match self {
            VoteAction::Upvote => "upvote",
            VoteAction::Downvote => "downvote",
        }
    }
}

/// The caller's view of its own membership at the time it decided to vote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteSnapshot {
    pub has_upvoted: bool,
    pub has_downvoted: bool,
}

impl VoteSnapshot {
    pub const NONE: Self = Self { has_upvoted: false, has_downvoted: false };
    pub const UPVOTED: Self = Self { has_upvoted: true, has_downvoted: false };
    pub const DOWNVOTED: Self = Self { has_upvoted: false, has_downvoted: true };
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "user", rename_all = "lowercase")]
pub enum SetOp<T> {
    Add(T),
    Remove(T),
    None,
}

impl<T> SetOp<T> {
    pub const fn is_none(&self) -> bool { matches!(self, SetOp::None) }

    const fn size_delta(&self) -> i32 {
        match self {
            SetOp::Add(_) => 1,
            SetOp::Remove(_) => -1,
            SetOp::None => 0,
        }
    }
}

/// Membership change for both voter sets, applied as one atomic update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteUpdate<T> {
    pub upvoters: SetOp<T>,
    pub downvoters: SetOp<T>,
}

impl<T> VoteUpdate<T> {
    /// Net change of `upvotes - downvotes` the update intends.
    ///
    /// Only matches the applied change when the snapshot agrees with stored
    /// membership; an `Add` of a present voter or a `Remove` of an absent one
    /// is a no-op on the sets. Compare tallies to learn what actually changed.
    pub const fn score_delta(&self) -> i32 {
        self.upvoters.size_delta() - self.downvoters.size_delta()
    }
}

pub fn plan_vote<T: VoterId>(
    voter: &T,
    snapshot: VoteSnapshot,
    action: VoteAction,
) -> Result<VoteUpdate<T>, VoteError> {
    if voter.is_blank() {
        return Err(VoteError::MissingVoter);
    }

    let user = || voter.clone();
    let update = match (action, snapshot.has_upvoted, snapshot.has_downvoted) {
        (_, true, true) => return Err(VoteError::InconsistentSnapshot),
        (VoteAction::Upvote, true, false) => VoteUpdate { upvoters: SetOp::Remove(user()), downvoters: SetOp::None },
        (VoteAction::Upvote, false, true) => VoteUpdate { upvoters: SetOp::Add(user()), downvoters: SetOp::Remove(user()) },
        (VoteAction::Upvote, false, false) => VoteUpdate { upvoters: SetOp::Add(user()), downvoters: SetOp::None },
        (VoteAction::Downvote, false, true) => VoteUpdate { upvoters: SetOp::None, downvoters: SetOp::Remove(user()) },
        (VoteAction::Downvote, true, false) => VoteUpdate { upvoters: SetOp::Remove(user()), downvoters: SetOp::Add(user()) },
        (VoteAction::Downvote, false, false) => VoteUpdate { upvoters: SetOp::None, downvoters: SetOp::Add(user()) },
    };
    Ok(update)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteIntent<T> {
    pub target: T,
    pub voter: T,
    pub snapshot: VoteSnapshot,
    pub action: VoteAction,
}

impl<T: VoterId> VoteIntent<T> {
    pub fn plan(&self) -> Result<VoteUpdate<T>, VoteError> {
        if self.target.is_blank() {
            return Err(VoteError::MissingTarget);
        }
        plan_vote(&self.voter, self.snapshot, self.action)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(
    serialize = "T: Serialize + Eq + Hash",
    deserialize = "T: Deserialize<'de> + Eq + Hash"
))]
pub struct VoterSets<T> {
    upvoters: HashSet<T>,
    downvoters: HashSet<T>,
}

impl<T: VoterId> PartialEq for VoterSets<T> {
    fn eq(&self, other: &Self) -> bool {
        self.upvoters == other.upvoters && self.downvoters == other.downvoters
    }
}

impl<T: VoterId> Eq for VoterSets<T> {}

impl<T: VoterId> Default for VoterSets<T> {
    fn default() -> Self { Self::new() }
}

impl<T: VoterId> VoterSets<T> {
    pub fn new() -> Self {
        Self { upvoters: HashSet::new(), downvoters: HashSet::new() }
    }

    /// Builds sets from stored arrays. A voter found in both is kept as a downvoter.
    pub fn from_parts(upvoters: impl IntoIterator<Item = T>, downvoters: impl IntoIterator<Item = T>) -> Self {
        let downvoters: HashSet<T> = downvoters.into_iter().collect();
        let upvoters = upvoters.into_iter().filter(|u| !downvoters.contains(u)).collect();
        Self { upvoters, downvoters }
    }

    pub fn snapshot(&self, voter: &T) -> VoteSnapshot {
        VoteSnapshot {
            has_upvoted: self.upvoters.contains(voter),
            has_downvoted: self.downvoters.contains(voter),
        }
    }

    pub fn apply(&mut self, update: &VoteUpdate<T>) {
        Self::apply_op(&mut self.upvoters, &update.upvoters);
        Self::apply_op(&mut self.downvoters, &update.downvoters);
    }

    /// Plans and applies a vote against the current membership.
    pub fn vote(&mut self, voter: &T, action: VoteAction) -> Result<VoteUpdate<T>, VoteError> {
        let update = plan_vote(voter, self.snapshot(voter), action)?;
        self.apply(&update);
        Ok(update)
    }

    fn apply_op(set: &mut HashSet<T>, op: &SetOp<T>) {
        match op {
            SetOp::Add(user) => { set.insert(user.clone()); }
            SetOp::Remove(user) => { set.remove(user); }
            SetOp::None => {}
        }
    }

    pub fn upvoters(&self) -> &HashSet<T> { &self.upvoters }
    pub fn downvoters(&self) -> &HashSet<T> { &self.downvoters }
    pub fn upvotes(&self) -> usize { self.upvoters.len() }
    pub fn downvotes(&self) -> usize { self.downvoters.len() }

    pub fn score(&self) -> i64 {
        self.upvotes() as i64 - self.downvotes() as i64
    }

    pub fn is_disjoint(&self) -> bool {
        self.upvoters.is_disjoint(&self.downvoters)
    }
}
