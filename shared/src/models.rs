use serde::{Serialize, Deserialize};
use time::OffsetDateTime;
use uuid::Uuid;
use crate::vote_logic::{VoteAction, VoteIntent, VoteSnapshot, VoterSets};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VotableKind {
    Question,
    Answer,
}

impl VotableKind {
    pub const fn table(self) -> &'static str {
        match self {
            VotableKind::Question => "questions",
            VotableKind::Answer => "answers",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorSummary {
    pub id: Uuid,
    pub name: String,
    pub picture: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub author: AuthorSummary,
    pub tags: Vec<String>,
    pub views: i32,
    pub answer_count: i64,
    #[serde(flatten)]
    pub votes: VoterSets<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub id: Uuid,
    pub question_id: Uuid,
    pub content: String,
    pub author: AuthorSummary,
    #[serde(flatten)]
    pub votes: VoterSets<Uuid>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "backend", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub username: String,
    pub email: String,
    pub picture: String,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub portfolio_website: Option<String>,
    pub reputation: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub user: User,
    pub total_questions: i64,
    pub total_answers: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "backend", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub question_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTally {
    pub upvotes: usize,
    pub downvotes: usize,
}

impl VoteTally {
    pub fn score(&self) -> i64 {
        self.upvotes as i64 - self.downvotes as i64
    }
}

impl<T: crate::vote_logic::VoterId> From<&VoterSets<T>> for VoteTally {
    fn from(sets: &VoterSets<T>) -> Self {
        Self { upvotes: sets.upvotes(), downvotes: sets.downvotes() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveToggled {
    pub question_id: Uuid,
    pub saved: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Created {
    pub id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskQuestionRequest {
    pub csrf_token: String,
    pub title: String,
    pub content: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditQuestionRequest {
    pub csrf_token: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAnswerRequest {
    pub csrf_token: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub snapshot: VoteSnapshot,
    pub action: VoteAction,
}

impl VoteRequest {
    pub fn into_intent(self, target: Uuid) -> VoteIntent<Uuid> {
        VoteIntent {
            target,
            voter: self.user_id,
            snapshot: self.snapshot,
            action: self.action,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileFields {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub portfolio_website: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserRequest {
    #[serde(flatten)]
    pub profile: ProfileFields,
    pub email: String,
    #[serde(default)]
    pub picture: String,
}

impl Question {
    pub fn score(&self) -> i64 {
        self.votes.score()
    }

    pub fn is_unanswered(&self) -> bool {
        self.answer_count == 0
    }
}
