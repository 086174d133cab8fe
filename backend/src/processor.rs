use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;
use shared::{
    AffectedView, AskQuestionRequest, Created, EditQuestionRequest, Mutation, PostAnswerRequest,
    SaveToggled, VotableKind, VoteIntent, VoteTally,
};
use crate::error::ApiError;
use crate::queries::Queries;

pub const ASK_REPUTATION: i32 = 5;
pub const ANSWER_REPUTATION: i32 = 10;
pub const REPUTATION_PER_VOTE: i32 = 10;

fn label(kind: VotableKind) -> &'static str {
    match kind {
        VotableKind::Question => "Question",
        VotableKind::Answer => "Answer",
    }
}

pub struct VoteProcessor;

impl VoteProcessor {
    /// Plans the vote, then applies it as one atomic update on the target row.
    pub async fn cast_vote(
        pool: &PgPool,
        kind: VotableKind,
        intent: &VoteIntent<Uuid>,
    ) -> Result<Mutation<VoteTally>, ApiError> {
        let update = intent.plan()?;

        let applied = Queries::apply_vote(pool, kind, intent.target, intent.voter, &update, REPUTATION_PER_VOTE)
            .await?
            .ok_or(ApiError::NotFound(label(kind)))?;

        info!(
            "🗳️ {} {} on {} {}: +{}/-{}",
            intent.voter, intent.action.as_str(), label(kind), intent.target,
            applied.tally.upvotes, applied.tally.downvotes
        );

        Ok(Mutation::new(applied.tally).revalidate(AffectedView::Question(applied.question_id)))
    }
}

pub struct PostProcessor;

impl PostProcessor {
    pub async fn ask_question(
        pool: &PgPool,
        author: Uuid,
        request: &AskQuestionRequest,
        tags: &[String],
    ) -> Result<Mutation<Created>, ApiError> {
        let id = Queries::create_question(
            pool,
            author,
            request.title.trim(),
            request.content.trim(),
            tags,
            ASK_REPUTATION,
        )
        .await?;
        info!("❓ Question {} asked by {}", id, author);

        let mutation = tags.iter().fold(
            Mutation::new(Created { id })
                .revalidate(AffectedView::Home)
                .revalidate(AffectedView::Profile(author))
                .revalidate(AffectedView::Tags),
            |m, tag| m.revalidate(AffectedView::Tag(tag.clone())),
        );
        Ok(mutation)
    }

    async fn ensure_question_author(pool: &PgPool, id: Uuid, caller: Uuid) -> Result<(), ApiError> {
        match Queries::question_author(pool, id).await? {
            None => Err(ApiError::NotFound("Question")),
            Some(author) if author != caller => Err(ApiError::Forbidden("Only the author can change this question")),
            Some(_) => Ok(()),
        }
    }

    pub async fn edit_question(
        pool: &PgPool,
        id: Uuid,
        caller: Uuid,
        request: &EditQuestionRequest,
    ) -> Result<Mutation<Created>, ApiError> {
        Self::ensure_question_author(pool, id, caller).await?;
        if !Queries::update_question(pool, id, caller, request.title.trim(), request.content.trim()).await? {
            return Err(ApiError::NotFound("Question"));
        }
        info!("✏️ Question {} edited", id);
        Ok(Mutation::new(Created { id }).revalidate(AffectedView::Question(id)))
    }

    pub async fn delete_question(pool: &PgPool, id: Uuid, caller: Uuid) -> Result<Mutation<Created>, ApiError> {
        Self::ensure_question_author(pool, id, caller).await?;
        if !Queries::delete_question(pool, id, caller).await? {
            return Err(ApiError::NotFound("Question"));
        }
        info!("🗑️ Question {} deleted", id);
        Ok(Mutation::new(Created { id })
            .revalidate(AffectedView::Home)
            .revalidate(AffectedView::Profile(caller))
            .revalidate(AffectedView::Tags))
    }

    pub async fn view_question(pool: &PgPool, id: Uuid) -> Result<Mutation<i32>, ApiError> {
        let views = Queries::increment_views(pool, id)
            .await?
            .ok_or(ApiError::NotFound("Question"))?;
        Ok(Mutation::new(views))
    }

    pub async fn post_answer(
        pool: &PgPool,
        question_id: Uuid,
        author: Uuid,
        request: &PostAnswerRequest,
    ) -> Result<Mutation<Created>, ApiError> {
        if Queries::question_author(pool, question_id).await?.is_none() {
            return Err(ApiError::NotFound("Question"));
        }
        let id = Queries::create_answer(pool, question_id, author, request.content.trim(), ANSWER_REPUTATION).await?;
        info!("💬 Answer {} posted on {}", id, question_id);
        Ok(Mutation::new(Created { id })
            .revalidate(AffectedView::Question(question_id))
            .revalidate(AffectedView::Profile(author)))
    }

    pub async fn delete_answer(pool: &PgPool, id: Uuid, caller: Uuid) -> Result<Mutation<Created>, ApiError> {
        let owner = Queries::answer_owner(pool, id)
            .await?
            .ok_or(ApiError::NotFound("Answer"))?;
        if owner.author_id != caller {
            return Err(ApiError::Forbidden("Only the author can delete this answer"));
        }
        if !Queries::delete_answer(pool, id, caller).await? {
            return Err(ApiError::NotFound("Answer"));
        }
        info!("🗑️ Answer {} deleted", id);
        Ok(Mutation::new(Created { id })
            .revalidate(AffectedView::Question(owner.question_id))
            .revalidate(AffectedView::Profile(caller)))
    }

    pub async fn toggle_saved(pool: &PgPool, user: Uuid, question_id: Uuid) -> Result<Mutation<SaveToggled>, ApiError> {
        if Queries::question_author(pool, question_id).await?.is_none() {
            return Err(ApiError::NotFound("Question"));
        }
        let saved = match Queries::toggle_saved(pool, user, question_id).await? {
            Some(saved) => saved,
            None => {
                warn!("Saved toggle for unknown user {}", user);
                return Err(ApiError::NotFound("User"));
            }
        };
        Ok(Mutation::new(SaveToggled { question_id, saved })
            .revalidate(AffectedView::Question(question_id))
            .revalidate(AffectedView::Collection))
    }
}
