use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use time::OffsetDateTime;
use uuid::Uuid;
use shared::{
    Answer, AnswerSort, AuthorSummary, Pagination, Page, ProfileFields, Question, QuestionFilter,
    SetOp, Tag, TagFilter, User, UserFilter, UserProfile, VotableKind, VoteTally, VoteUpdate,
    VoterSets, CreateUserRequest,
};

const QUESTION_SELECT: &str = "SELECT q.id, q.title, q.content, q.author_id, \
    u.name AS author_name, u.picture AS author_picture, q.views, q.upvoters, q.downvoters, q.created_at, \
    (SELECT COUNT(*) FROM answers a WHERE a.question_id = q.id) AS answer_count, \
    COALESCE((SELECT array_agg(t.name ORDER BY t.name) FROM question_tags qt \
        JOIN tags t ON t.id = qt.tag_id WHERE qt.question_id = q.id), '{}') AS tags \
    FROM questions q JOIN users u ON u.id = q.author_id";

const ANSWER_SELECT: &str = "SELECT a.id, a.question_id, a.content, a.author_id, \
    u.name AS author_name, u.picture AS author_picture, a.upvoters, a.downvoters, a.created_at \
    FROM answers a JOIN users u ON u.id = a.author_id";

const TAG_SELECT: &str = "SELECT t.id, t.name, t.description, t.created_at, \
    COUNT(qt.question_id) AS question_count \
    FROM tags t LEFT JOIN question_tags qt ON qt.tag_id = t.id";

const USER_COLUMNS: &str = "id, name, username, email, picture, bio, location, portfolio_website, reputation, joined_at";

const HOT_QUESTIONS: i64 = 5;
const POPULAR_TAGS: i64 = 5;

#[derive(FromRow)]
struct QuestionRow {
    id: Uuid,
    title: String,
    content: String,
    author_id: Uuid,
    author_name: String,
    author_picture: String,
    views: i32,
    upvoters: Vec<Uuid>,
    downvoters: Vec<Uuid>,
    created_at: OffsetDateTime,
    answer_count: i64,
    tags: Vec<String>,
}

impl From<QuestionRow> for Question {
    fn from(row: QuestionRow) -> Self {
        Question {
            id: row.id,
            title: row.title,
            content: row.content,
            author: AuthorSummary { id: row.author_id, name: row.author_name, picture: row.author_picture },
            tags: row.tags,
            views: row.views,
            answer_count: row.answer_count,
            votes: VoterSets::from_parts(row.upvoters, row.downvoters),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct AnswerRow {
    id: Uuid,
    question_id: Uuid,
    content: String,
    author_id: Uuid,
    author_name: String,
    author_picture: String,
    upvoters: Vec<Uuid>,
    downvoters: Vec<Uuid>,
    created_at: OffsetDateTime,
}

impl From<AnswerRow> for Answer {
    fn from(row: AnswerRow) -> Self {
        Answer {
            id: row.id,
            question_id: row.question_id,
            content: row.content,
            author: AuthorSummary { id: row.author_id, name: row.author_name, picture: row.author_picture },
            votes: VoterSets::from_parts(row.upvoters, row.downvoters),
            created_at: row.created_at,
        }
    }
}

#[derive(FromRow)]
struct TallyRow {
    upvotes: i32,
    downvotes: i32,
}

impl From<TallyRow> for VoteTally {
    fn from(row: TallyRow) -> Self {
        VoteTally {
            upvotes: row.upvotes.max(0) as usize,
            downvotes: row.downvotes.max(0) as usize,
        }
    }
}

#[derive(FromRow)]
struct AppliedVoteRow {
    author_id: Uuid,
    question_id: Uuid,
    upvotes: i32,
    downvotes: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedVote {
    pub author_id: Uuid,
    pub question_id: Uuid,
    pub tally: VoteTally,
}

/// Author and parent question of a post, used for ownership checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRow)]
pub struct PostOwner {
    pub author_id: Uuid,
    pub question_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionScope<'a> {
    All,
    Tag(&'a str),
    Author(Uuid),
    SavedBy(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerScope {
    Question(Uuid),
    Author(Uuid),
}

pub(crate) fn question_order(filter: QuestionFilter) -> &'static str {
    match filter {
        QuestionFilter::Newest => "q.created_at DESC",
        QuestionFilter::Frequent => "q.views DESC, q.created_at DESC",
        QuestionFilter::Unanswered => "q.created_at DESC",
        QuestionFilter::Popular => "cardinality(q.upvoters) - cardinality(q.downvoters) DESC, q.views DESC, q.created_at DESC",
    }
}

pub(crate) fn answer_order(sort: AnswerSort) -> &'static str {
    match sort {
        AnswerSort::HighestUpvotes => "cardinality(a.upvoters) DESC, a.created_at DESC",
        AnswerSort::LowestUpvotes => "cardinality(a.upvoters) ASC, a.created_at DESC",
        AnswerSort::Recent => "a.created_at DESC",
        AnswerSort::Old => "a.created_at ASC",
    }
}

pub(crate) fn tag_order(filter: TagFilter) -> &'static str {
    match filter {
        TagFilter::Popular => "question_count DESC, t.name ASC",
        TagFilter::Recent => "t.created_at DESC",
        TagFilter::Name => "t.name ASC",
        TagFilter::Old => "t.created_at ASC",
    }
}

pub(crate) fn user_order(filter: UserFilter) -> &'static str {
    match filter {
        UserFilter::NewUsers => "joined_at DESC",
        UserFilter::OldUsers => "joined_at ASC",
        UserFilter::TopContributors => "reputation DESC, joined_at ASC",
    }
}

fn set_expression(column: &str, op: &SetOp<Uuid>) -> String {
    match op {
        SetOp::Add(_) => format!("array_append(array_remove({column}, $2), $2)"),
        SetOp::Remove(_) => format!("array_remove({column}, $2)"),
        SetOp::None => column.to_string(),
    }
}

/// Single-statement update for both voter arrays; `$1` is the target, `$2` the voter.
pub(crate) fn vote_update_sql(kind: VotableKind, update: &VoteUpdate<Uuid>) -> String {
    let question_column = match kind {
        VotableKind::Question => "id",
        VotableKind::Answer => "question_id",
    };
    format!(
        "UPDATE {table} SET upvoters = {up}, downvoters = {down} WHERE id = $1 \
         RETURNING author_id, {question_column} AS question_id, \
         cardinality(upvoters) AS upvotes, cardinality(downvoters) AS downvotes",
        table = kind.table(),
        up = set_expression("upvoters", &update.upvoters),
        down = set_expression("downvoters", &update.downvoters),
    )
}

pub(crate) fn vote_lock_sql(kind: VotableKind) -> String {
    format!(
        "SELECT cardinality(upvoters) AS upvotes, cardinality(downvoters) AS downvotes \
         FROM {} WHERE id = $1 FOR UPDATE",
        kind.table()
    )
}

/// Reputation owed to the author for a vote, from the tallies around the update.
/// Self votes and no-op updates earn nothing.
pub(crate) fn reputation_delta(
    before: VoteTally,
    after: VoteTally,
    author: Uuid,
    voter: Uuid,
    points_per_vote: i32,
) -> i32 {
    if author == voter {
        return 0;
    }
    (after.score() - before.score()) as i32 * points_per_vote
}

fn push_page(qb: &mut QueryBuilder<'_, Postgres>, page: Pagination) {
    qb.push(" LIMIT ").push_bind(page.fetch_limit());
    qb.push(" OFFSET ").push_bind(page.offset());
}

pub struct Queries;

impl Queries {
    pub async fn list_questions(
        pool: &PgPool,
        scope: QuestionScope<'_>,
        filter: QuestionFilter,
        search: Option<String>,
        page: Pagination,
    ) -> Result<Page<Question>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(QUESTION_SELECT);
        qb.push(" WHERE TRUE");

        match scope {
            QuestionScope::All => {}
            QuestionScope::Tag(name) => {
                qb.push(" AND EXISTS (SELECT 1 FROM question_tags qt JOIN tags t ON t.id = qt.tag_id \
                          WHERE qt.question_id = q.id AND t.name = ")
                    .push_bind(name.to_string())
                    .push(")");
            }
            QuestionScope::Author(author) => {
                qb.push(" AND q.author_id = ").push_bind(author);
            }
            QuestionScope::SavedBy(user) => {
                qb.push(" AND q.id IN (SELECT unnest(saved) FROM users WHERE id = ")
                    .push_bind(user)
                    .push(")");
            }
        }

        if let Some(pattern) = search {
            qb.push(" AND (q.title ILIKE ").push_bind(pattern.clone())
                .push(" OR q.content ILIKE ").push_bind(pattern)
                .push(")");
        }

        if filter == QuestionFilter::Unanswered {
            qb.push(" AND NOT EXISTS (SELECT 1 FROM answers a WHERE a.question_id = q.id)");
        }

        qb.push(" ORDER BY ").push(question_order(filter));
        push_page(&mut qb, page);

        let rows = qb.build_query_as::<QuestionRow>().fetch_all(pool).await?;
        Ok(page.into_page(rows.into_iter().map(Question::from).collect()))
    }

    pub async fn hot_questions(pool: &PgPool) -> Result<Vec<Question>, sqlx::Error> {
        let sql = format!(
            "{QUESTION_SELECT} ORDER BY q.views DESC, \
             cardinality(q.upvoters) - cardinality(q.downvoters) DESC LIMIT $1"
        );
        let rows = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(HOT_QUESTIONS)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Question::from).collect())
    }

    pub async fn get_question(pool: &PgPool, id: Uuid) -> Result<Option<Question>, sqlx::Error> {
        let sql = format!("{QUESTION_SELECT} WHERE q.id = $1");
        let row = sqlx::query_as::<_, QuestionRow>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(Question::from))
    }

    pub async fn question_author(pool: &PgPool, id: Uuid) -> Result<Option<Uuid>, sqlx::Error> {
        sqlx::query_scalar("SELECT author_id FROM questions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn create_question(
        pool: &PgPool,
        author: Uuid,
        title: &str,
        content: &str,
        tags: &[String],
        reputation: i32,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let mut tx = pool.begin().await?;

        sqlx::query("INSERT INTO questions (id, title, content, author_id) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(title)
            .bind(content)
            .bind(author)
            .execute(&mut *tx)
            .await?;

        for name in tags {
            let tag_id: Uuid = sqlx::query_scalar(
                "INSERT INTO tags (id, name) VALUES ($1, $2) \
                 ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name RETURNING id",
            )
            .bind(Uuid::new_v4())
            .bind(name)
            .fetch_one(&mut *tx)
            .await?;

            sqlx::query("INSERT INTO question_tags (question_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
                .bind(id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("UPDATE users SET reputation = reputation + $2 WHERE id = $1")
            .bind(author)
            .bind(reputation)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    pub async fn update_question(
        pool: &PgPool,
        id: Uuid,
        author: Uuid,
        title: &str,
        content: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("UPDATE questions SET title = $3, content = $4 WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author)
            .bind(title)
            .bind(content)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn delete_question(pool: &PgPool, id: Uuid, author: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM questions WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn increment_views(pool: &PgPool, id: Uuid) -> Result<Option<i32>, sqlx::Error> {
        sqlx::query_scalar("UPDATE questions SET views = views + 1 WHERE id = $1 RETURNING views")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Applies a planned vote and the author's reputation change in one transaction.
    ///
    /// The row is locked first; reputation follows the tally change, not the planned operations.
    pub async fn apply_vote(
        pool: &PgPool,
        kind: VotableKind,
        target: Uuid,
        voter: Uuid,
        update: &VoteUpdate<Uuid>,
        points_per_vote: i32,
    ) -> Result<Option<AppliedVote>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(before) = sqlx::query_as::<_, TallyRow>(&vote_lock_sql(kind))
            .bind(target)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(None);
        };
        let before = VoteTally::from(before);

        let row = sqlx::query_as::<_, AppliedVoteRow>(&vote_update_sql(kind, update))
            .bind(target)
            .bind(voter)
            .fetch_one(&mut *tx)
            .await?;
        let tally = VoteTally {
            upvotes: row.upvotes.max(0) as usize,
            downvotes: row.downvotes.max(0) as usize,
        };

        let delta = reputation_delta(before, tally, row.author_id, voter, points_per_vote);
        if delta != 0 {
            sqlx::query("UPDATE users SET reputation = reputation + $2 WHERE id = $1")
                .bind(row.author_id)
                .bind(delta)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(Some(AppliedVote {
            author_id: row.author_id,
            question_id: row.question_id,
            tally,
        }))
    }

    pub async fn list_answers(
        pool: &PgPool,
        scope: AnswerScope,
        sort: AnswerSort,
        page: Pagination,
    ) -> Result<Page<Answer>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(ANSWER_SELECT);
        match scope {
            AnswerScope::Question(id) => qb.push(" WHERE a.question_id = ").push_bind(id),
            AnswerScope::Author(id) => qb.push(" WHERE a.author_id = ").push_bind(id),
        };
        qb.push(" ORDER BY ").push(answer_order(sort));
        push_page(&mut qb, page);

        let rows = qb.build_query_as::<AnswerRow>().fetch_all(pool).await?;
        Ok(page.into_page(rows.into_iter().map(Answer::from).collect()))
    }

    pub async fn create_answer(
        pool: &PgPool,
        question_id: Uuid,
        author: Uuid,
        content: &str,
        reputation: i32,
    ) -> Result<Uuid, sqlx::Error> {
        let id = Uuid::new_v4();
        let mut tx = pool.begin().await?;

        sqlx::query("INSERT INTO answers (id, question_id, author_id, content) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(question_id)
            .bind(author)
            .bind(content)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE users SET reputation = reputation + $2 WHERE id = $1")
            .bind(author)
            .bind(reputation)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(id)
    }

    pub async fn answer_owner(pool: &PgPool, id: Uuid) -> Result<Option<PostOwner>, sqlx::Error> {
        sqlx::query_as::<_, PostOwner>("SELECT author_id, question_id FROM answers WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_answer(pool: &PgPool, id: Uuid, author: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM answers WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn list_tags(
        pool: &PgPool,
        filter: TagFilter,
        search: Option<String>,
        page: Pagination,
    ) -> Result<Page<Tag>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(TAG_SELECT);
        if let Some(pattern) = search {
            qb.push(" WHERE t.name ILIKE ").push_bind(pattern);
        }
        qb.push(" GROUP BY t.id ORDER BY ").push(tag_order(filter));
        push_page(&mut qb, page);

        let tags = qb.build_query_as::<Tag>().fetch_all(pool).await?;
        Ok(page.into_page(tags))
    }

    pub async fn popular_tags(pool: &PgPool) -> Result<Vec<Tag>, sqlx::Error> {
        let sql = format!("{TAG_SELECT} GROUP BY t.id ORDER BY {} LIMIT $1", tag_order(TagFilter::Popular));
        sqlx::query_as::<_, Tag>(&sql)
            .bind(POPULAR_TAGS)
            .fetch_all(pool)
            .await
    }

    pub async fn tag_exists(pool: &PgPool, name: &str) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM tags WHERE name = $1)")
            .bind(name)
            .fetch_one(pool)
            .await
    }

    pub async fn create_user(pool: &PgPool, id: Uuid, request: &CreateUserRequest) -> Result<User, sqlx::Error> {
        let sql = format!(
            "INSERT INTO users (id, name, username, email, picture, bio, location, portfolio_website) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&request.profile.name)
            .bind(&request.profile.username)
            .bind(&request.email)
            .bind(&request.picture)
            .bind(&request.profile.bio)
            .bind(&request.profile.location)
            .bind(&request.profile.portfolio_website)
            .fetch_one(pool)
            .await
    }

    pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>, sqlx::Error> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn user_profile(pool: &PgPool, id: Uuid) -> Result<Option<UserProfile>, sqlx::Error> {
        let Some(user) = Self::get_user(pool, id).await? else { return Ok(None) };

        let (total_questions, total_answers): (i64, i64) = sqlx::query_as(
            "SELECT (SELECT COUNT(*) FROM questions WHERE author_id = $1), \
                    (SELECT COUNT(*) FROM answers WHERE author_id = $1)",
        )
        .bind(id)
        .fetch_one(pool)
        .await?;

        Ok(Some(UserProfile { user, total_questions, total_answers }))
    }

    pub async fn list_users(
        pool: &PgPool,
        filter: UserFilter,
        search: Option<String>,
        page: Pagination,
    ) -> Result<Page<User>, sqlx::Error> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        if let Some(pattern) = search {
            qb.push(" WHERE name ILIKE ").push_bind(pattern.clone())
                .push(" OR username ILIKE ").push_bind(pattern);
        }
        qb.push(" ORDER BY ").push(user_order(filter));
        push_page(&mut qb, page);

        let users = qb.build_query_as::<User>().fetch_all(pool).await?;
        Ok(page.into_page(users))
    }

    pub async fn update_profile(pool: &PgPool, id: Uuid, profile: &ProfileFields) -> Result<Option<User>, sqlx::Error> {
        let sql = format!(
            "UPDATE users SET name = $2, username = $3, bio = $4, location = $5, portfolio_website = $6 \
             WHERE id = $1 RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(&profile.name)
            .bind(&profile.username)
            .bind(&profile.bio)
            .bind(&profile.location)
            .bind(&profile.portfolio_website)
            .fetch_optional(pool)
            .await
    }

    pub async fn delete_user(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Flips membership of `question` in the user's saved list; `None` if the user is missing.
    pub async fn toggle_saved(pool: &PgPool, user: Uuid, question: Uuid) -> Result<Option<bool>, sqlx::Error> {
        sqlx::query_scalar(
            "UPDATE users SET saved = CASE WHEN $2 = ANY(saved) \
                 THEN array_remove(saved, $2) ELSE array_append(saved, $2) END \
             WHERE id = $1 RETURNING $2 = ANY(saved)",
        )
        .bind(user)
        .bind(question)
        .fetch_optional(pool)
        .await
    }
}
