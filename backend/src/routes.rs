use rocket::{State, get, post, patch, delete, FromForm, serde::json::Json, http::Status};
use tracing::{debug, info, instrument};
use sqlx::PgPool;
use uuid::Uuid;
use shared::{
    search_pattern, validate_answer, validate_new_user, validate_profile, validate_question,
    validate_question_edit, AffectedView, Answer, AnswerSort, AskQuestionRequest, CreateUserRequest,
    Created, EditQuestionRequest, Mutation, Page, Pagination, PostAnswerRequest, ProfileFields,
    Question, QuestionFilter, SaveToggled, Tag, TagFilter, User, UserFilter, UserInfo, UserProfile,
    VotableKind, VoteRequest, VoteTally,
};
use crate::{
    config::AppConfig,
    csrf::CsrfGuard,
    error::ApiError,
    processor::{PostProcessor, VoteProcessor},
    queries::{AnswerScope, Queries, QuestionScope},
    rate_limiter::RateLimiter,
    utils::{parse_id, require_self, require_user, screen_text},
};

pub struct AppState {
    pub vote_limiter: RateLimiter,
    pub post_limiter: RateLimiter,
    pub csrf: CsrfGuard,
    pub config: AppConfig,
    pub db: PgPool,
}

impl AppState {
    pub fn new(pool: PgPool, config: AppConfig) -> Self {
        Self {
            vote_limiter: RateLimiter::new(config.vote_limit, config.vote_window_minutes),
            post_limiter: RateLimiter::new(config.post_limit, config.post_window_minutes),
            csrf: CsrfGuard::new(),
            config,
            db: pool,
        }
    }
}

/// Query string shared by the paginated listings.
#[derive(FromForm, Debug, Default)]
pub struct ListQuery {
    filter: Option<String>,
    sort: Option<String>,
    q: Option<String>,
    page: Option<String>,
    #[field(name = "pageSize")]
    page_size: Option<String>,
}

impl ListQuery {
    fn pagination(&self, config: &AppConfig) -> Result<Pagination, ApiError> {
        Ok(Pagination::parse(self.page.as_deref(), self.page_size.as_deref(), config.max_page_size)?)
    }

    fn search(&self) -> Option<String> {
        search_pattern(self.q.as_deref())
    }
}

#[get("/csrf-token")]
pub async fn get_csrf_token(state: &State<AppState>) -> Result<String, ApiError> {
    state.csrf.generate_token()
}

#[rocket::options("/<_..>")]
pub async fn all_options() -> Status {
    Status::Ok
}

#[get("/questions?<query..>")]
pub async fn list_questions(state: &State<AppState>, query: ListQuery) -> Result<Json<Page<Question>>, ApiError> {
    let filter = QuestionFilter::parse_opt(query.filter.as_deref())?;
    let page = query.pagination(&state.config)?;
    let questions = Queries::list_questions(&state.db, QuestionScope::All, filter, query.search(), page).await?;
    Ok(Json(questions))
}

#[get("/questions/hot")]
pub async fn hot_questions(state: &State<AppState>) -> Result<Json<Vec<Question>>, ApiError> {
    Ok(Json(Queries::hot_questions(&state.db).await?))
}

#[get("/questions/<id>")]
pub async fn get_question(state: &State<AppState>, id: &str) -> Result<Json<Question>, ApiError> {
    let id = parse_id(id)?;
    Queries::get_question(&state.db, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("Question"))
}

#[instrument(skip(state, request, user_info))]
#[post("/questions", format = "json", data = "<request>")]
pub async fn ask_question(
    state: &State<AppState>,
    request: Json<AskQuestionRequest>,
    user_info: UserInfo,
) -> Result<Json<Mutation<Created>>, ApiError> {
    let author = require_user(&user_info)?;
    let request = request.into_inner();

    debug!("Validating CSRF token for question: length={}", request.csrf_token.len());
    state.csrf.verify_token(&request.csrf_token)?;

    let tags = validate_question(&request)?;
    screen_text("title", &request.title)?;
    screen_text("question", &request.content)?;
    for tag in &tags {
        screen_text("tags", tag)?;
    }

    state.post_limiter.check_rate_limit(&format!("post:{}", user_info.user_fingerprint))?;

    PostProcessor::ask_question(&state.db, author, &request, &tags).await.map(Json)
}

#[instrument(skip(state, request, user_info), fields(question_id = %id))]
#[patch("/questions/<id>", format = "json", data = "<request>")]
pub async fn edit_question(
    state: &State<AppState>,
    id: &str,
    request: Json<EditQuestionRequest>,
    user_info: UserInfo,
) -> Result<Json<Mutation<Created>>, ApiError> {
    let id = parse_id(id)?;
    let caller = require_user(&user_info)?;
    let request = request.into_inner();

    state.csrf.verify_token(&request.csrf_token)?;
    validate_question_edit(&request)?;
    screen_text("title", &request.title)?;
    screen_text("question", &request.content)?;

    PostProcessor::edit_question(&state.db, id, caller, &request).await.map(Json)
}

#[instrument(skip(state, user_info), fields(question_id = %id))]
#[delete("/questions/<id>")]
pub async fn delete_question(
    state: &State<AppState>,
    id: &str,
    user_info: UserInfo,
) -> Result<Json<Mutation<Created>>, ApiError> {
    let id = parse_id(id)?;
    let caller = require_user(&user_info)?;
    PostProcessor::delete_question(&state.db, id, caller).await.map(Json)
}

#[post("/questions/<id>/view")]
pub async fn view_question(state: &State<AppState>, id: &str) -> Result<Json<Mutation<i32>>, ApiError> {
    let id = parse_id(id)?;
    PostProcessor::view_question(&state.db, id).await.map(Json)
}

async fn cast_vote(
    state: &AppState,
    kind: VotableKind,
    id: &str,
    request: VoteRequest,
    user_info: &UserInfo,
) -> Result<Json<Mutation<VoteTally>>, ApiError> {
    let intent = request.into_intent(parse_id(id)?);
    intent.plan()?;

    if !user_info.is_user(intent.voter) {
        require_user(user_info)?;
        return Err(ApiError::Forbidden("You cannot vote on behalf of another user"));
    }

    state.vote_limiter.check_rate_limit(&format!("vote:{}", user_info.user_fingerprint))?;

    VoteProcessor::cast_vote(&state.db, kind, &intent).await.map(Json)
}

#[instrument(skip(state, request, user_info), fields(question_id = %id))]
#[post("/questions/<id>/vote", format = "json", data = "<request>")]
pub async fn vote_question(
    state: &State<AppState>,
    id: &str,
    request: Json<VoteRequest>,
    user_info: UserInfo,
) -> Result<Json<Mutation<VoteTally>>, ApiError> {
    cast_vote(state, VotableKind::Question, id, request.into_inner(), &user_info).await
}

#[get("/questions/<id>/answers?<query..>")]
pub async fn list_answers(
    state: &State<AppState>,
    id: &str,
    query: ListQuery,
) -> Result<Json<Page<Answer>>, ApiError> {
    let id = parse_id(id)?;
    let sort = AnswerSort::parse_opt(query.sort.as_deref().or(query.filter.as_deref()))?;
    let page = query.pagination(&state.config)?;

    if Queries::question_author(&state.db, id).await?.is_none() {
        return Err(ApiError::NotFound("Question"));
    }
    Ok(Json(Queries::list_answers(&state.db, AnswerScope::Question(id), sort, page).await?))
}

#[instrument(skip(state, request, user_info), fields(question_id = %id))]
#[post("/questions/<id>/answers", format = "json", data = "<request>")]
pub async fn post_answer(
    state: &State<AppState>,
    id: &str,
    request: Json<PostAnswerRequest>,
    user_info: UserInfo,
) -> Result<Json<Mutation<Created>>, ApiError> {
    let question_id = parse_id(id)?;
    let author = require_user(&user_info)?;
    let request = request.into_inner();

    debug!("Validating CSRF token for answer: length={}", request.csrf_token.len());
    state.csrf.verify_token(&request.csrf_token)?;
    validate_answer(&request)?;
    screen_text("answer", &request.content)?;

    state.post_limiter.check_rate_limit(&format!("post:{}", user_info.user_fingerprint))?;

    PostProcessor::post_answer(&state.db, question_id, author, &request).await.map(Json)
}

#[instrument(skip(state, user_info), fields(answer_id = %id))]
#[delete("/answers/<id>")]
pub async fn delete_answer(
    state: &State<AppState>,
    id: &str,
    user_info: UserInfo,
) -> Result<Json<Mutation<Created>>, ApiError> {
    let id = parse_id(id)?;
    let caller = require_user(&user_info)?;
    PostProcessor::delete_answer(&state.db, id, caller).await.map(Json)
}

#[instrument(skip(state, request, user_info), fields(answer_id = %id))]
#[post("/answers/<id>/vote", format = "json", data = "<request>")]
pub async fn vote_answer(
    state: &State<AppState>,
    id: &str,
    request: Json<VoteRequest>,
    user_info: UserInfo,
) -> Result<Json<Mutation<VoteTally>>, ApiError> {
    cast_vote(state, VotableKind::Answer, id, request.into_inner(), &user_info).await
}

#[get("/tags?<query..>")]
pub async fn list_tags(state: &State<AppState>, query: ListQuery) -> Result<Json<Page<Tag>>, ApiError> {
    let filter = TagFilter::parse_opt(query.filter.as_deref())?;
    let page = query.pagination(&state.config)?;
    Ok(Json(Queries::list_tags(&state.db, filter, query.search(), page).await?))
}

#[get("/tags/popular")]
pub async fn popular_tags(state: &State<AppState>) -> Result<Json<Vec<Tag>>, ApiError> {
    Ok(Json(Queries::popular_tags(&state.db).await?))
}

#[get("/tags/<name>/questions?<query..>")]
pub async fn tag_questions(
    state: &State<AppState>,
    name: &str,
    query: ListQuery,
) -> Result<Json<Page<Question>>, ApiError> {
    let name = name.trim().to_lowercase();
    let filter = QuestionFilter::parse_opt(query.filter.as_deref())?;
    let page = query.pagination(&state.config)?;

    if !Queries::tag_exists(&state.db, &name).await? {
        return Err(ApiError::NotFound("Tag"));
    }
    let questions = Queries::list_questions(&state.db, QuestionScope::Tag(&name), filter, query.search(), page).await?;
    Ok(Json(questions))
}

#[instrument(skip(state, request, user_info))]
#[post("/users", format = "json", data = "<request>")]
pub async fn create_user(
    state: &State<AppState>,
    request: Json<CreateUserRequest>,
    user_info: UserInfo,
) -> Result<Json<Mutation<User>>, ApiError> {
    let id = require_user(&user_info)?;
    let mut request = request.into_inner();

    validate_new_user(&mut request)?;
    screen_text("name", &request.profile.name)?;
    screen_text("username", &request.profile.username)?;

    let user = Queries::create_user(&state.db, id, &request).await?;
    info!("👤 Registered user {} ({})", user.username, user.id);
    Ok(Json(Mutation::new(user).revalidate(AffectedView::Community)))
}

#[get("/users?<query..>")]
pub async fn list_users(state: &State<AppState>, query: ListQuery) -> Result<Json<Page<User>>, ApiError> {
    let filter = UserFilter::parse_opt(query.filter.as_deref())?;
    let page = query.pagination(&state.config)?;
    Ok(Json(Queries::list_users(&state.db, filter, query.search(), page).await?))
}

#[get("/users/<id>")]
pub async fn get_user(state: &State<AppState>, id: &str) -> Result<Json<UserProfile>, ApiError> {
    let id = parse_id(id)?;
    Queries::user_profile(&state.db, id)
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound("User"))
}

#[instrument(skip(state, request, user_info), fields(user_id = %id))]
#[patch("/users/<id>", format = "json", data = "<request>")]
pub async fn update_user(
    state: &State<AppState>,
    id: &str,
    request: Json<ProfileFields>,
    user_info: UserInfo,
) -> Result<Json<Mutation<User>>, ApiError> {
    let id = parse_id(id)?;
    require_self(&user_info, id)?;
    let mut profile = request.into_inner();

    validate_profile(&mut profile)?;
    screen_text("name", &profile.name)?;
    screen_text("username", &profile.username)?;
    if let Some(bio) = &profile.bio {
        screen_text("bio", bio)?;
    }

    let user = Queries::update_profile(&state.db, id, &profile)
        .await?
        .ok_or(ApiError::NotFound("User"))?;
    Ok(Json(Mutation::new(user)
        .revalidate(AffectedView::Profile(id))
        .revalidate(AffectedView::Community)))
}

#[instrument(skip(state, user_info), fields(user_id = %id))]
#[delete("/users/<id>")]
pub async fn delete_user(
    state: &State<AppState>,
    id: &str,
    user_info: UserInfo,
) -> Result<Json<Mutation<Created>>, ApiError> {
    let id = parse_id(id)?;
    require_self(&user_info, id)?;

    if !Queries::delete_user(&state.db, id).await? {
        return Err(ApiError::NotFound("User"));
    }
    info!("👋 Deleted user {}", id);
    Ok(Json(Mutation::new(Created { id })
        .revalidate(AffectedView::Home)
        .revalidate(AffectedView::Community)
        .revalidate(AffectedView::Tags)))
}

async fn ensure_user(state: &AppState, id: Uuid) -> Result<(), ApiError> {
    match Queries::get_user(&state.db, id).await? {
        Some(_) => Ok(()),
        None => Err(ApiError::NotFound("User")),
    }
}

#[get("/users/<id>/questions?<query..>")]
pub async fn user_questions(
    state: &State<AppState>,
    id: &str,
    query: ListQuery,
) -> Result<Json<Page<Question>>, ApiError> {
    let id = parse_id(id)?;
    let page = query.pagination(&state.config)?;
    ensure_user(state, id).await?;
    let questions = Queries::list_questions(&state.db, QuestionScope::Author(id), QuestionFilter::Popular, None, page).await?;
    Ok(Json(questions))
}

#[get("/users/<id>/answers?<query..>")]
pub async fn user_answers(
    state: &State<AppState>,
    id: &str,
    query: ListQuery,
) -> Result<Json<Page<Answer>>, ApiError> {
    let id = parse_id(id)?;
    let page = query.pagination(&state.config)?;
    ensure_user(state, id).await?;
    Ok(Json(Queries::list_answers(&state.db, AnswerScope::Author(id), AnswerSort::HighestUpvotes, page).await?))
}

#[instrument(skip(state, user_info), fields(user_id = %id, question_id = %question_id))]
#[post("/users/<id>/saved/<question_id>")]
pub async fn toggle_saved(
    state: &State<AppState>,
    id: &str,
    question_id: &str,
    user_info: UserInfo,
) -> Result<Json<Mutation<SaveToggled>>, ApiError> {
    let id = parse_id(id)?;
    let question_id = parse_id(question_id)?;
    require_self(&user_info, id)?;
    PostProcessor::toggle_saved(&state.db, id, question_id).await.map(Json)
}

#[get("/users/<id>/saved?<query..>")]
pub async fn saved_questions(
    state: &State<AppState>,
    id: &str,
    query: ListQuery,
    user_info: UserInfo,
) -> Result<Json<Page<Question>>, ApiError> {
    let id = parse_id(id)?;
    require_self(&user_info, id)?;
    let filter = QuestionFilter::parse_opt(query.filter.as_deref())?;
    let page = query.pagination(&state.config)?;
    let questions = Queries::list_questions(&state.db, QuestionScope::SavedBy(id), filter, query.search(), page).await?;
    Ok(Json(questions))
}
