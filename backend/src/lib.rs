pub mod processor;
pub mod routes;
pub mod queries;
pub mod config;
pub mod cors;
pub mod csrf;
pub mod error;
pub mod utils;
pub mod rate_limiter;
pub mod catchers;
pub use shared::user_info;
pub use shared::{models::*, error::*, user_info::*};
pub use shared::vote_logic::{plan_vote, SetOp, VoteAction, VoteError, VoteSnapshot, VoteUpdate, VoterSets};

use rocket::{catchers, routes, Build, Rocket};
use crate::routes::*;
use crate::catchers::*;

/// Assembles the API with its state, CORS fairing and JSON error catchers.
pub fn build_rocket(state: AppState) -> Rocket<Build> {
    let cors = cors::Cors::new(state.config.allowed_origin.clone());

    rocket::build()
        .attach(cors)
        .manage(state)
        .mount(
            "/api",
            routes![
                get_csrf_token,
                all_options,
                list_questions,
                hot_questions,
                get_question,
                ask_question,
                edit_question,
                delete_question,
                view_question,
                vote_question,
                list_answers,
                post_answer,
                delete_answer,
                vote_answer,
                list_tags,
                popular_tags,
                tag_questions,
                create_user,
                list_users,
                get_user,
                update_user,
                delete_user,
                user_questions,
                user_answers,
                toggle_saved,
                saved_questions,
            ],
        )
        .register(
            "/",
            catchers![
                bad_request,
                unauthorized,
                forbidden,
                not_found,
                unprocessable,
                too_many_requests,
                internal_error,
            ],
        )
}
