#[cfg(test)]
mod tests {
    use uuid::Uuid;
    use crate::vote_logic::{plan_vote, SetOp, VoteAction, VoteError, VoteIntent, VoteSnapshot, VoteUpdate, VoterSets};
    use crate::filters::{search_pattern, AnswerSort, FilterError, Pagination, QuestionFilter, TagFilter, UserFilter};
    use crate::validation::*;
    use crate::views::{AffectedView, Mutation};
    use crate::models::*;
    use crate::user_info::{generate_server_fingerprint, parse_user_header};

    const U: &str = "user-1";

    fn sets(up: &[&'static str], down: &[&'static str]) -> VoterSets<&'static str> {
        VoterSets::from_parts(up.iter().copied(), down.iter().copied())
    }

    fn all_snapshots() -> [VoteSnapshot; 3] {
        [VoteSnapshot::NONE, VoteSnapshot::UPVOTED, VoteSnapshot::DOWNVOTED]
    }

    fn update(up: SetOp<&'static str>, down: SetOp<&'static str>) -> VoteUpdate<&'static str> {
        VoteUpdate { upvoters: up, downvoters: down }
    }

    #[test]
    fn test_case_table() {
        use SetOp::{Add, None, Remove};
        let cases = [
            (VoteAction::Upvote, VoteSnapshot::UPVOTED, update(Remove(U), None)),
            (VoteAction::Upvote, VoteSnapshot::DOWNVOTED, update(Add(U), Remove(U))),
            (VoteAction::Upvote, VoteSnapshot::NONE, update(Add(U), None)),
            (VoteAction::Downvote, VoteSnapshot::DOWNVOTED, update(None, Remove(U))),
            (VoteAction::Downvote, VoteSnapshot::UPVOTED, update(Remove(U), Add(U))),
            (VoteAction::Downvote, VoteSnapshot::NONE, update(None, Add(U))),
        ];
        for (action, snapshot, expected) in cases {
            assert_eq!(plan_vote(&U, snapshot, action).unwrap(), expected, "{action:?} from {snapshot:?}");
        }
    }

    #[test]
    fn test_never_both_gain_or_both_lose() {
        for action in [VoteAction::Upvote, VoteAction::Downvote] {
            for snapshot in all_snapshots() {
                let u = plan_vote(&U, snapshot, action).unwrap();
                let both_gain = matches!((&u.upvoters, &u.downvoters), (SetOp::Add(_), SetOp::Add(_)));
                let both_lose = matches!((&u.upvoters, &u.downvoters), (SetOp::Remove(_), SetOp::Remove(_)));
                assert!(!both_gain && !both_lose);
                assert!(!(u.upvoters.is_none() && u.downvoters.is_none()));
            }
        }
    }

    #[test]
    fn test_rejects_inconsistent_snapshot() {
        let both = VoteSnapshot { has_upvoted: true, has_downvoted: true };
        assert_eq!(plan_vote(&U, both, VoteAction::Upvote), Err(VoteError::InconsistentSnapshot));
        assert_eq!(plan_vote(&U, both, VoteAction::Downvote), Err(VoteError::InconsistentSnapshot));
    }

    #[test]
    fn test_rejects_missing_identifiers() {
        assert_eq!(plan_vote(&"  ", VoteSnapshot::NONE, VoteAction::Upvote), Err(VoteError::MissingVoter));
        assert_eq!(plan_vote(&Uuid::nil(), VoteSnapshot::NONE, VoteAction::Upvote), Err(VoteError::MissingVoter));

        let intent = VoteIntent {
            target: Uuid::nil(),
            voter: Uuid::new_v4(),
            snapshot: VoteSnapshot::NONE,
            action: VoteAction::Downvote,
        };
        assert_eq!(intent.plan(), Err(VoteError::MissingTarget));
    }

    #[test]
    fn test_upvote_without_prior_vote() {
        let mut v = sets(&[], &[]);
        v.vote(&U, VoteAction::Upvote).unwrap();
        assert!(v.upvoters().contains(U));
        assert!(!v.downvoters().contains(U));
    }

    #[test]
    fn test_upvote_again_toggles_off() {
        let mut v = sets(&[U], &[]);
        v.vote(&U, VoteAction::Upvote).unwrap();
        assert!(!v.upvoters().contains(U));
        assert!(!v.downvoters().contains(U));
    }

    #[test]
    fn test_switch_upvote_to_downvote() {
        let mut v = sets(&[U], &[]);
        v.vote(&U, VoteAction::Downvote).unwrap();
        assert!(v.downvoters().contains(U));
        assert!(!v.upvoters().contains(U));
    }

    #[test]
    fn test_double_toggle_returns_to_initial_state() {
        for action in [VoteAction::Upvote, VoteAction::Downvote] {
            let mut v = sets(&["other"], &["someone"]);
            let initial = v.clone();
            v.vote(&U, action).unwrap();
            assert_ne!(v, initial);
            v.vote(&U, action).unwrap();
            assert_eq!(v, initial, "double {action:?}");
        }
    }

    #[test]
    fn test_sets_stay_disjoint_over_sequences() {
        let voters = ["a", "b", "c"];
        let actions = [VoteAction::Upvote, VoteAction::Downvote];
        let mut v = sets(&[], &[]);
        // deterministic walk over voter/action combinations
        for step in 0..200usize {
            let voter = voters[step % voters.len()];
            let action = actions[(step / 3 + step / 7) % 2];
            v.vote(&voter, action).unwrap();
            assert!(v.is_disjoint(), "overlap after step {step}");
        }
        assert!(v.upvotes() + v.downvotes() <= voters.len());
    }

    #[test]
    fn test_score_delta_matches_applied_change() {
        for action in [VoteAction::Upvote, VoteAction::Downvote] {
            for snapshot in all_snapshots() {
                let mut v = match (snapshot.has_upvoted, snapshot.has_downvoted) {
                    (true, _) => sets(&[U], &[]),
                    (_, true) => sets(&[], &[U]),
                    _ => sets(&[], &[]),
                };
                let before = v.score();
                let u = plan_vote(&U, snapshot, action).unwrap();
                v.apply(&u);
                assert_eq!(v.score() - before, i64::from(u.score_delta()));
            }
        }
    }

    #[test]
    fn test_from_parts_resolves_overlap() {
        let v = sets(&["a", "b"], &["b"]);
        assert!(v.is_disjoint());
        assert_eq!(v.upvotes(), 1);
        assert_eq!(v.snapshot(&"b"), VoteSnapshot::DOWNVOTED);
    }

    #[test]
    fn test_vote_request_json() {
        let user = Uuid::new_v4();
        let json = format!(r#"{{"userId":"{user}","hasUpvoted":false,"hasDownvoted":true,"action":"upvote"}}"#);
        let request: VoteRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(request.snapshot, VoteSnapshot::DOWNVOTED);
        assert_eq!(request.action, VoteAction::Upvote);

        let target = Uuid::new_v4();
        let intent = request.into_intent(target);
        assert_eq!(intent.voter, user);
        assert_eq!(intent.plan().unwrap().downvoters, SetOp::Remove(user));

        let bad = format!(r#"{{"userId":"{user}","hasUpvoted":false,"hasDownvoted":false,"action":"sideways"}}"#);
        assert!(serde_json::from_str::<VoteRequest>(&bad).is_err());
    }

    #[test]
    fn test_closed_filters() {
        assert_eq!("frequent".parse::<QuestionFilter>(), Ok(QuestionFilter::Frequent));
        assert_eq!(QuestionFilter::parse_opt(None), Ok(QuestionFilter::Newest));
        assert_eq!(QuestionFilter::parse_opt(Some(" ")), Ok(QuestionFilter::Newest));
        assert_eq!(AnswerSort::parse_opt(None), Ok(AnswerSort::Recent));
        assert_eq!("topContributors".parse::<UserFilter>(), Ok(UserFilter::TopContributors));
        assert!(matches!(
            "recommended".parse::<QuestionFilter>(),
            Err(FilterError::Unknown { kind: "question filter", .. })
        ));
        assert!("Popular".parse::<TagFilter>().is_err());

        for filter in QuestionFilter::ALL {
            assert_eq!(filter.as_str().parse::<QuestionFilter>(), Ok(*filter));
        }
        for sort in AnswerSort::ALL {
            assert_eq!(sort.to_string().parse::<AnswerSort>(), Ok(*sort));
        }
    }

    #[test]
    fn test_pagination() {
        let p = Pagination::new(Some(3), Some(10), 50).unwrap();
        assert_eq!(p.offset(), 20);
        assert_eq!(p.fetch_limit(), 11);

        let page = p.into_page((0..11).collect::<Vec<_>>());
        assert!(page.is_next);
        assert_eq!(page.items.len(), 10);

        let page = p.into_page(vec![1, 2, 3]);
        assert!(!page.is_next);

        assert_eq!(Pagination::new(Some(0), None, 50), Err(FilterError::InvalidPage));
        assert_eq!(Pagination::new(None, Some(51), 50), Err(FilterError::InvalidPageSize(50)));
        assert_eq!(Pagination::new(None, None, 5).unwrap().page_size, 5);
    }

    #[test]
    fn test_pagination_from_raw_query() {
        assert_eq!(Pagination::parse(None, None, 50), Ok(Pagination::default()));
        assert_eq!(Pagination::parse(Some(" 2 "), Some(""), 50).unwrap().page, 2);
        assert_eq!(
            Pagination::parse(Some("abc"), None, 50),
            Err(FilterError::NotANumber { field: "page", value: "abc".into() })
        );
        assert!(matches!(
            Pagination::parse(None, Some("-5"), 50),
            Err(FilterError::NotANumber { field: "pageSize", .. })
        ));
        assert_eq!(Pagination::parse(Some("0"), None, 50), Err(FilterError::InvalidPage));
    }

    #[test]
    fn test_search_pattern_escapes_wildcards() {
        assert_eq!(search_pattern(None), None);
        assert_eq!(search_pattern(Some("   ")), None);
        assert_eq!(search_pattern(Some(" rust ")), Some("%rust%".into()));
        assert_eq!(search_pattern(Some("100%_done")), Some(r"%100\%\_done%".into()));
    }

    #[test]
    fn test_mutation_revalidation_paths() {
        let id = Uuid::new_v4();
        let m = Mutation::new(Created { id })
            .revalidate(AffectedView::Question(id))
            .revalidate(AffectedView::Home)
            .revalidate(AffectedView::Home);
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["revalidate"], serde_json::json!([format!("/question/{id}"), "/"]));
        assert_eq!(AffectedView::Tag("rust".into()).path(), "/tags/rust");
    }

    fn ask(title: &str, content: &str, tags: &[&str]) -> AskQuestionRequest {
        AskQuestionRequest {
            csrf_token: String::new(),
            title: title.into(),
            content: content.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    const BODY: &str = "How do I share state between rocket routes safely?";

    #[test]
    fn test_question_validation() {
        assert_eq!(validate_question(&ask("Rocket state", BODY, &[" Rust", "rocket "])).unwrap(), vec!["rust", "rocket"]);
        assert_eq!(validate_question(&ask("Hey", BODY, &["rust"])), Err(ValidationError::InvalidTitle));
        assert_eq!(validate_question(&ask("Rocket state", "too short", &["rust"])), Err(ValidationError::InvalidContent));
        assert_eq!(validate_question(&ask("Rocket state", BODY, &[])), Err(ValidationError::TagCount));
        assert_eq!(validate_question(&ask("Rocket state", BODY, &["a", "b", "c", "d"])), Err(ValidationError::TagCount));
        assert_eq!(
            validate_question(&ask("Rocket state", BODY, &["rust", "RUST"])),
            Err(ValidationError::DuplicateTag("rust".into()))
        );
        assert!(matches!(
            validate_question(&ask("Rocket state", BODY, &["a-very-long-tag-name"])),
            Err(ValidationError::InvalidTag(_))
        ));
        assert!(matches!(
            validate_question(&ask("Rocket state", BODY, &["two words"])),
            Err(ValidationError::InvalidTag(_))
        ));
    }

    #[test]
    fn test_answer_validation() {
        let answer = |content: &str| PostAnswerRequest { csrf_token: String::new(), content: content.into() };
        assert!(validate_answer(&answer(BODY)).is_ok());
        assert_eq!(validate_answer(&answer("    short    ")), Err(ValidationError::InvalidContent));
    }

    #[test]
    fn test_profile_validation() {
        let mut profile = ProfileFields {
            name: " Ada ".into(),
            username: "Ada_L".into(),
            bio: Some("Engines".into()),
            location: None,
            portfolio_website: Some("https://example.com".into()),
        };
        validate_profile(&mut profile).unwrap();
        assert_eq!(profile.name, "Ada");
        assert_eq!(profile.username, "ada_l");

        profile.bio = Some("   ".into());
        profile.location = Some("  Paris ".into());
        profile.portfolio_website = Some("  https://example.com/ada  ".into());
        validate_profile(&mut profile).unwrap();
        assert_eq!(profile.bio, None);
        assert_eq!(profile.location.as_deref(), Some("Paris"));
        assert_eq!(profile.portfolio_website.as_deref(), Some("https://example.com/ada"));

        profile.location = Some(format!("  {}  ", "x".repeat(MAX_LOCATION_LENGTH)));
        validate_profile(&mut profile).unwrap();
        profile.location = Some("x".repeat(MAX_LOCATION_LENGTH + 1));
        assert_eq!(validate_profile(&mut profile), Err(ValidationError::LocationTooLong));
        profile.location = None;

        profile.portfolio_website = Some("ftp://example.com".into());
        assert_eq!(validate_profile(&mut profile), Err(ValidationError::InvalidWebsite));

        profile.portfolio_website = None;
        profile.username = "a b".into();
        assert_eq!(validate_profile(&mut profile), Err(ValidationError::InvalidUsername));

        assert!(validate_email("ada@example.com").is_ok());
        assert_eq!(validate_email("ada@@example.com"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("@example.com"), Err(ValidationError::InvalidEmail));
        assert_eq!(validate_email("ada example@x.com"), Err(ValidationError::InvalidEmail));
    }

    #[test]
    fn test_user_identity_helpers() {
        let id = Uuid::new_v4();
        assert_eq!(parse_user_header(Some(&id.to_string())), Some(id));
        assert_eq!(parse_user_header(Some("not-a-uuid")), None);
        assert_eq!(parse_user_header(Some(&Uuid::nil().to_string())), None);
        assert_eq!(parse_user_header(None), None);

        let a = generate_server_fingerprint("10.0.0.1", Some("curl"));
        assert_eq!(a, generate_server_fingerprint("10.0.0.1", Some("curl")));
        assert_ne!(a, generate_server_fingerprint("10.0.0.2", Some("curl")));
    }

    #[test]
    fn test_question_json_flattens_voters() {
        let voter = Uuid::new_v4();
        let mut votes = VoterSets::new();
        votes.vote(&voter, VoteAction::Upvote).unwrap();
        let question = Question {
            id: Uuid::new_v4(),
            title: "Rocket state".into(),
            content: BODY.into(),
            author: AuthorSummary { id: Uuid::new_v4(), name: "Ada".into(), picture: String::new() },
            tags: vec!["rust".into()],
            views: 3,
            answer_count: 0,
            votes,
            created_at: time::OffsetDateTime::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&question).unwrap();
        assert_eq!(json["upvoters"], serde_json::json!([voter]));
        assert_eq!(json["downvoters"], serde_json::json!([]));
        assert_eq!(json["createdAt"], "1970-01-01T00:00:00Z");
        assert_eq!(question.score(), 1);
        assert_eq!(VoteTally::from(&question.votes), VoteTally { upvotes: 1, downvotes: 0 });
        assert!(question.is_unanswered());

        let back: Question = serde_json::from_value(json).unwrap();
        assert_eq!(back, question);
    }
}
