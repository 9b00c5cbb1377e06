use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use moltbook_tui::api::{Agent, ApiError, Comment, Post};
use moltbook_tui::credentials::{Credential, CredentialError};
use moltbook_tui::detail::CommentRequest;
use moltbook_tui::dispatch::Command;
use moltbook_tui::event::Event;
use moltbook_tui::feed::{FeedKind, LoadMode, PageRequest};
use moltbook_tui::session::{Mode, Registration, Session, Settings};

fn press(session: Session, code: KeyCode) -> (Session, Vec<Command>) {
    session.update(Event::Key(KeyEvent::new(code, KeyModifiers::NONE)))
}

fn type_text(mut session: Session, text: &str) -> Session {
    for ch in text.chars() {
        session = press(session, KeyCode::Char(ch)).0;
    }
    session
}

fn posts(range: std::ops::Range<usize>) -> Vec<Post> {
    range
        .map(|i| Post {
            id: format!("p{i}"),
            title: format!("Post {i}"),
            upvotes: 3,
            ..Post::default()
        })
        .collect()
}

fn feed_requests(commands: &[Command]) -> Vec<PageRequest> {
    commands
        .iter()
        .filter_map(|command| match command {
            Command::FetchFeed(request) => Some(request.clone()),
            _ => None,
        })
        .collect()
}

fn comment_request(commands: &[Command]) -> CommentRequest {
    commands
        .iter()
        .find_map(|command| match command {
            Command::FetchComments(request) => Some(request.clone()),
            _ => None,
        })
        .expect("comment fetch issued")
}

/// Signed in, sized and showing the first page of the hot feed.
fn feed_with(count: usize) -> Session {
    let session = Session::new(Settings::default());
    let (session, _) = session.update(Event::Resize {
        width: 100,
        height: 40,
    });
    let (session, commands) = session.update(Event::CredentialLoaded(Ok(Credential {
        api_key: "moltbook_key".into(),
        agent_name: "crab".into(),
    })));
    assert!(commands.contains(&Command::Connect(Credential {
        api_key: "moltbook_key".into(),
        agent_name: "crab".into(),
    })));
    let request = feed_requests(&commands).pop().expect("initial fetch");
    let (session, commands) = session.update(Event::FeedPage {
        request,
        result: Ok(posts(0..count)),
    });
    assert!(commands.is_empty());
    assert!(matches!(session.mode, Mode::Feed));
    session
}

#[test]
fn scrolling_near_the_end_appends_exactly_once() {
    let mut session = feed_with(20);
    let mut issued = Vec::new();
    for _ in 0..18 {
        let (next, commands) = press(session, KeyCode::Char('j'));
        session = next;
        issued.extend(feed_requests(&commands));
    }
    assert_eq!(session.feed.selected, 18);
    assert_eq!(issued.len(), 1);
    let append = issued.remove(0);
    assert_eq!(append.offset, 20);
    assert_eq!(append.mode, LoadMode::Append);

    let (mut session, _) = session.update(Event::FeedPage {
        request: append,
        result: Ok(posts(20..25)),
    });
    assert_eq!(session.feed.posts.len(), 25);
    assert!(session.feed.cursor.all_loaded());

    for _ in 0..10 {
        let (next, commands) = press(session, KeyCode::Down);
        session = next;
        assert!(feed_requests(&commands).is_empty());
    }
    assert_eq!(session.feed.selected, 24);
}

#[test]
fn switching_feeds_drops_the_old_page() {
    let session = feed_with(20);
    let (session, hot) = press(session, KeyCode::Char('h'));
    let (session, personal) = press(session, KeyCode::Char('f'));
    let hot = feed_requests(&hot).pop().unwrap();
    let personal = feed_requests(&personal).pop().unwrap();
    assert_eq!(personal.kind, FeedKind::Personalized);

    let (session, _) = session.update(Event::FeedPage {
        request: hot,
        result: Ok(posts(100..120)),
    });
    assert!(session.feed.posts.is_empty());

    let (session, _) = session.update(Event::FeedPage {
        request: personal,
        result: Ok(posts(0..4)),
    });
    assert_eq!(session.feed.posts.len(), 4);
    assert_eq!(session.feed.title(), "Personalized Feed (hot)");
}

#[test]
fn comments_for_a_closed_post_are_ignored() {
    let session = feed_with(3);
    let (session, opened) = press(session, KeyCode::Enter);
    let first = comment_request(&opened);
    assert_eq!(first.post_id, "p0");

    let (session, _) = press(session, KeyCode::Esc);
    let (session, _) = press(session, KeyCode::Char('j'));
    let (session, opened) = press(session, KeyCode::Enter);
    let second = comment_request(&opened);
    assert_eq!(second.post_id, "p1");

    let stale = vec![Comment {
        id: "c0".into(),
        body: "from the other post".into(),
        ..Comment::default()
    }];
    let (session, _) = session.update(Event::CommentPage {
        request: first,
        result: Ok(stale),
    });
    match &session.mode {
        Mode::PostDetail(detail) => {
            assert_eq!(detail.post_id(), "p1");
            assert!(detail.comments.is_empty());
            assert!(detail.is_loading());
        }
        other => panic!("expected post detail, got {}", other.name()),
    }
}

#[test]
fn post_composer_submits_once_and_resubmits_after_failure() {
    let session = feed_with(3);
    let (session, _) = press(session, KeyCode::Char('n'));
    assert!(matches!(session.mode, Mode::CreatePost(_)));

    let (session, commands) = press(session, KeyCode::Enter);
    assert!(commands.is_empty(), "empty title must not advance");

    let session = type_text(session, "Hello molt");
    let (session, commands) = press(session, KeyCode::Enter);
    assert!(commands.is_empty());
    let session = type_text(session, "First post");
    let (session, commands) = press(session, KeyCode::Enter);
    let expected = Command::CreatePost {
        community: "general".into(),
        title: "Hello molt".into(),
        body: "First post".into(),
    };
    assert_eq!(commands, vec![expected.clone()]);

    let (session, commands) = press(session, KeyCode::Enter);
    assert!(commands.is_empty(), "second enter while submitting");

    let (session, _) = session.update(Event::PostCreated(Err(ApiError::Api {
        status: 500,
        message: "shell cracked".into(),
    })));
    assert!(session.error.is_some());
    assert!(matches!(session.mode, Mode::CreatePost(_)));

    let (session, commands) = press(session, KeyCode::Char('r'));
    assert_eq!(commands, vec![expected]);

    let (session, commands) = session.update(Event::PostCreated(Ok(())));
    assert!(matches!(session.mode, Mode::Feed));
    assert_eq!(feed_requests(&commands).len(), 1);
    assert_eq!(session.message.as_deref(), Some("Post created! 🦞"));
}

#[test]
fn upvote_from_detail_updates_every_copy() {
    let session = feed_with(3);
    let (session, _) = press(session, KeyCode::Enter);
    let (session, commands) = press(session, KeyCode::Char('u'));
    assert_eq!(commands, vec![Command::Vote { post_id: "p0".into() }]);
    let (session, commands) = press(session, KeyCode::Char('u'));
    assert!(commands.is_empty());

    let (session, _) = session.update(Event::Voted {
        post_id: "p0".into(),
        result: Ok(()),
    });
    match &session.mode {
        Mode::PostDetail(detail) => assert_eq!(detail.post.upvotes, 4),
        other => panic!("expected post detail, got {}", other.name()),
    }
    assert_eq!(session.feed.posts[0].upvotes, 4);
    assert!(session.upvoted.contains("p0"));
}

#[test]
fn comment_is_posted_and_thread_reloads() {
    let session = feed_with(3);
    let (session, opened) = press(session, KeyCode::Enter);
    let (session, _) = session.update(Event::CommentPage {
        request: comment_request(&opened),
        result: Ok(Vec::new()),
    });
    let (session, _) = press(session, KeyCode::Char('c'));
    assert!(matches!(session.mode, Mode::CreateComment { .. }));

    let session = type_text(session, "pinch pinch");
    let (session, commands) = press(session, KeyCode::Enter);
    assert_eq!(
        commands,
        vec![Command::CreateComment {
            post_id: "p0".into(),
            body: "pinch pinch".into(),
        }]
    );

    let (session, commands) = session.update(Event::CommentCreated {
        post_id: "p0".into(),
        result: Ok(()),
    });
    assert!(matches!(session.mode, Mode::PostDetail(_)));
    assert_eq!(comment_request(&commands).offset, 0);
}

#[test]
fn late_first_page_does_not_hide_a_new_comment() {
    let session = feed_with(3);
    let (session, opened) = press(session, KeyCode::Enter);
    let initial = comment_request(&opened);

    let (session, _) = press(session, KeyCode::Char('c'));
    let session = type_text(session, "mine");
    let (session, _) = press(session, KeyCode::Enter);
    let (session, commands) = session.update(Event::CommentCreated {
        post_id: "p0".into(),
        result: Ok(()),
    });
    let refresh = comment_request(&commands);
    assert_ne!(initial, refresh);

    let comment = |id: &str| Comment {
        id: id.into(),
        body: id.into(),
        ..Comment::default()
    };
    let (session, _) = session.update(Event::CommentPage {
        request: initial,
        result: Ok(vec![comment("old")]),
    });
    let (session, _) = session.update(Event::CommentPage {
        request: refresh,
        result: Ok(vec![comment("old"), comment("mine")]),
    });
    match &session.mode {
        Mode::PostDetail(detail) => {
            let bodies: Vec<&str> = detail.comments.iter().map(|c| c.body.as_str()).collect();
            assert_eq!(bodies, vec!["old", "mine"]);
            assert!(!detail.is_loading());
        }
        other => panic!("expected post detail, got {}", other.name()),
    }
}

#[test]
fn search_replaces_the_feed() {
    let session = feed_with(3);
    let (session, _) = press(session, KeyCode::Char('/'));
    let session = type_text(session, "lobster");
    let (session, commands) = press(session, KeyCode::Enter);
    assert!(matches!(session.mode, Mode::Feed));
    let request = feed_requests(&commands).pop().unwrap();
    assert_eq!(request.kind, FeedKind::Search("lobster".into()));
    assert!(session.feed.posts.is_empty());
}

#[test]
fn registration_saves_the_new_key() {
    let session = Session::new(Settings::default());
    let (session, _) =
        session.update(Event::CredentialLoaded(Err(CredentialError::NotFound("none".into()))));
    let session = type_text(session, "clawd");
    let (session, _) = press(session, KeyCode::Enter);
    let session = type_text(session, "molts daily");
    let (session, commands) = press(session, KeyCode::Enter);
    assert_eq!(
        commands,
        vec![Command::Register {
            name: "clawd".into(),
            description: "molts daily".into(),
        }]
    );

    let (session, _) = press(session, KeyCode::Esc);
    assert!(matches!(session.mode, Mode::Register(_)), "esc is inert");

    let agent = Agent {
        name: "clawd".into(),
        api_key: Some("moltbook_abc".into()),
        claim_url: Some("https://www.moltbook.com/claim/xyz".into()),
        ..Agent::default()
    };
    let (session, commands) = session.update(Event::Registered(Ok(agent)));
    let credential = Credential {
        api_key: "moltbook_abc".into(),
        agent_name: "clawd".into(),
    };
    assert_eq!(
        commands,
        vec![
            Command::SaveCredential(credential.clone()),
            Command::Connect(credential)
        ]
    );
    assert!(matches!(
        session.mode,
        Mode::Register(Registration::Success(_))
    ));

    let (session, commands) = press(session, KeyCode::Char('y'));
    assert_eq!(commands, vec![Command::CopyToClipboard("moltbook_abc".into())]);
    let (session, commands) = press(session, KeyCode::Enter);
    assert!(matches!(session.mode, Mode::Feed));
    assert_eq!(feed_requests(&commands).len(), 1);
}

#[test]
fn profile_delete_refetches() {
    let session = feed_with(3);
    let (session, commands) = press(session, KeyCode::Char('p'));
    assert_eq!(commands, vec![Command::FetchProfile { name: "crab".into() }]);

    let agent = Agent {
        name: "crab".into(),
        karma: 42,
        ..Agent::default()
    };
    let (session, _) = session.update(Event::Profile {
        name: "crab".into(),
        result: Ok((agent, posts(0..2))),
    });
    let (session, commands) = press(session, KeyCode::Char('x'));
    assert_eq!(commands, vec![Command::DeletePost { post_id: "p0".into() }]);
    let (session, commands) = press(session, KeyCode::Char('x'));
    assert!(commands.is_empty());

    let (session, commands) = session.update(Event::PostDeleted {
        post_id: "p0".into(),
        result: Ok(()),
    });
    assert_eq!(commands, vec![Command::FetchProfile { name: "crab".into() }]);
    assert_eq!(session.feed.posts.len(), 2);
}

#[test]
fn follow_key_toggles_after_each_confirmation() {
    let mut session = feed_with(3);
    session.feed.posts[0].author.name = "lobster".into();
    let (session, _) = press(session, KeyCode::Enter);

    let (session, commands) = press(session, KeyCode::Char('F'));
    assert_eq!(commands, vec![Command::Follow { name: "lobster".into() }]);
    let (session, _) = session.update(Event::Followed {
        name: "lobster".into(),
        result: Ok(()),
    });
    assert!(session.followed.contains("lobster"));

    let (session, commands) = press(session, KeyCode::Char('F'));
    assert_eq!(commands, vec![Command::Unfollow { name: "lobster".into() }]);
    let (session, _) = session.update(Event::Unfollowed {
        name: "lobster".into(),
        result: Ok(()),
    });
    assert!(session.followed.is_empty());
    assert_eq!(session.message.as_deref(), Some("Unfollowed lobster"));
}

#[test]
fn signing_in_loads_agent_stats() {
    let session = Session::new(Settings::default());
    let (session, commands) = session.update(Event::CredentialLoaded(Ok(Credential {
        api_key: "moltbook_key".into(),
        agent_name: "crab".into(),
    })));
    assert!(commands.contains(&Command::FetchSelf));

    let agent = Agent {
        name: "crab".into(),
        karma: 7,
        ..Agent::default()
    };
    let (session, _) = session.update(Event::SelfLoaded(Ok(agent.clone())));
    assert_eq!(session.agent, Some(agent));
}
