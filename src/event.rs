use crossterm::event::KeyEvent;

use crate::api::{Agent, ApiError, Comment, Post};
use crate::credentials::{Credential, CredentialError};
use crate::detail::CommentRequest;
use crate::feed::PageRequest;

/// Everything the session reacts to. Each async completion echoes the
/// request token it was issued with, so relevance checks are an equality
/// test against the state at arrival time.
#[derive(Debug, Clone)]
pub enum Event {
    Key(KeyEvent),
    Resize { width: u16, height: u16 },
    Tick,
    CredentialLoaded(Result<Credential, CredentialError>),
    CredentialSaved(Result<(), CredentialError>),
    FeedPage {
        request: PageRequest,
        result: Result<Vec<Post>, ApiError>,
    },
    CommentPage {
        request: CommentRequest,
        result: Result<Vec<Comment>, ApiError>,
    },
    Profile {
        name: String,
        result: Result<(Agent, Vec<Post>), ApiError>,
    },
    SelfLoaded(Result<Agent, ApiError>),
    Registered(Result<Agent, ApiError>),
    PostCreated(Result<(), ApiError>),
    CommentCreated {
        post_id: String,
        result: Result<(), ApiError>,
    },
    Voted {
        post_id: String,
        result: Result<(), ApiError>,
    },
    PostDeleted {
        post_id: String,
        result: Result<(), ApiError>,
    },
    Followed {
        name: String,
        result: Result<(), ApiError>,
    },
    Unfollowed {
        name: String,
        result: Result<(), ApiError>,
    },
    /// Outcome of a local side effect (browser, clipboard).
    Notice(String),
}
