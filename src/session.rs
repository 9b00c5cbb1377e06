//! The session reducer.
//!
//! `Session::update` is the single place state changes. It consumes the
//! session and one event and hands back the next session together with the
//! commands the dispatcher should run.

use std::collections::HashSet;
use std::mem;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::api::{Agent, ApiError, Comment, Post, SortOption};
use crate::composer::{Composer, Confirm, Purpose};
use crate::credentials::{Credential, CredentialError};
use crate::detail::{CommentOutcome, CommentRequest, DetailState};
use crate::dispatch::Command;
use crate::event::Event;
use crate::feed::{FeedKind, FeedState, PageOutcome, PageRequest, PagingPolicy};
use crate::layout::Context;
use crate::profile::ProfileState;

#[derive(Debug, Clone)]
pub struct Settings {
    pub page_size: usize,
    pub preload_threshold: usize,
    pub sort: SortOption,
    pub pagination_retry_delay: Duration,
    pub pagination_retry_limit: u32,
    pub community: String,
}

impl Default for Settings {
    fn default() -> Self {
        let policy = PagingPolicy::default();
        Self {
            page_size: policy.page_size,
            preload_threshold: policy.preload_threshold,
            sort: SortOption::Hot,
            pagination_retry_delay: policy.retry_delay,
            pagination_retry_limit: policy.retry_limit,
            community: "general".into(),
        }
    }
}

impl Settings {
    pub fn policy(&self) -> PagingPolicy {
        PagingPolicy {
            page_size: self.page_size.max(1),
            preload_threshold: self.preload_threshold,
            retry_delay: self.pagination_retry_delay,
            retry_limit: self.pagination_retry_limit,
        }
    }
}

/// A blocking error. While one is shown only retry, back, feed switches
/// and quit respond.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorBanner {
    pub message: String,
    pub retry_after: Option<Duration>,
}

impl ErrorBanner {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            retry_after: None,
        }
    }
}

impl From<&ApiError> for ErrorBanner {
    fn from(err: &ApiError) -> Self {
        Self {
            message: err.to_string(),
            retry_after: err.retry_after(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum Registration {
    Editing(Composer),
    Success(Agent),
}

#[derive(Debug, Clone)]
pub enum Mode {
    Loading,
    Feed,
    PostDetail(DetailState),
    CreatePost(Composer),
    CreateComment {
        detail: DetailState,
        composer: Composer,
    },
    Register(Registration),
    Profile(ProfileState),
    Search(Composer),
}

impl Mode {
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Loading => "loading",
            Mode::Feed => "feed",
            Mode::PostDetail(_) => "post_detail",
            Mode::CreatePost(_) => "create_post",
            Mode::CreateComment { .. } => "create_comment",
            Mode::Register(_) => "register",
            Mode::Profile(_) => "profile",
            Mode::Search(_) => "search",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    pub mode: Mode,
    pub width: u16,
    pub height: u16,
    pub feed: FeedState,
    pub error: Option<ErrorBanner>,
    pub message: Option<String>,
    pub credential: Option<Credential>,
    pub agent: Option<Agent>,
    pub upvoted: HashSet<String>,
    /// Authors followed during this session.
    pub followed: HashSet<String>,
    pub spinner_frame: usize,
    pub should_quit: bool,
    pending_votes: HashSet<String>,
    settings: Settings,
}

impl Session {
    pub fn new(settings: Settings) -> Self {
        Self {
            mode: Mode::Loading,
            width: 0,
            height: 0,
            feed: FeedState::new(settings.sort, settings.policy()),
            error: None,
            message: None,
            credential: None,
            agent: None,
            upvoted: HashSet::new(),
            followed: HashSet::new(),
            spinner_frame: 0,
            should_quit: false,
            pending_votes: HashSet::new(),
            settings,
        }
    }

    /// Commands to run before the first event.
    pub fn init(&self) -> Vec<Command> {
        vec![Command::LoadCredential]
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn is_vote_pending(&self, post_id: &str) -> bool {
        self.pending_votes.contains(post_id)
    }

    /// True while something the user is waiting on is in flight.
    pub fn is_busy(&self) -> bool {
        match &self.mode {
            Mode::Loading => true,
            Mode::Feed => self.feed.is_loading(),
            Mode::PostDetail(detail) => detail.is_loading(),
            Mode::CreateComment { composer, .. }
            | Mode::CreatePost(composer)
            | Mode::Search(composer) => composer.is_submitting(),
            Mode::Register(Registration::Editing(composer)) => composer.is_submitting(),
            Mode::Register(Registration::Success(_)) => false,
            Mode::Profile(profile) => profile.is_loading() || profile.is_deleting(),
        }
    }

    pub fn update(mut self, event: Event) -> (Session, Vec<Command>) {
        let mut sync = true;
        let commands = match event {
            Event::Key(key) => {
                if matches!(key.code, KeyCode::PageUp | KeyCode::PageDown) {
                    sync = false;
                }
                self.on_key(key)
            }
            Event::Resize { width, height } => {
                self.width = width;
                self.height = height;
                Vec::new()
            }
            Event::Tick => {
                self.spinner_frame = self.spinner_frame.wrapping_add(1);
                if !self.is_busy() {
                    return (self, Vec::new());
                }
                sync = false;
                Vec::new()
            }
            Event::CredentialLoaded(result) => self.on_credential(result),
            Event::CredentialSaved(result) => {
                if let Err(err) = result {
                    tracing::warn!(error = %err, "failed to save credentials");
                    self.message = Some(format!("Couldn't save credentials: {err}"));
                }
                Vec::new()
            }
            Event::FeedPage { request, result } => self.on_feed_page(request, result),
            Event::CommentPage { request, result } => self.on_comment_page(request, result),
            Event::Profile { name, result } => self.on_profile(&name, result),
            Event::SelfLoaded(result) => {
                match result {
                    Ok(agent) => self.agent = Some(agent),
                    Err(err) => tracing::warn!(error = %err, "couldn't load agent stats"),
                }
                Vec::new()
            }
            Event::Registered(result) => self.on_registered(result),
            Event::PostCreated(result) => self.on_post_created(result),
            Event::CommentCreated { post_id, result } => self.on_comment_created(&post_id, result),
            Event::Voted { post_id, result } => self.on_voted(post_id, result),
            Event::PostDeleted { post_id, result } => self.on_post_deleted(&post_id, result),
            Event::Followed { name, result } => {
                self.message = Some(match result {
                    Ok(()) => {
                        let notice = format!("Following {name}! 🦞");
                        self.followed.insert(name);
                        notice
                    }
                    Err(err) => format!("Follow failed: {err}"),
                });
                Vec::new()
            }
            Event::Unfollowed { name, result } => {
                self.message = Some(match result {
                    Ok(()) => {
                        let notice = format!("Unfollowed {name}");
                        self.followed.remove(&name);
                        notice
                    }
                    Err(err) => format!("Unfollow failed: {err}"),
                });
                Vec::new()
            }
            Event::Notice(notice) => {
                self.message = Some(notice);
                Vec::new()
            }
        };
        self.refresh_views(sync);
        (self, commands)
    }

    fn refresh_views(&mut self, sync: bool) {
        let ctx = Context {
            width: self.width,
            height: self.height,
            upvoted: &self.upvoted,
            spinner_frame: self.spinner_frame,
        };
        match &mut self.mode {
            Mode::Loading | Mode::Feed => {
                self.feed.resize(ctx.width, ctx.height);
                if sync {
                    self.feed.refresh_view(&ctx);
                } else {
                    self.feed.relayout(&ctx);
                }
            }
            Mode::PostDetail(detail) | Mode::CreateComment { detail, .. } => {
                if sync {
                    detail.refresh_view(&ctx);
                } else {
                    detail.relayout(&ctx);
                }
            }
            Mode::Profile(profile) => {
                if sync {
                    profile.refresh_view(&ctx);
                }
            }
            Mode::CreatePost(_) | Mode::Register(_) | Mode::Search(_) => {}
        }
    }

    fn take_mode(&mut self) -> Mode {
        mem::replace(&mut self.mode, Mode::Loading)
    }

    fn set_error(&mut self, err: &ApiError) {
        tracing::warn!(mode = self.mode.name(), error = %err, "blocking error");
        self.error = Some(ErrorBanner::from(err));
    }

    fn on_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.kind != KeyEventKind::Press {
            return Vec::new();
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return Vec::new();
        }

        let before = self.mode.name();
        let commands = if self.error.is_some() {
            self.error_key(key)
        } else {
            match &self.mode {
                Mode::Loading => {
                    if key.code == KeyCode::Char('q') {
                        self.should_quit = true;
                    }
                    Vec::new()
                }
                Mode::Feed => self.feed_key(key),
                Mode::PostDetail(_) => self.detail_key(key),
                Mode::Profile(_) => self.profile_key(key),
                Mode::Register(Registration::Success(_)) => self.registered_key(key),
                Mode::CreatePost(_)
                | Mode::CreateComment { .. }
                | Mode::Search(_)
                | Mode::Register(Registration::Editing(_)) => self.composer_key(key),
            }
        };
        if self.mode.name() != before {
            self.message = None;
        }
        commands
    }

    fn error_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Char('r') => {
                self.error = None;
                self.retry()
            }
            KeyCode::Esc => {
                self.error = None;
                self.back();
                Vec::new()
            }
            KeyCode::Char('h') if matches!(self.mode, Mode::Feed | Mode::Loading) => {
                self.error = None;
                vec![self.feed.reset_and_load(FeedKind::Hot)]
            }
            KeyCode::Char('f') if matches!(self.mode, Mode::Feed | Mode::Loading) => {
                self.error = None;
                vec![self.feed.reset_and_load(FeedKind::Personalized)]
            }
            _ => Vec::new(),
        }
    }

    /// Re-issues the last request that matters for the current mode.
    fn retry(&mut self) -> Vec<Command> {
        match &mut self.mode {
            Mode::Loading => {
                if self.credential.is_some() {
                    vec![self.feed.refresh()]
                } else {
                    vec![Command::LoadCredential]
                }
            }
            Mode::Feed => vec![self.feed.refresh()],
            Mode::PostDetail(detail) => vec![detail.refresh()],
            Mode::Profile(profile) => vec![profile.fetch()],
            Mode::Register(Registration::Success(_)) => Vec::new(),
            Mode::CreatePost(composer)
            | Mode::CreateComment { composer, .. }
            | Mode::Search(composer)
            | Mode::Register(Registration::Editing(composer)) => {
                let purpose = composer.purpose().clone();
                match composer.resubmit() {
                    Some(values) => self.submit(purpose, values),
                    None => Vec::new(),
                }
            }
        }
    }

    fn back(&mut self) {
        self.mode = match self.take_mode() {
            Mode::Loading if self.credential.is_some() => Mode::Feed,
            Mode::Loading => Mode::Register(Registration::Editing(Composer::register())),
            Mode::CreateComment { detail, .. } => Mode::PostDetail(detail),
            Mode::Register(registration) => Mode::Register(registration),
            Mode::Feed
            | Mode::PostDetail(_)
            | Mode::CreatePost(_)
            | Mode::Profile(_)
            | Mode::Search(_) => Mode::Feed,
        };
    }

    fn feed_key(&mut self, key: KeyEvent) -> Vec<Command> {
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Char('j') | KeyCode::Down => self.feed.select_next().into_iter().collect(),
            KeyCode::Char('k') | KeyCode::Up => {
                self.feed.select_prev();
                Vec::new()
            }
            KeyCode::Enter => match self.feed.selected_post().cloned() {
                Some(post) => {
                    let boosted = self.feed.is_boosted(&post.id);
                    self.open_post(post, boosted)
                }
                None => Vec::new(),
            },
            KeyCode::Char('u') => match self.feed.selected_post() {
                Some(post) => {
                    let post_id = post.id.clone();
                    self.upvote(post_id)
                }
                None => Vec::new(),
            },
            KeyCode::Char('p') => self.open_profile(),
            KeyCode::Char('h') => {
                self.message = None;
                vec![self.feed.reset_and_load(FeedKind::Hot)]
            }
            KeyCode::Char('f') => {
                self.message = None;
                vec![self.feed.reset_and_load(FeedKind::Personalized)]
            }
            KeyCode::Char('s') => {
                self.message = None;
                vec![self.feed.cycle_sort()]
            }
            KeyCode::Char('r') => {
                self.message = None;
                vec![self.feed.refresh()]
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Search(Composer::search());
                Vec::new()
            }
            KeyCode::Char('n') => {
                self.mode = Mode::CreatePost(Composer::new_post(self.settings.community.clone()));
                Vec::new()
            }
            KeyCode::Char('o') => self
                .feed
                .selected_post()
                .map(|post| Command::OpenUrl(post.open_target()))
                .into_iter()
                .collect(),
            KeyCode::PageDown => {
                let step = self.feed.viewport.page_step();
                self.feed.viewport.scroll_by(step);
                Vec::new()
            }
            KeyCode::PageUp => {
                let step = self.feed.viewport.page_step();
                self.feed.viewport.scroll_by(-step);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn open_post(&mut self, post: Post, boosted: bool) -> Vec<Command> {
        let (mut detail, command) = DetailState::open(post, &self.settings.policy());
        detail.inherit_boost(boosted);
        self.mode = Mode::PostDetail(detail);
        vec![command]
    }

    fn open_profile(&mut self) -> Vec<Command> {
        let Some(name) = self
            .credential
            .as_ref()
            .map(|credential| credential.agent_name.clone())
            .filter(|name| !name.is_empty())
        else {
            self.message = Some("No agent name on file; register first".into());
            return Vec::new();
        };
        let (profile, command) = ProfileState::open(name);
        self.mode = Mode::Profile(profile);
        vec![command]
    }

    fn detail_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Mode::PostDetail(detail) = &mut self.mode else {
            return Vec::new();
        };
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Esc | KeyCode::Char('b') => {
                self.mode = Mode::Feed;
                Vec::new()
            }
            KeyCode::Char('j') | KeyCode::Down => detail.select_next().into_iter().collect(),
            KeyCode::Char('k') | KeyCode::Up => {
                detail.select_prev();
                Vec::new()
            }
            KeyCode::Char('l') => match detail.load_more() {
                Some(command) => vec![command],
                None => {
                    if !detail.is_loading() && detail.comments.is_empty() {
                        self.message = Some("No comments to page through".into());
                    }
                    Vec::new()
                }
            },
            KeyCode::Char('c') => {
                if let Mode::PostDetail(detail) = self.take_mode() {
                    let composer = Composer::new_comment(detail.post.id.clone());
                    self.mode = Mode::CreateComment { detail, composer };
                }
                Vec::new()
            }
            KeyCode::Char('u') => {
                let post_id = detail.post.id.clone();
                self.upvote(post_id)
            }
            KeyCode::Char('F') => {
                let name = detail.post.author.name.clone();
                if name.is_empty() {
                    Vec::new()
                } else if self.followed.contains(&name) {
                    vec![Command::Unfollow { name }]
                } else {
                    vec![Command::Follow { name }]
                }
            }
            KeyCode::Char('o') => vec![Command::OpenUrl(detail.post.open_target())],
            KeyCode::PageDown => {
                let step = detail.viewport.page_step();
                detail.viewport.scroll_by(step);
                Vec::new()
            }
            KeyCode::PageUp => {
                let step = detail.viewport.page_step();
                detail.viewport.scroll_by(-step);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn profile_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Mode::Profile(profile) = &mut self.mode else {
            return Vec::new();
        };
        match key.code {
            KeyCode::Char('q') => {
                self.should_quit = true;
                Vec::new()
            }
            KeyCode::Esc | KeyCode::Char('b') => {
                self.mode = Mode::Feed;
                Vec::new()
            }
            KeyCode::Char('j') | KeyCode::Down => {
                profile.select_next();
                Vec::new()
            }
            KeyCode::Char('k') | KeyCode::Up => {
                profile.select_prev();
                Vec::new()
            }
            KeyCode::Char('x') => profile.delete_selected().into_iter().collect(),
            KeyCode::Enter => match profile.selected_post().cloned() {
                Some(post) => {
                    let boosted = profile.is_boosted(&post.id);
                    self.open_post(post, boosted)
                }
                None => Vec::new(),
            },
            KeyCode::Char('u') => match profile.selected_post() {
                Some(post) => {
                    let post_id = post.id.clone();
                    self.upvote(post_id)
                }
                None => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    fn registered_key(&mut self, key: KeyEvent) -> Vec<Command> {
        let Mode::Register(Registration::Success(agent)) = &self.mode else {
            return Vec::new();
        };
        match key.code {
            KeyCode::Enter => {
                self.mode = Mode::Feed;
                vec![self.feed.reset_and_load(FeedKind::Hot)]
            }
            KeyCode::Char('y') => agent
                .api_key
                .clone()
                .map(Command::CopyToClipboard)
                .into_iter()
                .collect(),
            KeyCode::Char('q') => {
                self.should_quit = true;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn composer_key(&mut self, key: KeyEvent) -> Vec<Command> {
        if key.code == KeyCode::Esc {
            self.mode = match self.take_mode() {
                Mode::CreateComment { detail, .. } => Mode::PostDetail(detail),
                Mode::Register(registration) => Mode::Register(registration),
                _ => Mode::Feed,
            };
            return Vec::new();
        }

        let composer = match &mut self.mode {
            Mode::CreatePost(composer)
            | Mode::CreateComment { composer, .. }
            | Mode::Search(composer)
            | Mode::Register(Registration::Editing(composer)) => composer,
            _ => return Vec::new(),
        };
        match key.code {
            KeyCode::Enter => match composer.confirm() {
                Confirm::Submit(values) => {
                    let purpose = composer.purpose().clone();
                    self.submit(purpose, values)
                }
                Confirm::Advanced | Confirm::Ignored => Vec::new(),
            },
            KeyCode::Backspace => {
                composer.backspace();
                Vec::new()
            }
            KeyCode::Char(ch)
                if !key
                    .modifiers
                    .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) =>
            {
                composer.insert(ch);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    fn submit(&mut self, purpose: Purpose, values: Vec<String>) -> Vec<Command> {
        let mut values = values.into_iter();
        let mut next = || values.next().unwrap_or_default();
        match purpose {
            Purpose::Post { community } => vec![Command::CreatePost {
                community,
                title: next(),
                body: next(),
            }],
            Purpose::Comment { post_id } => vec![Command::CreateComment {
                post_id,
                body: next(),
            }],
            Purpose::Register => vec![Command::Register {
                name: next(),
                description: next(),
            }],
            Purpose::Search => {
                self.mode = Mode::Feed;
                vec![self.feed.reset_and_load(FeedKind::Search(next()))]
            }
        }
    }

    /// Optimistic upvote: the first press counts, later presses are no-ops.
    fn upvote(&mut self, post_id: String) -> Vec<Command> {
        if self.upvoted.contains(&post_id) || self.pending_votes.contains(&post_id) {
            return Vec::new();
        }
        self.upvoted.insert(post_id.clone());
        self.pending_votes.insert(post_id.clone());
        self.feed.boost(&post_id);
        match &mut self.mode {
            Mode::PostDetail(detail) | Mode::CreateComment { detail, .. } => {
                detail.boost(&post_id)
            }
            Mode::Profile(profile) => profile.boost(&post_id),
            _ => {}
        }
        vec![Command::Vote { post_id }]
    }

    /// Settles a vote. A failure is rolled back only on copies that still
    /// hold the optimistic count.
    fn on_voted(&mut self, post_id: String, result: Result<(), ApiError>) -> Vec<Command> {
        if !self.pending_votes.remove(&post_id) {
            return Vec::new();
        }
        let rollback = match result {
            Ok(()) => false,
            Err(err) => {
                self.upvoted.remove(&post_id);
                self.message = Some(format!("Upvote failed: {err}"));
                true
            }
        };
        if rollback {
            self.feed.unboost(&post_id);
        } else {
            self.feed.settle(&post_id);
        }
        match &mut self.mode {
            Mode::PostDetail(detail) | Mode::CreateComment { detail, .. } if rollback => {
                detail.unboost(&post_id)
            }
            Mode::PostDetail(detail) | Mode::CreateComment { detail, .. } => {
                detail.settle(&post_id)
            }
            Mode::Profile(profile) if rollback => profile.unboost(&post_id),
            Mode::Profile(profile) => profile.settle(&post_id),
            _ => {}
        }
        Vec::new()
    }

    fn on_credential(&mut self, result: Result<Credential, CredentialError>) -> Vec<Command> {
        match result {
            Ok(credential) => {
                tracing::info!(agent = %credential.agent_name, "credentials loaded");
                self.credential = Some(credential.clone());
                vec![
                    Command::Connect(credential),
                    Command::FetchSelf,
                    self.feed.reset_and_load(FeedKind::Hot),
                ]
            }
            Err(CredentialError::NotFound(_)) => {
                tracing::info!("no credentials; starting registration");
                self.mode = Mode::Register(Registration::Editing(Composer::register()));
                Vec::new()
            }
            Err(err) => {
                self.error = Some(ErrorBanner::new(err.to_string()));
                Vec::new()
            }
        }
    }

    fn on_feed_page(
        &mut self,
        request: PageRequest,
        result: Result<Vec<Post>, ApiError>,
    ) -> Vec<Command> {
        match self.feed.apply_page(request, result) {
            PageOutcome::Stale => Vec::new(),
            PageOutcome::Loaded => {
                if matches!(self.mode, Mode::Loading) {
                    self.mode = Mode::Feed;
                }
                Vec::new()
            }
            PageOutcome::Retry(command) => vec![command],
            PageOutcome::GaveUp(message) => {
                self.message = Some(message);
                Vec::new()
            }
            PageOutcome::Failed(err) => {
                self.set_error(&err);
                Vec::new()
            }
        }
    }

    fn on_comment_page(
        &mut self,
        request: CommentRequest,
        result: Result<Vec<Comment>, ApiError>,
    ) -> Vec<Command> {
        let detail = match &mut self.mode {
            Mode::PostDetail(detail) | Mode::CreateComment { detail, .. } => detail,
            _ => {
                tracing::debug!(post_id = %request.post_id, "comment page with no post open");
                return Vec::new();
            }
        };
        match detail.apply_comments(request, result) {
            CommentOutcome::Stale | CommentOutcome::Loaded => {}
            CommentOutcome::AppendFailed(message) => self.message = Some(message),
            CommentOutcome::Failed(err) => self.set_error(&err),
        }
        Vec::new()
    }

    fn on_profile(
        &mut self,
        name: &str,
        result: Result<(Agent, Vec<Post>), ApiError>,
    ) -> Vec<Command> {
        let Mode::Profile(profile) = &mut self.mode else {
            return Vec::new();
        };
        if let Some(Err(err)) = profile.apply(name, result) {
            self.set_error(&err);
        }
        Vec::new()
    }

    fn on_registered(&mut self, result: Result<Agent, ApiError>) -> Vec<Command> {
        let Mode::Register(Registration::Editing(composer)) = &mut self.mode else {
            return Vec::new();
        };
        let agent = match result {
            Ok(agent) => agent,
            Err(err) => {
                composer.fail();
                self.set_error(&err);
                return Vec::new();
            }
        };
        let Some(api_key) = agent.api_key.clone().filter(|key| !key.is_empty()) else {
            composer.fail();
            self.error = Some(ErrorBanner::new(
                "Registration succeeded but no API key was returned",
            ));
            return Vec::new();
        };

        tracing::info!(agent = %agent.name, "agent registered");
        let credential = Credential {
            api_key,
            agent_name: agent.name.clone(),
        };
        self.credential = Some(credential.clone());
        self.agent = Some(agent.clone());
        self.mode = Mode::Register(Registration::Success(agent));
        vec![
            Command::SaveCredential(credential.clone()),
            Command::Connect(credential),
        ]
    }

    fn on_post_created(&mut self, result: Result<(), ApiError>) -> Vec<Command> {
        match (&mut self.mode, result) {
            (Mode::CreatePost(_), Ok(())) => {
                self.mode = Mode::Feed;
                self.message = Some("Post created! 🦞".into());
                vec![self.feed.refresh()]
            }
            (Mode::CreatePost(composer), Err(err)) => {
                composer.fail();
                self.set_error(&err);
                Vec::new()
            }
            (_, Ok(())) => {
                self.message = Some("Post created! 🦞".into());
                Vec::new()
            }
            (_, Err(err)) => {
                self.message = Some(format!("Post failed: {err}"));
                Vec::new()
            }
        }
    }

    fn on_comment_created(&mut self, post_id: &str, result: Result<(), ApiError>) -> Vec<Command> {
        let mode = self.take_mode();
        let (mode, commands) = match (mode, result) {
            (Mode::CreateComment { mut detail, .. }, Ok(())) if detail.post_id() == post_id => {
                self.message = Some("Comment posted! 🦞".into());
                let command = detail.refresh();
                (Mode::PostDetail(detail), vec![command])
            }
            (Mode::CreateComment { detail, mut composer }, Err(err))
                if detail.post_id() == post_id =>
            {
                composer.fail();
                self.error = Some(ErrorBanner::from(&err));
                (Mode::CreateComment { detail, composer }, Vec::new())
            }
            (Mode::PostDetail(mut detail), Ok(())) if detail.post_id() == post_id => {
                self.message = Some("Comment posted! 🦞".into());
                let command = detail.refresh();
                (Mode::PostDetail(detail), vec![command])
            }
            (mode, Ok(())) => (mode, Vec::new()),
            (mode, Err(err)) => {
                self.message = Some(format!("Comment failed: {err}"));
                (mode, Vec::new())
            }
        };
        self.mode = mode;
        commands
    }

    fn on_post_deleted(&mut self, post_id: &str, result: Result<(), ApiError>) -> Vec<Command> {
        if result.is_ok() {
            self.feed.posts.retain(|post| post.id != post_id);
            self.feed.selected = self
                .feed
                .selected
                .min(self.feed.posts.len().saturating_sub(1));
        }
        let Mode::Profile(profile) = &mut self.mode else {
            return Vec::new();
        };
        if !profile.finish_delete(post_id) {
            return Vec::new();
        }
        match result {
            Ok(()) => {
                self.message = Some("Post deleted".into());
                vec![profile.fetch()]
            }
            Err(err) => {
                self.message = Some(format!("Delete failed: {err}"));
                Vec::new()
            }
        }
    }
}
