//! Executes session commands against the gateway services.
//!
//! Every network command runs on its own thread and posts exactly one
//! [`Event`] back to the loop. Nothing here reads or writes session state.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam_channel::Sender;
use parking_lot::RwLock;

use crate::api::{ApiError, SearchKind};
use crate::credentials::{Credential, CredentialError, Store};
use crate::data::Services;
use crate::detail::CommentRequest;
use crate::event::Event;
use crate::feed::{FeedKind, PageRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    LoadCredential,
    SaveCredential(Credential),
    /// Rebuilds the gateway services with the given key. Runs inline.
    Connect(Credential),
    FetchFeed(PageRequest),
    FetchFeedAfter {
        request: PageRequest,
        delay: Duration,
    },
    FetchComments(CommentRequest),
    FetchProfile {
        name: String,
    },
    /// Stats for the signed-in agent.
    FetchSelf,
    Register {
        name: String,
        description: String,
    },
    CreatePost {
        community: String,
        title: String,
        body: String,
    },
    CreateComment {
        post_id: String,
        body: String,
    },
    Vote {
        post_id: String,
    },
    DeletePost {
        post_id: String,
    },
    Follow {
        name: String,
    },
    Unfollow {
        name: String,
    },
    OpenUrl(String),
    CopyToClipboard(String),
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::LoadCredential => "load_credential",
            Command::SaveCredential(_) => "save_credential",
            Command::Connect(_) => "connect",
            Command::FetchFeed(_) => "fetch_feed",
            Command::FetchFeedAfter { .. } => "fetch_feed_after",
            Command::FetchComments(_) => "fetch_comments",
            Command::FetchProfile { .. } => "fetch_profile",
            Command::FetchSelf => "fetch_self",
            Command::Register { .. } => "register",
            Command::CreatePost { .. } => "create_post",
            Command::CreateComment { .. } => "create_comment",
            Command::Vote { .. } => "vote",
            Command::DeletePost { .. } => "delete_post",
            Command::Follow { .. } => "follow",
            Command::Unfollow { .. } => "unfollow",
            Command::OpenUrl(_) => "open_url",
            Command::CopyToClipboard(_) => "copy_to_clipboard",
        }
    }
}

/// Builds authenticated services for an API key.
pub trait Connector: Send + Sync {
    fn connect(&self, api_key: &str) -> anyhow::Result<Services>;
}

impl<F> Connector for F
where
    F: Fn(&str) -> anyhow::Result<Services> + Send + Sync,
{
    fn connect(&self, api_key: &str) -> anyhow::Result<Services> {
        self(api_key)
    }
}

/// Where `LoadCredential` and `SaveCredential` go.
#[derive(Debug, Clone)]
pub enum CredentialSource {
    File(Store),
    /// A fixed credential that is never written anywhere.
    Fixed(Credential),
}

impl CredentialSource {
    fn load(&self) -> Result<Credential, CredentialError> {
        match self {
            CredentialSource::File(store) => store.load(),
            CredentialSource::Fixed(credential) => Ok(credential.clone()),
        }
    }

    fn save(&self, credential: &Credential) -> Result<(), CredentialError> {
        match self {
            CredentialSource::File(store) => store.save(credential),
            CredentialSource::Fixed(_) => Ok(()),
        }
    }
}

pub struct Dispatcher {
    tx: Sender<Event>,
    services: Arc<RwLock<Services>>,
    connector: Arc<dyn Connector>,
    store: CredentialSource,
}

impl Dispatcher {
    pub fn new(
        tx: Sender<Event>,
        services: Services,
        connector: Arc<dyn Connector>,
        store: CredentialSource,
    ) -> Self {
        Self {
            tx,
            services: Arc::new(RwLock::new(services)),
            connector,
            store,
        }
    }

    pub fn dispatch_all(&self, commands: Vec<Command>) {
        for command in commands {
            self.dispatch(command);
        }
    }

    pub fn dispatch(&self, command: Command) {
        tracing::debug!(command = command.name(), "dispatch");
        match command {
            Command::Connect(credential) => self.connect(&credential),
            Command::LoadCredential => self.send(Event::CredentialLoaded(self.store.load())),
            Command::SaveCredential(credential) => {
                self.send(Event::CredentialSaved(self.store.save(&credential)))
            }
            Command::OpenUrl(url) => {
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let notice = match webbrowser::open(&url) {
                        Ok(()) => format!("Opened {url}"),
                        Err(err) => {
                            tracing::warn!(%url, error = %err, "failed to open browser");
                            format!("Couldn't open link: {err}")
                        }
                    };
                    let _ = tx.send(Event::Notice(notice));
                });
            }
            Command::CopyToClipboard(text) => {
                let tx = self.tx.clone();
                thread::spawn(move || {
                    let copied = arboard::Clipboard::new().and_then(|mut c| c.set_text(text));
                    let notice = match copied {
                        Ok(()) => "API key copied to clipboard".to_string(),
                        Err(err) => format!("Couldn't copy to clipboard: {err}"),
                    };
                    let _ = tx.send(Event::Notice(notice));
                });
            }
            other => self.spawn_remote(other),
        }
    }

    fn connect(&self, credential: &Credential) {
        match self.connector.connect(&credential.api_key) {
            Ok(services) => {
                *self.services.write() = services;
                tracing::info!(agent = %credential.agent_name, "connected");
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to build authenticated client");
                self.send(Event::Notice(format!("Couldn't connect: {err}")));
            }
        }
    }

    fn spawn_remote(&self, command: Command) {
        let services = self.services.read().clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            if let Some(event) = execute(&services, command) {
                let _ = tx.send(event);
            }
        });
    }

    fn send(&self, event: Event) {
        if self.tx.send(event).is_err() {
            tracing::debug!("event loop gone; dropping event");
        }
    }
}

/// Runs one gateway command to completion on the calling thread.
pub fn execute(services: &Services, command: Command) -> Option<Event> {
    let event = match command {
        Command::FetchFeedAfter { request, delay } => {
            thread::sleep(delay);
            fetch_feed(services, request)
        }
        Command::FetchFeed(request) => fetch_feed(services, request),
        Command::FetchComments(request) => {
            let result =
                services
                    .comments
                    .load_comments(&request.post_id, request.limit, request.offset);
            Event::CommentPage { request, result }
        }
        Command::FetchProfile { name } => {
            let result = services.agents.profile(&name);
            Event::Profile { name, result }
        }
        Command::FetchSelf => Event::SelfLoaded(services.agents.me()),
        Command::Register { name, description } => {
            Event::Registered(services.agents.register(&name, &description))
        }
        Command::CreatePost {
            community,
            title,
            body,
        } => Event::PostCreated(services.interactions.create_post(&community, &title, &body)),
        Command::CreateComment { post_id, body } => {
            let result = services.comments.create_comment(&post_id, &body);
            Event::CommentCreated { post_id, result }
        }
        Command::Vote { post_id } => {
            let result = services.interactions.vote(&post_id);
            Event::Voted { post_id, result }
        }
        Command::DeletePost { post_id } => {
            let result = services.interactions.delete_post(&post_id);
            Event::PostDeleted { post_id, result }
        }
        Command::Follow { name } => {
            let result = services.interactions.follow(&name);
            Event::Followed { name, result }
        }
        Command::Unfollow { name } => {
            let result = services.interactions.unfollow(&name);
            Event::Unfollowed { name, result }
        }
        Command::LoadCredential
        | Command::SaveCredential(_)
        | Command::Connect(_)
        | Command::OpenUrl(_)
        | Command::CopyToClipboard(_) => return None,
    };
    Some(event)
}

fn fetch_feed(services: &Services, request: PageRequest) -> Event {
    let result: Result<_, ApiError> = match &request.kind {
        FeedKind::Hot => services
            .feed
            .load_feed(request.sort, request.limit, request.offset),
        FeedKind::Personalized => {
            services
                .feed
                .load_personalized(request.sort, request.limit, request.offset)
        }
        FeedKind::Search(query) => services.feed.search(query, SearchKind::Posts),
    };
    if let Err(err) = &result {
        tracing::warn!(offset = request.offset, error = %err, "feed page failed");
    }
    Event::FeedPage { request, result }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::SortOption;
    use crate::data::DemoBackend;
    use crate::feed::LoadMode;

    fn demo() -> Services {
        Services::from_demo(Arc::new(DemoBackend::with_posts(25)))
    }

    #[test]
    fn feed_page_echoes_its_request() {
        let request = PageRequest {
            generation: 4,
            kind: FeedKind::Hot,
            sort: SortOption::Hot,
            limit: 20,
            offset: 20,
            mode: LoadMode::Append,
        };
        match execute(&demo(), Command::FetchFeed(request.clone())) {
            Some(Event::FeedPage { request: echoed, result }) => {
                assert_eq!(echoed, request);
                assert_eq!(result.unwrap().len(), 5);
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[test]
    fn local_commands_are_not_remote() {
        assert!(execute(&demo(), Command::OpenUrl("https://example.com".into())).is_none());
        assert!(execute(&demo(), Command::LoadCredential).is_none());
    }

    #[test]
    fn vote_reports_missing_post() {
        match execute(&demo(), Command::Vote { post_id: "nope".into() }) {
            Some(Event::Voted { post_id, result }) => {
                assert_eq!(post_id, "nope");
                assert!(matches!(result, Err(ApiError::NotFound(_))));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
