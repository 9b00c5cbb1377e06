use std::sync::Arc;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;

use crate::api::{self, Agent, ApiError, Comment, Post, SearchKind, SortOption};

pub trait FeedService: Send + Sync {
    fn load_feed(
        &self,
        sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError>;
    fn load_personalized(
        &self,
        sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError>;
    fn search(&self, query: &str, kind: SearchKind) -> Result<Vec<Post>, ApiError>;
}

pub trait CommentService: Send + Sync {
    fn load_comments(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Comment>, ApiError>;
    fn create_comment(&self, post_id: &str, body: &str) -> Result<(), ApiError>;
}

pub trait InteractionService: Send + Sync {
    fn create_post(&self, community: &str, title: &str, body: &str) -> Result<(), ApiError>;
    fn delete_post(&self, post_id: &str) -> Result<(), ApiError>;
    fn vote(&self, post_id: &str) -> Result<(), ApiError>;
    fn follow(&self, name: &str) -> Result<(), ApiError>;
    fn unfollow(&self, name: &str) -> Result<(), ApiError>;
}

pub trait AgentService: Send + Sync {
    fn register(&self, name: &str, description: &str) -> Result<Agent, ApiError>;
    fn me(&self) -> Result<Agent, ApiError>;
    fn profile(&self, name: &str) -> Result<(Agent, Vec<Post>), ApiError>;
}

/// Every gateway seam the dispatcher talks to.
#[derive(Clone)]
pub struct Services {
    pub feed: Arc<dyn FeedService>,
    pub comments: Arc<dyn CommentService>,
    pub interactions: Arc<dyn InteractionService>,
    pub agents: Arc<dyn AgentService>,
}

impl Services {
    pub fn from_client(client: Arc<api::Client>) -> Self {
        Self {
            feed: Arc::new(MoltbookFeedService::new(client.clone())),
            comments: Arc::new(MoltbookCommentService::new(client.clone())),
            interactions: Arc::new(MoltbookInteractionService::new(client.clone())),
            agents: Arc::new(MoltbookAgentService::new(client)),
        }
    }

    pub fn from_demo(backend: Arc<DemoBackend>) -> Self {
        Self {
            feed: backend.clone(),
            comments: backend.clone(),
            interactions: backend.clone(),
            agents: backend,
        }
    }
}

pub struct MoltbookFeedService {
    client: Arc<api::Client>,
}

impl MoltbookFeedService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl FeedService for MoltbookFeedService {
    fn load_feed(
        &self,
        sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError> {
        self.client.feed(sort, limit, offset)
    }

    fn load_personalized(
        &self,
        sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError> {
        self.client.personalized_feed(sort, limit, offset)
    }

    fn search(&self, query: &str, kind: SearchKind) -> Result<Vec<Post>, ApiError> {
        self.client.search(query, kind)
    }
}

pub struct MoltbookCommentService {
    client: Arc<api::Client>,
}

impl MoltbookCommentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl CommentService for MoltbookCommentService {
    fn load_comments(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Comment>, ApiError> {
        self.client.comments(post_id, limit, offset)
    }

    fn create_comment(&self, post_id: &str, body: &str) -> Result<(), ApiError> {
        self.client.create_comment(post_id, body)
    }
}

pub struct MoltbookInteractionService {
    client: Arc<api::Client>,
}

impl MoltbookInteractionService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl InteractionService for MoltbookInteractionService {
    fn create_post(&self, community: &str, title: &str, body: &str) -> Result<(), ApiError> {
        self.client.create_post(community, title, body)
    }

    fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        self.client.delete_post(post_id)
    }

    fn vote(&self, post_id: &str) -> Result<(), ApiError> {
        self.client.upvote(post_id)
    }

    fn follow(&self, name: &str) -> Result<(), ApiError> {
        self.client.follow(name)
    }

    fn unfollow(&self, name: &str) -> Result<(), ApiError> {
        self.client.unfollow(name)
    }
}

pub struct MoltbookAgentService {
    client: Arc<api::Client>,
}

impl MoltbookAgentService {
    pub fn new(client: Arc<api::Client>) -> Self {
        Self { client }
    }
}

impl AgentService for MoltbookAgentService {
    fn register(&self, name: &str, description: &str) -> Result<Agent, ApiError> {
        self.client.register(name, description)
    }

    fn me(&self) -> Result<Agent, ApiError> {
        self.client.me()
    }

    fn profile(&self, name: &str) -> Result<(Agent, Vec<Post>), ApiError> {
        self.client.profile(name)
    }
}

pub const DEMO_AGENT: &str = "demo-crab";

struct DemoState {
    posts: Vec<Post>,
    comments: Vec<(String, Comment)>,
    agent: Agent,
    next_id: u64,
}

/// In-memory backend used for `--demo` and tests. Paging honours `limit`
/// and `offset` so infinite scroll behaves like the real service.
pub struct DemoBackend {
    state: Mutex<DemoState>,
}

impl Default for DemoBackend {
    fn default() -> Self {
        Self::with_posts(45)
    }
}

impl DemoBackend {
    pub fn with_posts(count: usize) -> Self {
        let base = Utc.with_ymd_and_hms(2025, 1, 30, 12, 0, 0).single().unwrap_or_else(Utc::now);
        let communities = [
            ("general", "General"),
            ("crustacea", "Crustacea"),
            ("shell", "Shell Scripts"),
        ];
        let mut posts = Vec::with_capacity(count);
        let mut comments = Vec::new();
        for i in 0..count {
            let (name, display) = communities[i % communities.len()];
            let id = format!("demo-{i}");
            posts.push(Post {
                id: id.clone(),
                kind: "text".into(),
                title: format!("Dispatch #{i} from the molt"),
                body: demo_body(i),
                link: (i % 4 == 0).then(|| format!("https://example.com/molt/{i}")),
                upvotes: (count - i) as i64 * 3,
                downvotes: (i % 3) as i64,
                created_at: Some(base - ChronoDuration::minutes(i as i64 * 17)),
                author: api::Author {
                    name: format!("agent-{}", i % 7),
                },
                community: api::Community {
                    name: name.into(),
                    display_name: display.into(),
                },
                relevance: None,
            });
            for c in 0..(i % 5) {
                comments.push((
                    id.clone(),
                    Comment {
                        id: format!("demo-{i}-c{c}"),
                        body: format!("Reply {c} to dispatch {i}. Claws up."),
                        author: api::Author {
                            name: format!("agent-{}", (i + c + 1) % 7),
                        },
                        upvotes: c as i64,
                        downvotes: 0,
                        created_at: Some(base - ChronoDuration::minutes(c as i64)),
                    },
                ));
            }
        }

        Self {
            state: Mutex::new(DemoState {
                posts,
                comments,
                agent: Agent {
                    name: DEMO_AGENT.into(),
                    description: "Offline demo agent".into(),
                    karma: 42,
                    follower_count: 7,
                    following_count: 3,
                    claimed: true,
                    ..Agent::default()
                },
                next_id: count as u64,
            }),
        }
    }

    pub fn post_count(&self) -> usize {
        self.state.lock().posts.len()
    }

    pub fn upvotes_of(&self, post_id: &str) -> Option<i64> {
        self.state
            .lock()
            .posts
            .iter()
            .find(|post| post.id == post_id)
            .map(|post| post.upvotes)
    }
}

fn demo_body(i: usize) -> String {
    let mut body = String::from("Molting season notes. ");
    for _ in 0..(i % 4) {
        body.push_str("The shell is shed and the crab grows larger, one layer at a time. ");
    }
    body.trim_end().to_string()
}

fn page<T: Clone>(items: &[T], limit: usize, offset: usize) -> Vec<T> {
    items.iter().skip(offset).take(limit).cloned().collect()
}

impl FeedService for DemoBackend {
    fn load_feed(
        &self,
        _sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError> {
        Ok(page(&self.state.lock().posts, limit, offset))
    }

    fn load_personalized(
        &self,
        _sort: SortOption,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Post>, ApiError> {
        let state = self.state.lock();
        let followed: Vec<Post> = state
            .posts
            .iter()
            .filter(|post| post.community.name != "shell")
            .cloned()
            .collect();
        Ok(page(&followed, limit, offset))
    }

    fn search(&self, query: &str, _kind: SearchKind) -> Result<Vec<Post>, ApiError> {
        let needle = query.to_lowercase();
        Ok(self
            .state
            .lock()
            .posts
            .iter()
            .filter(|post| {
                post.title.to_lowercase().contains(&needle)
                    || post.body.to_lowercase().contains(&needle)
            })
            .cloned()
            .map(|mut post| {
                post.relevance = Some(1.0);
                post
            })
            .collect())
    }
}

impl CommentService for DemoBackend {
    fn load_comments(
        &self,
        post_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<Comment>, ApiError> {
        let state = self.state.lock();
        if !state.posts.iter().any(|post| post.id == post_id) {
            return Err(ApiError::NotFound(format!("post {post_id}")));
        }
        let comments: Vec<Comment> = state
            .comments
            .iter()
            .filter(|(parent, _)| parent == post_id)
            .map(|(_, comment)| comment.clone())
            .collect();
        Ok(page(&comments, limit, offset))
    }

    fn create_comment(&self, post_id: &str, body: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        let id = format!("demo-c{}", state.next_id);
        state.next_id += 1;
        let author = state.agent.name.clone();
        state.comments.push((
            post_id.to_string(),
            Comment {
                id,
                body: body.to_string(),
                author: api::Author { name: author },
                created_at: Some(Utc::now()),
                ..Comment::default()
            },
        ));
        Ok(())
    }
}

impl InteractionService for DemoBackend {
    fn create_post(&self, community: &str, title: &str, body: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        let id = format!("demo-{}", state.next_id);
        state.next_id += 1;
        let author = state.agent.name.clone();
        state.posts.insert(
            0,
            Post {
                id,
                kind: "text".into(),
                title: title.to_string(),
                body: body.to_string(),
                created_at: Some(Utc::now()),
                author: api::Author { name: author },
                community: api::Community {
                    name: community.to_string(),
                    display_name: community.to_string(),
                },
                ..Post::default()
            },
        );
        Ok(())
    }

    fn delete_post(&self, post_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        let before = state.posts.len();
        state.posts.retain(|post| post.id != post_id);
        if state.posts.len() == before {
            return Err(ApiError::NotFound(format!("post {post_id}")));
        }
        Ok(())
    }

    fn vote(&self, post_id: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        match state.posts.iter_mut().find(|post| post.id == post_id) {
            Some(post) => {
                post.upvotes += 1;
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("post {post_id}"))),
        }
    }

    fn follow(&self, _name: &str) -> Result<(), ApiError> {
        self.state.lock().agent.following_count += 1;
        Ok(())
    }

    fn unfollow(&self, _name: &str) -> Result<(), ApiError> {
        let mut state = self.state.lock();
        state.agent.following_count = (state.agent.following_count - 1).max(0);
        Ok(())
    }
}

impl AgentService for DemoBackend {
    fn register(&self, name: &str, description: &str) -> Result<Agent, ApiError> {
        let mut state = self.state.lock();
        state.agent = Agent {
            name: name.to_string(),
            description: description.to_string(),
            claimed: false,
            api_key: Some(format!("moltbook_demo_{}", state.next_id)),
            claim_url: Some(format!("https://www.moltbook.com/claim/{name}")),
            ..Agent::default()
        };
        Ok(state.agent.clone())
    }

    fn me(&self) -> Result<Agent, ApiError> {
        Ok(self.state.lock().agent.clone())
    }

    fn profile(&self, name: &str) -> Result<(Agent, Vec<Post>), ApiError> {
        let state = self.state.lock();
        let mut agent = state.agent.clone();
        agent.api_key = None;
        if agent.name != name {
            agent = Agent {
                name: name.to_string(),
                ..Agent::default()
            };
        }
        let posts = state
            .posts
            .iter()
            .filter(|post| post.author.name == name)
            .cloned()
            .collect();
        Ok((agent, posts))
    }
}
