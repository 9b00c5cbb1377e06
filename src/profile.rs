use std::collections::HashSet;

use crate::api::{Agent, ApiError, Post};
use crate::dispatch::Command;
use crate::layout::{self, Context};
use crate::viewport::Viewport;

/// The signed-in agent's stats and recent posts.
#[derive(Debug, Clone)]
pub struct ProfileState {
    pub name: String,
    pub agent: Option<Agent>,
    pub posts: Vec<Post>,
    pub selected: usize,
    pub viewport: Viewport,
    deleting: Option<String>,
    boosted: HashSet<String>,
}

impl ProfileState {
    pub fn open(name: impl Into<String>) -> (Self, Command) {
        let profile = Self {
            name: name.into(),
            agent: None,
            posts: Vec::new(),
            selected: 0,
            viewport: Viewport::default(),
            deleting: None,
            boosted: HashSet::new(),
        };
        let command = profile.fetch();
        (profile, command)
    }

    pub fn fetch(&self) -> Command {
        Command::FetchProfile {
            name: self.name.clone(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.agent.is_none()
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting.is_some()
    }

    pub fn selected_post(&self) -> Option<&Post> {
        self.posts.get(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.selected + 1 < self.posts.len() {
            self.selected += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// Deletes the selected post unless a delete is already in flight.
    pub fn delete_selected(&mut self) -> Option<Command> {
        if self.deleting.is_some() {
            return None;
        }
        let post_id = self.selected_post()?.id.clone();
        self.deleting = Some(post_id.clone());
        Some(Command::DeletePost { post_id })
    }

    /// Returns true when the completion belongs to this profile's delete.
    pub fn finish_delete(&mut self, post_id: &str) -> bool {
        if self.deleting.as_deref() == Some(post_id) {
            self.deleting = None;
            true
        } else {
            false
        }
    }

    /// Applies a profile response. Returns the error when it belongs here.
    pub fn apply(
        &mut self,
        name: &str,
        result: Result<(Agent, Vec<Post>), ApiError>,
    ) -> Option<Result<(), ApiError>> {
        if name != self.name {
            tracing::debug!(%name, "dropping stale profile");
            return None;
        }
        match result {
            Ok((agent, posts)) => {
                self.agent = Some(agent);
                self.posts = posts;
                self.boosted.clear();
                self.selected = self.selected.min(self.posts.len().saturating_sub(1));
                Some(Ok(()))
            }
            Err(err) => Some(Err(err)),
        }
    }

    pub fn boost(&mut self, post_id: &str) {
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) {
            post.upvotes += 1;
            self.boosted.insert(post_id.to_string());
        }
    }

    /// Takes back an optimistic upvote unless the posts were refetched since.
    pub fn unboost(&mut self, post_id: &str) {
        if !self.boosted.remove(post_id) {
            return;
        }
        if let Some(post) = self.posts.iter_mut().find(|post| post.id == post_id) {
            post.upvotes -= 1;
        }
    }

    pub fn settle(&mut self, post_id: &str) {
        self.boosted.remove(post_id);
    }

    pub fn is_boosted(&self, post_id: &str) -> bool {
        self.boosted.contains(post_id)
    }

    pub fn refresh_view(&mut self, ctx: &Context<'_>) {
        self.viewport
            .resize(ctx.width, layout::profile_viewport_height(ctx.height));
        let Some(agent) = &self.agent else {
            self.viewport.set_content(Vec::new(), vec![0]);
            return;
        };
        let (lines, offsets) = layout::profile_content(agent, &self.posts, self.selected, ctx);
        self.viewport.set_content(lines, offsets);
        self.viewport.sync_to(self.selected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            ..Post::default()
        }
    }

    #[test]
    fn delete_is_guarded() {
        let (mut profile, _) = ProfileState::open("crab");
        profile.apply("crab", Ok((Agent::default(), vec![post("a"), post("b")])));
        assert_eq!(
            profile.delete_selected(),
            Some(Command::DeletePost { post_id: "a".into() })
        );
        profile.select_next();
        assert_eq!(profile.delete_selected(), None);
        assert!(!profile.finish_delete("b"));
        assert!(profile.finish_delete("a"));
        assert!(profile.delete_selected().is_some());
    }

    #[test]
    fn reload_clamps_selection() {
        let (mut profile, _) = ProfileState::open("crab");
        profile.apply("crab", Ok((Agent::default(), vec![post("a"), post("b")])));
        profile.select_next();
        profile.apply("crab", Ok((Agent::default(), vec![post("a")])));
        assert_eq!(profile.selected, 0);
        assert!(profile.apply("other", Ok((Agent::default(), Vec::new()))).is_none());
    }

    #[test]
    fn refetch_drops_the_optimistic_mark() {
        let (mut profile, _) = ProfileState::open("crab");
        profile.apply("crab", Ok((Agent::default(), vec![post("a")])));
        profile.boost("a");
        assert_eq!(profile.posts[0].upvotes, 1);
        assert!(profile.is_boosted("a"));

        let mut fresh = post("a");
        fresh.upvotes = 1;
        profile.apply("crab", Ok((Agent::default(), vec![fresh])));
        profile.unboost("a");
        assert_eq!(profile.posts[0].upvotes, 1);
    }
}
