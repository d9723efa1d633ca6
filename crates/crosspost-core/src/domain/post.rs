use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Platform, PlatformPublishResult};
use crate::error::SchedulingError;

/// Lifecycle status of a post.
///
/// Draft and Scheduled are editable; Publishing is the transient in-flight
/// state; Published, PartiallyPublished and Failed are terminal for one
/// publish cycle. A later edit + reschedule starts a fresh cycle from
/// Scheduled or Publishing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Scheduled,
    Publishing,
    Published,
    PartiallyPublished,
    Failed,
}

impl PostStatus {
    /// Terminal for the current publish cycle - no automatic transition
    /// leaves these states.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Published | Self::PartiallyPublished | Self::Failed
        )
    }

    /// States in which user edits and deletion are allowed.
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Draft | Self::Scheduled)
    }

    /// States from which a publish attempt may begin. Publishing re-entry
    /// covers the retry-after-fault path of the same job.
    pub fn can_begin_publishing(&self) -> bool {
        matches!(self, Self::Draft | Self::Scheduled | Self::Publishing)
    }

    /// Whether `self -> next` is a legal lifecycle transition.
    pub fn can_transition_to(&self, next: PostStatus) -> bool {
        use PostStatus::*;
        match (*self, next) {
            // Scheduling and re-scheduling.
            (Draft, Scheduled) | (Scheduled, Scheduled) => true,
            // Cancelling a schedule reverts to Draft.
            (Scheduled, Draft) => true,
            // Begin publishing, including fault-retry re-entry.
            (Draft, Publishing) | (Scheduled, Publishing) | (Publishing, Publishing) => true,
            // Orchestrator completion.
            (Publishing, Published) | (Publishing, PartiallyPublished) | (Publishing, Failed) => {
                true
            }
            // A terminal post may start a fresh cycle.
            (from, Scheduled) | (from, Publishing) if from.is_terminal() => true,
            _ => false,
        }
    }
}

impl fmt::Display for PostStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Scheduled => write!(f, "scheduled"),
            Self::Publishing => write!(f, "publishing"),
            Self::Published => write!(f, "published"),
            Self::PartiallyPublished => write!(f, "partially_published"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "scheduled" => Ok(Self::Scheduled),
            "publishing" => Ok(Self::Publishing),
            "published" => Ok(Self::Published),
            "partially_published" => Ok(Self::PartiallyPublished),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid post status: {s}")),
        }
    }
}

/// Post entity - one unit of content to be distributed to a fixed set of
/// target platforms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub workspace_id: Uuid,
    pub author_id: Uuid,
    pub content: String,
    /// Target platforms, fixed at creation.
    pub platforms: Vec<Platform>,
    /// Media attachment used by image-first platforms (Instagram).
    pub media_url: Option<String>,
    pub status: PostStatus,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub published_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    /// Job-level failure detail (retry exhaustion, cancellation).
    pub error: Option<String>,
    /// Per-platform outcomes, append-only across publish cycles.
    pub results: Vec<PlatformPublishResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Post {
    /// Create a new draft post.
    pub fn new(
        workspace_id: Uuid,
        author_id: Uuid,
        content: String,
        platforms: Vec<Platform>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            workspace_id,
            author_id,
            content,
            platforms,
            media_url: None,
            status: PostStatus::Draft,
            scheduled_at: None,
            published_at: None,
            failed_at: None,
            error: None,
            results: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Move the post into Scheduled for the given future time.
    pub fn schedule(&mut self, when: DateTime<Utc>) -> Result<(), SchedulingError> {
        self.transition(PostStatus::Scheduled)?;
        self.scheduled_at = Some(when);
        Ok(())
    }

    /// Revert a scheduled post to Draft, clearing its schedule.
    pub fn cancel_schedule(&mut self) -> Result<(), SchedulingError> {
        self.transition(PostStatus::Draft)?;
        self.scheduled_at = None;
        Ok(())
    }

    /// Enter the in-flight Publishing state.
    pub fn begin_publishing(&mut self) -> Result<(), SchedulingError> {
        self.transition(PostStatus::Publishing)
    }

    /// Drive the post to its terminal status from aggregated outcomes,
    /// stamping the matching timestamp.
    pub fn complete(&mut self, terminal: PostStatus) -> Result<(), SchedulingError> {
        debug_assert!(terminal.is_terminal());
        self.transition(terminal)?;
        match terminal {
            PostStatus::Published | PostStatus::PartiallyPublished => {
                self.published_at = Some(self.updated_at);
            }
            PostStatus::Failed => {
                self.failed_at = Some(self.updated_at);
            }
            _ => {}
        }
        Ok(())
    }

    /// Record one platform outcome. Results are immutable once appended.
    pub fn record_result(&mut self, result: PlatformPublishResult) {
        self.results.push(result);
        self.updated_at = Utc::now();
    }

    fn transition(&mut self, next: PostStatus) -> Result<(), SchedulingError> {
        if !self.status.can_transition_to(next) {
            return Err(SchedulingError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> Post {
        Post::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            "hello world".to_owned(),
            vec![Platform::Facebook, Platform::Twitter],
        )
    }

    #[test]
    fn draft_schedules_and_cancels_back_to_draft() {
        let mut post = draft();
        let when = Utc::now() + chrono::Duration::hours(1);

        post.schedule(when).unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
        assert_eq!(post.scheduled_at, Some(when));

        post.cancel_schedule().unwrap();
        assert_eq!(post.status, PostStatus::Draft);
        assert_eq!(post.scheduled_at, None);
    }

    #[test]
    fn publishing_completes_to_each_terminal_status() {
        for terminal in [
            PostStatus::Published,
            PostStatus::PartiallyPublished,
            PostStatus::Failed,
        ] {
            let mut post = draft();
            post.begin_publishing().unwrap();
            post.complete(terminal).unwrap();
            assert_eq!(post.status, terminal);
            match terminal {
                PostStatus::Failed => {
                    assert!(post.failed_at.is_some());
                    assert!(post.published_at.is_none());
                }
                _ => assert!(post.published_at.is_some()),
            }
        }
    }

    #[test]
    fn terminal_post_may_start_a_fresh_cycle() {
        let mut post = draft();
        post.begin_publishing().unwrap();
        post.complete(PostStatus::Failed).unwrap();

        post.schedule(Utc::now() + chrono::Duration::minutes(5)).unwrap();
        assert_eq!(post.status, PostStatus::Scheduled);
    }

    #[test]
    fn no_transition_out_of_publishing_except_completion() {
        let mut post = draft();
        post.begin_publishing().unwrap();

        assert!(matches!(
            post.schedule(Utc::now() + chrono::Duration::hours(1)),
            Err(SchedulingError::InvalidTransition { .. })
        ));
        assert!(matches!(
            post.cancel_schedule(),
            Err(SchedulingError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn terminal_states_reject_completion() {
        let mut post = draft();
        post.begin_publishing().unwrap();
        post.complete(PostStatus::Published).unwrap();
        assert!(post.complete(PostStatus::Failed).is_err());
    }

    #[test]
    fn status_parses_from_display() {
        for status in [
            PostStatus::Draft,
            PostStatus::Scheduled,
            PostStatus::Publishing,
            PostStatus::Published,
            PostStatus::PartiallyPublished,
            PostStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<PostStatus>(), Ok(status));
        }
    }
}
