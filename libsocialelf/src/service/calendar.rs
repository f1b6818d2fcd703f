//! Calendar with optimistic drag-and-drop rescheduling
//!
//! A move shows up locally as soon as it starts and stays unconfirmed until
//! the provider answers. When the provider refuses, the view is reloaded
//! from the provider rather than rolled back by hand, and subscribers get a
//! `RescheduleReverted` event.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, NaiveDate, NaiveTime, Timelike, Utc};
use chrono_tz::Tz;
use tracing::{info, warn};
use uuid::Uuid;

use super::events::{Event, EventBus};
use super::scheduling::SchedulingOrchestrator;
use crate::error::{Result, SocialElfError};
use crate::timezone::TimezoneResolver;
use crate::types::{Post, PostFilter};

/// Local time a dropped post lands on when nothing better is known
pub fn default_drop_time() -> NaiveTime {
    NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()
}

/// Where a post dropped on `day` ends up.
///
/// A precise time from the drop wins. Otherwise the post keeps its original
/// local hour and minute, and an unscheduled post lands at 09:00.
pub fn drop_target(
    timezones: &TimezoneResolver,
    tz: Tz,
    post: &Post,
    day: NaiveDate,
    precise: Option<NaiveTime>,
) -> Result<DateTime<Utc>> {
    let time = precise
        .or_else(|| {
            post.scheduled_for.and_then(|at| {
                let local = timezones.to_local(at, tz);
                NaiveTime::from_hms_opt(local.hour(), local.minute(), 0)
            })
        })
        .unwrap_or_else(default_drop_time);
    timezones.at(day, time, tz)
}

/// A move shown locally but not yet confirmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingMove {
    pub id: Uuid,
    pub post_id: String,
    pub from: Option<DateTime<Utc>>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MoveOutcome {
    Confirmed(Post),
    Reverted {
        message: String,
        /// False when the reload failed too and the view is stale
        view_refreshed: bool,
    },
}

pub struct CalendarView {
    orchestrator: SchedulingOrchestrator,
    profile_id: String,
    filter: PostFilter,
    tz: Tz,
    posts: Vec<Post>,
    pending: HashMap<String, PendingMove>,
    stale: bool,
    event_bus: EventBus,
}

impl CalendarView {
    pub async fn load(
        orchestrator: SchedulingOrchestrator,
        profile_id: &str,
        filter: PostFilter,
        event_bus: EventBus,
    ) -> Result<Self> {
        let acting = orchestrator.acting(profile_id).await?;
        let page = orchestrator.list_posts(profile_id, &filter).await?;

        Ok(Self {
            orchestrator,
            profile_id: profile_id.to_string(),
            filter,
            tz: acting.timezone,
            posts: page.posts,
            pending: HashMap::new(),
            stale: false,
            event_bus,
        })
    }

    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    pub fn post(&self, post_id: &str) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == post_id)
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// True when a reload after a failed move also failed
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn is_pending(&self, post_id: &str) -> bool {
        self.pending.contains_key(post_id)
    }

    /// Scheduled posts grouped by local day in the viewer's timezone
    pub fn posts_by_day(&self) -> BTreeMap<NaiveDate, Vec<&Post>> {
        let timezones = self.orchestrator.timezones();
        let mut days: BTreeMap<NaiveDate, Vec<&Post>> = BTreeMap::new();
        for post in &self.posts {
            if let Some(at) = post.scheduled_for {
                days.entry(timezones.local_date(at, self.tz))
                    .or_default()
                    .push(post);
            }
        }
        for posts in days.values_mut() {
            posts.sort_by_key(|p| p.scheduled_for);
        }
        days
    }

    /// Show the move locally and return the pending record to settle later
    pub fn begin_move(
        &mut self,
        post_id: &str,
        day: NaiveDate,
        precise: Option<NaiveTime>,
    ) -> Result<PendingMove> {
        if self.pending.contains_key(post_id) {
            return Err(SocialElfError::Validation(format!(
                "Post {} is already being moved",
                post_id
            )));
        }

        let timezones = self.orchestrator.timezones();
        let tz = self.tz;
        let post = self
            .posts
            .iter_mut()
            .find(|p| p.id == post_id)
            .ok_or_else(|| SocialElfError::NotFound(format!("post {} in calendar", post_id)))?;
        if post.status.blocks_update() {
            return Err(SocialElfError::PostLocked {
                post_id: post_id.to_string(),
                reason: format!("post is {}", post.status),
            });
        }

        let to = drop_target(&timezones, tz, post, day, precise)?;
        let pending = PendingMove {
            id: Uuid::new_v4(),
            post_id: post_id.to_string(),
            from: post.scheduled_for,
            to,
        };
        post.scheduled_for = Some(to);

        self.pending.insert(post_id.to_string(), pending.clone());
        Ok(pending)
    }

    /// Apply the provider's answer to a pending move
    pub async fn settle(&mut self, pending: PendingMove, result: Result<Post>) -> MoveOutcome {
        if self.pending.get(&pending.post_id).map(|p| p.id) == Some(pending.id) {
            self.pending.remove(&pending.post_id);
        }

        match result {
            Ok(post) => {
                if let Some(slot) = self.posts.iter_mut().find(|p| p.id == post.id) {
                    *slot = post.clone();
                }
                MoveOutcome::Confirmed(post)
            }
            Err(error) => self.revert(&pending, error).await,
        }
    }

    async fn revert(&mut self, pending: &PendingMove, error: SocialElfError) -> MoveOutcome {
        warn!(post_id = %pending.post_id, error = %error, "reschedule failed, reloading calendar");

        let view_refreshed = match self
            .orchestrator
            .list_posts(&self.profile_id, &self.filter)
            .await
        {
            Ok(page) => {
                self.posts = page.posts;
                self.stale = false;
                true
            }
            Err(reload_error) => {
                warn!(error = %reload_error, "calendar reload failed; view is stale");
                self.stale = true;
                false
            }
        };

        let message = if view_refreshed {
            format!("Could not reschedule post: {}", error)
        } else {
            format!(
                "Could not reschedule post: {}. The calendar could not be refreshed and may be out of date",
                error
            )
        };

        self.event_bus.emit(Event::RescheduleReverted {
            post_id: pending.post_id.clone(),
            message: message.clone(),
            view_refreshed,
        });
        MoveOutcome::Reverted {
            message,
            view_refreshed,
        }
    }

    /// Drag a post onto `day`, optionally at a precise local time
    pub async fn move_post(
        &mut self,
        post_id: &str,
        day: NaiveDate,
        precise: Option<NaiveTime>,
    ) -> Result<MoveOutcome> {
        let pending = self.begin_move(post_id, day, precise)?;
        info!(post_id, to = %pending.to, "moving post");

        let result = self
            .orchestrator
            .reschedule_post(&self.profile_id, post_id, pending.to)
            .await;
        Ok(self.settle(pending, result).await)
    }
}
