use derive_more::{Display, From};
use enum_utils::TryFromRepr;
use time::OffsetDateTime;

use crate::Error;

use super::user;

#[derive(Clone, Debug, PartialEq)]
pub struct Ticket {
    pub id: Id,
    pub title: String,
    pub description: String,

    /// Free-text category.
    pub kind: String,
    pub priority: Priority,
    pub status: Status,
    pub requester: user::Id,
    pub assignee: Option<user::Id>,
    pub opened_at: Option<OffsetDateTime>,

    /// Present exactly when the ticket has been resolved.
    pub resolution: Option<Resolution>,
}

#[derive(
    Clone, Copy, Debug, Display, Eq, From, Hash, Ord, PartialEq, PartialOrd,
)]
pub struct Id(i64);

impl Id {
    pub fn get(self) -> i64 {
        self.0
    }
}

#[derive(
    Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, TryFromRepr,
)]
#[repr(u8)]
pub enum Priority {
    Low = 1,
    Medium = 2,
    High = 3,
}

/// Ticket status. Ordered: a ticket only ever moves forward.
#[derive(
    Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, TryFromRepr,
)]
#[repr(u8)]
pub enum Status {
    /// Filed, nobody is working on it yet.
    Open = 1,

    /// Claimed by a support member.
    InProgress = 2,

    /// Resolved. Terminal.
    Closed = 3,
}

/// Solution text and closing time, always set together.
#[derive(Clone, Debug, PartialEq)]
pub struct Resolution {
    pub solution: String,
    pub closed_at: OffsetDateTime,
}

impl Ticket {
    pub fn solution(&self) -> Option<&str> {
        self.resolution.as_ref().map(|r| r.solution.as_str())
    }

    pub fn closed_at(&self) -> Option<OffsetDateTime> {
        self.resolution.as_ref().map(|r| r.closed_at)
    }

    pub fn is_closed(&self) -> bool {
        self.status == Status::Closed
    }

    /// Applies `patch` in place, refusing anything that would break the
    /// ticket invariants: status regression, edits to the lifecycle fields
    /// of a closed ticket, or closing without a resolution.
    pub(crate) fn apply(&mut self, patch: &Patch) -> Result<(), Error> {
        let status = match (&patch.resolution, patch.status) {
            (Some(_), Some(s)) if s != Status::Closed => {
                return Err(Error::validation(
                    "a resolution can only accompany closing",
                ));
            }
            (Some(_), _) => Some(Status::Closed),
            (None, s) => s,
        };

        if self.is_closed()
            && (patch.assignee.is_some()
                || patch.resolution.is_some()
                || status.is_some_and(|s| s != Status::Closed))
        {
            return Err(Error::validation(format!(
                "ticket {} is already closed",
                self.id,
            )));
        }
        if let Some(status) = status {
            if status < self.status {
                return Err(Error::validation(format!(
                    "ticket {} cannot move back from {:?} to {status:?}",
                    self.id, self.status,
                )));
            }
            if status == Status::Closed
                && self.resolution.is_none()
                && patch.resolution.is_none()
            {
                return Err(Error::validation(
                    "a ticket is closed only by submitting a solution",
                ));
            }
        }

        if let Some(title) = &patch.title {
            self.title.clone_from(title);
        }
        if let Some(description) = &patch.description {
            self.description.clone_from(description);
        }
        if let Some(kind) = &patch.kind {
            self.kind.clone_from(kind);
        }
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        if let Some(assignee) = patch.assignee {
            self.assignee = Some(assignee);
        }
        if let Some(resolution) = &patch.resolution {
            self.resolution = Some(resolution.clone());
        }
        if let Some(status) = status {
            self.status = status;
        }
        Ok(())
    }
}

/// Ticket as filed by a collaborator.
#[derive(Clone, Debug)]
pub struct NewTicket {
    pub title: String,
    pub description: String,
    pub kind: String,
    pub priority: Priority,
    pub requester: user::Id,
}

impl NewTicket {
    pub fn validate(&self) -> Result<(), Error> {
        if self.title.trim().is_empty() {
            return Err(Error::validation("title is required"));
        }
        if self.description.trim().is_empty() {
            return Err(Error::validation("description is required"));
        }
        if self.requester.get() <= 0 {
            return Err(Error::validation("requester is required"));
        }
        Ok(())
    }
}

/// Partial update. Unset fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub priority: Option<Priority>,
    pub status: Option<Status>,
    pub assignee: Option<user::Id>,

    /// Set by the resolve transition only.
    pub resolution: Option<Resolution>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Filter {
    pub requester: Option<user::Id>,
    pub status: Option<Status>,
}

impl Filter {
    pub fn requester(id: user::Id) -> Self {
        Self {
            requester: Some(id),
            status: None,
        }
    }

    pub fn status(status: Status) -> Self {
        Self {
            requester: None,
            status: Some(status),
        }
    }

    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.requester.map_or(true, |id| ticket.requester == id)
            && self.status.map_or(true, |s| ticket.status == s)
    }
}
