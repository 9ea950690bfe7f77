//! Ticket status machine: `Open -> InProgress -> Closed`.
//!
//! Transitions are pure: they inspect a ticket and the acting user and
//! return the [`Patch`] to write, leaving I/O to the client.

use derive_more::Display;
use time::OffsetDateTime;

use crate::model::{
    ticket::{Patch, Resolution, Status},
    Ticket, User,
};

#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum Rejection {
    #[display("ticket is already closed")]
    AlreadyClosed,

    #[display("a solution is required")]
    EmptySolution,

    #[display("only support staff can resolve tickets")]
    NotQualified,
}

/// Auto-claim on view: an open ticket viewed by support staff moves to
/// `InProgress`, assigned to the viewer unless someone already is.
///
/// Returns `None` when there is nothing to change, which makes viewing an
/// `InProgress` or `Closed` ticket a no-op.
pub fn claim(ticket: &Ticket, viewer: &User) -> Option<Patch> {
    if ticket.status != Status::Open || !viewer.role.handles_tickets() {
        return None;
    }
    Some(Patch {
        status: Some(Status::InProgress),
        assignee: ticket.assignee.is_none().then_some(viewer.id),
        ..Patch::default()
    })
}

/// Closes `ticket` with `solution`, assigning it to the resolver unless
/// someone already is.
pub fn resolve(
    ticket: &Ticket,
    resolver: &User,
    solution: &str,
    now: OffsetDateTime,
) -> Result<Patch, Rejection> {
    if ticket.is_closed() {
        return Err(Rejection::AlreadyClosed);
    }
    if !resolver.role.handles_tickets() {
        return Err(Rejection::NotQualified);
    }
    let solution = solution.trim();
    if solution.is_empty() {
        return Err(Rejection::EmptySolution);
    }
    Ok(Patch {
        status: Some(Status::Closed),
        assignee: ticket.assignee.is_none().then_some(resolver.id),
        resolution: Some(Resolution {
            solution: solution.to_owned(),
            closed_at: now,
        }),
        ..Patch::default()
    })
}
