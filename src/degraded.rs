//! Synthetic in-memory dataset served while the API is unreachable.
//!
//! Seeded deterministically on construction and never persisted. One
//! mutex guards the whole store; throughput is irrelevant here.

use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard, PoisonError},
};

use time::{macros::datetime, OffsetDateTime};
use tracing::debug;

use crate::{
    model::{
        ticket::{self, Filter, NewTicket, Priority, Resolution, Status},
        user::{self, NewUser, Role},
        Ticket, User,
    },
    Error,
};

#[derive(Debug)]
pub struct DegradedStore {
    inner: Mutex<Inner>,
}

#[derive(Debug)]
struct Inner {
    tickets: BTreeMap<ticket::Id, Ticket>,
    users: BTreeMap<user::Id, User>,
    next_ticket_id: i64,
    next_user_id: i64,
}

impl Default for DegradedStore {
    fn default() -> Self {
        Self::seeded()
    }
}

impl DegradedStore {
    /// Store holding the fixed seed population: one ticket per status and
    /// priority combination worth showing, owned by two collaborators.
    pub fn seeded() -> Self {
        let users = seed_users();
        let tickets = seed_tickets();
        let next_ticket_id =
            tickets.keys().last().map_or(0, |id| id.get()) + 1;
        let next_user_id = users.keys().last().map_or(0, |id| id.get()) + 1;
        Self {
            inner: Mutex::new(Inner {
                tickets,
                users,
                next_ticket_id,
                next_user_id,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn list_tickets(&self, filter: &Filter) -> Vec<Ticket> {
        self.lock()
            .tickets
            .values()
            .filter(|t| filter.matches(t))
            .cloned()
            .collect()
    }

    pub fn get_ticket(&self, id: ticket::Id) -> Result<Ticket, Error> {
        self.lock()
            .tickets
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("ticket {id}")))
    }

    pub fn create_ticket(&self, new: &NewTicket) -> Ticket {
        let mut inner = self.lock();
        let id = ticket::Id::from(inner.next_ticket_id);
        inner.next_ticket_id += 1;

        let ticket = Ticket {
            id,
            title: new.title.trim().to_owned(),
            description: new.description.trim().to_owned(),
            kind: new.kind.trim().to_owned(),
            priority: new.priority,
            status: Status::Open,
            requester: new.requester,
            assignee: None,
            opened_at: Some(OffsetDateTime::now_utc()),
            resolution: None,
        };
        inner.tickets.insert(id, ticket.clone());
        debug!(%id, "degraded store: ticket created");
        ticket
    }

    pub fn update_ticket(
        &self,
        id: ticket::Id,
        patch: &ticket::Patch,
    ) -> Result<Ticket, Error> {
        let mut inner = self.lock();
        let ticket = inner
            .tickets
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("ticket {id}")))?;
        ticket.apply(patch)?;
        debug!(%id, "degraded store: ticket updated");
        Ok(ticket.clone())
    }

    /// Removes a ticket. Removing an absent one succeeds.
    pub fn delete_ticket(&self, id: ticket::Id) {
        if self.lock().tickets.remove(&id).is_some() {
            debug!(%id, "degraded store: ticket deleted");
        }
    }

    pub fn list_users(&self) -> Vec<User> {
        self.lock().users.values().cloned().collect()
    }

    pub fn get_user(&self, id: user::Id) -> Result<User, Error> {
        self.lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }

    pub fn find_user_by_email(&self, email: &str) -> Option<User> {
        let email = email.trim();
        self.lock()
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned()
    }

    pub fn create_user(&self, new: &NewUser) -> User {
        let mut inner = self.lock();
        let id = user::Id::from(inner.next_user_id);
        inner.next_user_id += 1;

        let user = User {
            id,
            name: new.name.trim().to_owned(),
            email: new.email.trim().to_owned(),
            role: new.role,
            phone: new.phone.clone(),
            job_title: new.job_title.trim().to_owned(),
        };
        inner.users.insert(id, user.clone());
        user
    }

    pub fn update_user(
        &self,
        id: user::Id,
        patch: &user::Patch,
    ) -> Result<User, Error> {
        let mut inner = self.lock();
        let user = inner
            .users
            .get_mut(&id)
            .ok_or_else(|| Error::NotFound(format!("user {id}")))?;
        user.apply(patch);
        Ok(user.clone())
    }

    pub fn delete_user(&self, id: user::Id) {
        self.lock().users.remove(&id);
    }
}

fn seed_users() -> BTreeMap<user::Id, User> {
    [
        (1, "Ana Souza", "ana@desk.local", Role::Collaborator, "Analyst"),
        (2, "Bruno Lima", "bruno@desk.local", Role::Support, "Technician"),
        (3, "Carla Dias", "carla@desk.local", Role::Admin, "IT Manager"),
        (7, "Diego Rocha", "diego@desk.local", Role::Collaborator, "Buyer"),
    ]
    .into_iter()
    .map(|(id, name, email, role, job_title)| {
        let id = user::Id::from(id);
        let user = User {
            id,
            name: name.into(),
            email: email.into(),
            role,
            phone: None,
            job_title: job_title.into(),
        };
        (id, user)
    })
    .collect()
}

fn seed_tickets() -> BTreeMap<ticket::Id, Ticket> {
    let seed = |id: i64,
                title: &str,
                kind: &str,
                priority: Priority,
                requester: i64,
                opened_at: OffsetDateTime| Ticket {
        id: ticket::Id::from(id),
        title: title.into(),
        description: format!("{title} (sample ticket, offline mode)"),
        kind: kind.into(),
        priority,
        status: Status::Open,
        requester: user::Id::from(requester),
        assignee: None,
        opened_at: Some(opened_at),
        resolution: None,
    };

    let mut tickets = vec![
        seed(
            1,
            "Printer on 2nd floor jammed",
            "Hardware",
            Priority::Low,
            1,
            datetime!(2024-03-01 09:00 UTC),
        ),
        seed(
            2,
            "Cannot reach the VPN",
            "Network",
            Priority::High,
            7,
            datetime!(2024-03-01 11:30 UTC),
        ),
        seed(
            3,
            "Request access to the ERP",
            "Access",
            Priority::Medium,
            1,
            datetime!(2024-03-02 08:15 UTC),
        ),
        seed(
            4,
            "Laptop running slow",
            "Hardware",
            Priority::Medium,
            7,
            datetime!(2024-03-02 14:00 UTC),
        ),
        seed(
            5,
            "Email quota exceeded",
            "Software",
            Priority::High,
            1,
            datetime!(2024-02-27 10:00 UTC),
        ),
        seed(
            6,
            "Monitor flickering",
            "Hardware",
            Priority::Low,
            7,
            datetime!(2024-02-26 16:45 UTC),
        ),
    ];

    for t in &mut tickets[2..4] {
        t.status = Status::InProgress;
        t.assignee = Some(user::Id::from(2));
    }
    let closings = [
        (
            "Archived old mail and raised quota",
            datetime!(2024-02-28 09:00 UTC),
        ),
        ("Replaced the video cable", datetime!(2024-02-27 11:20 UTC)),
    ];
    for (t, (solution, closed_at)) in tickets[4..].iter_mut().zip(closings) {
        t.status = Status::Closed;
        t.assignee = Some(user::Id::from(2));
        t.resolution = Some(Resolution {
            solution: solution.into(),
            closed_at,
        });
    }

    tickets.into_iter().map(|t| (t.id, t)).collect()
}
