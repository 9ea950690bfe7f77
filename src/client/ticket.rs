use itertools::Itertools as _;
use serde_json::{json, Value};
use time::OffsetDateTime;
use tracing::{debug, info, warn};

use crate::{
    api,
    lifecycle,
    model::{
        ticket::{Filter, Id, NewTicket, Patch, Status},
        Ticket, User,
    },
    transport::Request,
    Error, Transport,
};

use super::{unread, Client, Origin};

impl<T: Transport> Client<T> {
    pub async fn list_tickets(
        &self,
        filter: &Filter,
    ) -> Result<Vec<Ticket>, Error> {
        let query = [
            filter.requester.map(|id| format!("SolicitanteId={id}")),
            filter.status.map(|s| format!("Status={}", s as u8)),
        ]
        .into_iter()
        .flatten()
        .join("&");
        let path = match query.as_str() {
            "" => api::ticket::PATH.to_owned(),
            q => format!("{}?{q}", api::ticket::PATH),
        };

        let result = async {
            let answer = self.transport.send(Request::get(path)).await?;
            let tickets = api::decode_list(&answer, api::ticket::decode)?;
            let tickets = tickets
                .into_iter()
                .filter(|t| filter.matches(t))
                .collect::<Vec<_>>();
            Ok::<_, Error>(tickets)
        }
        .await;
        self.or_degraded("list tickets", result, |store| {
            Ok(store.list_tickets(filter))
        })
    }

    /// Plain read: never changes the ticket. See [`Self::view_ticket`].
    pub async fn get_ticket(&self, id: Id) -> Result<Ticket, Error> {
        self.fetch_ticket(id).await.map(|(ticket, _)| ticket)
    }

    /// [`Self::get_ticket`], also reporting which source answered.
    pub async fn fetch_ticket(
        &self,
        id: Id,
    ) -> Result<(Ticket, Origin), Error> {
        let result = self
            .transport
            .send(Request::get(api::ticket::path(id)))
            .await
            .and_then(|answer| api::ticket::decode(&answer))
            .map(|ticket| (ticket, Origin::Remote));
        self.or_degraded("get ticket", result, |store| {
            Ok((store.get_ticket(id)?, Origin::Degraded))
        })
    }

    pub async fn create_ticket(&self, new: NewTicket) -> Result<Ticket, Error> {
        new.validate()?;

        let body = api::ticket::NewBody::from(&new);
        let result = self
            .transport
            .send(Request::post(api::ticket::PATH, json!(body)))
            .await
            .and_then(|answer| {
                if api::is_acknowledgement(&answer) {
                    return Err(Error::Malformed(
                        "created ticket was not returned".into(),
                    ));
                }
                api::ticket::decode(&answer)
            });
        let ticket = self.or_degraded("create ticket", result, |store| {
            Ok(store.create_ticket(&new))
        })?;
        info!(id = %ticket.id, "ticket created");
        Ok(ticket)
    }

    /// Explicit field edits. Status may only move forward to
    /// [`Status::InProgress`]: closing goes through
    /// [`Self::resolve_ticket`].
    pub async fn update_ticket(
        &self,
        id: Id,
        patch: Patch,
    ) -> Result<Ticket, Error> {
        if patch.is_empty() {
            return Err(Error::validation("nothing to update"));
        }
        if patch.resolution.is_some() || patch.status == Some(Status::Closed)
        {
            return Err(Error::validation(
                "tickets are closed by submitting a solution",
            ));
        }
        if patch.title.as_deref().is_some_and(|t| t.trim().is_empty()) {
            return Err(Error::validation("title cannot be blank"));
        }

        let body = api::ticket::PatchBody::from(&patch);
        let request = Request::put(api::ticket::path(id), json!(body));
        match self.transport.send(request).await {
            Ok(answer) => self.written(id, answer).await,
            Err(Error::Connectivity(reason)) => {
                warn!(%reason, "update ticket: serving from degraded store");
                self.store.update_ticket(id, &patch)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes a ticket. Deleting one that is already gone succeeds.
    pub async fn delete_ticket(&self, id: Id) -> Result<(), Error> {
        let result = match self
            .transport
            .send(Request::delete(api::ticket::path(id)))
            .await
        {
            Ok(_) | Err(Error::Remote { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        };
        self.or_degraded("delete ticket", result, |store| {
            store.delete_ticket(id);
            Ok(())
        })
    }

    /// Fetches a ticket for a detail view and applies the auto-claim.
    /// Call once per opened view, not per render.
    pub async fn view_ticket(
        &self,
        id: Id,
        viewer: &User,
    ) -> Result<Ticket, Error> {
        let (ticket, origin) = self.fetch_ticket(id).await?;
        Ok(self.claim_if_eligible(ticket, origin, viewer).await)
    }

    /// Moves an open ticket viewed by support staff to
    /// [`Status::InProgress`], in the source it was read from.
    ///
    /// Best effort: on any failure the ticket is returned as fetched.
    pub async fn claim_if_eligible(
        &self,
        ticket: Ticket,
        origin: Origin,
        viewer: &User,
    ) -> Ticket {
        let Some(patch) = lifecycle::claim(&ticket, viewer) else {
            return ticket;
        };
        let Some(_busy) = self.begin(ticket.id) else {
            debug!(id = %ticket.id, "claim already in flight");
            return ticket;
        };

        match self.write(ticket.id, &patch, origin).await {
            Ok(claimed) => {
                info!(id = %ticket.id, viewer = %viewer.id, "ticket claimed");
                claimed
            }
            Err(e) => {
                warn!(id = %ticket.id, error = %e, "auto-claim failed");
                ticket
            }
        }
    }

    /// Closes a ticket with `solution`. A ticket already closed, here or
    /// on the server, is rejected.
    pub async fn resolve_ticket(
        &self,
        id: Id,
        resolver: &User,
        solution: &str,
    ) -> Result<Ticket, Error> {
        let Some(_busy) = self.begin(id) else {
            return Err(Error::validation(format!(
                "ticket {id} is already being updated",
            )));
        };

        let (current, origin) = self.fetch_ticket(id).await?;
        let patch = lifecycle::resolve(
            &current,
            resolver,
            solution,
            OffsetDateTime::now_utc(),
        )?;
        let resolved = self.write(id, &patch, origin).await?;
        info!(%id, resolver = %resolver.id, "ticket resolved");
        Ok(resolved)
    }

    /// Applies `patch` where the ticket was read from. A remote ticket is
    /// never patched in the degraded store.
    async fn write(
        &self,
        id: Id,
        patch: &Patch,
        origin: Origin,
    ) -> Result<Ticket, Error> {
        if origin == Origin::Degraded {
            return self.store.update_ticket(id, patch);
        }
        let body = api::ticket::PatchBody::from(patch);
        let answer = self
            .transport
            .send(Request::put(api::ticket::path(id), json!(body)))
            .await?;
        self.written(id, answer).await
    }

    /// Ticket as the server holds it after accepting a write, re-reading
    /// it when the server only acknowledged.
    async fn written(&self, id: Id, answer: Value) -> Result<Ticket, Error> {
        let answer = if api::is_acknowledgement(&answer) {
            self.transport
                .send(Request::get(api::ticket::path(id)))
                .await
                .map_err(|e| unread(format_args!("ticket {id}"), e))?
        } else {
            answer
        };
        api::ticket::decode(&answer)
    }
}
