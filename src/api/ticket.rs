use serde::Serialize;
use serde_json::Value;
use time::OffsetDateTime;
use tracing::warn;

use crate::{
    model::{
        ticket::{Id, NewTicket, Patch, Priority, Resolution, Status},
        user, Ticket,
    },
    Error,
};

use super::{format_datetime, Fields};

pub const PATH: &str = "/api/Chamados";

const ID: &[&str] = &["Id", "id", "ChamadoId", "chamadoId"];
const TITLE: &[&str] = &["Titulo", "titulo", "title"];
const DESCRIPTION: &[&str] = &["Descricao", "descricao", "description"];
const KIND: &[&str] = &["Tipo", "tipo", "type", "kind"];
const PRIORITY: &[&str] = &["Prioridade", "prioridade", "priority"];
const STATUS: &[&str] = &["Status", "status"];
const REQUESTER: &[&str] = &[
    "SolicitanteId",
    "solicitanteId",
    "solicitante_id",
    "requesterId",
    "requester_id",
];
const REQUESTER_REF: &[&str] = &["Solicitante", "solicitante"];
const ASSIGNEE: &[&str] = &[
    "TecnicoResponsavelId",
    "tecnicoResponsavelId",
    "tecnico_responsavel_id",
    "assigneeId",
    "assignee_id",
];
const OPENED_AT: &[&str] = &[
    "DataAbertura",
    "dataAbertura",
    "data_abertura",
    "openedAt",
    "opened_at",
];
const CLOSED_AT: &[&str] = &[
    "DataFechamento",
    "dataFechamento",
    "data_fechamento",
    "closedAt",
    "closed_at",
];
const SOLUTION: &[&str] = &["Solucao", "solucao", "solution"];

pub fn path(id: Id) -> String {
    format!("{PATH}/{id}")
}

/// Reads a ticket from a remote payload in any casing.
pub fn decode(value: &Value) -> Result<Ticket, Error> {
    let fields = Fields::of(value)?;

    let id = fields
        .int(ID)
        .map(Id::from)
        .ok_or_else(|| Error::Malformed("ticket without id".into()))?;
    let requester = fields
        .int(REQUESTER)
        .or_else(|| fields.object(REQUESTER_REF)?.int(ID))
        .map(user::Id::from)
        .ok_or_else(|| {
            Error::Malformed(format!("ticket {id} without requester"))
        })?;
    let priority = match fields.int(PRIORITY) {
        Some(n) => enum_value::<Priority>(n).ok_or_else(|| {
            Error::Malformed(format!("ticket {id}: unknown priority {n}"))
        })?,
        None => Priority::Medium,
    };
    let status = match fields.int(STATUS) {
        Some(n) => enum_value::<Status>(n).ok_or_else(|| {
            Error::Malformed(format!("ticket {id}: unknown status {n}"))
        })?,
        None => Status::Open,
    };

    let opened_at = fields.datetime(OPENED_AT);
    let solution = fields.str(SOLUTION);
    let closed_at = fields.datetime(CLOSED_AT);
    let resolution = match (status, solution, closed_at) {
        (Status::Closed, Some(solution), Some(closed_at)) => Some(Resolution {
            solution: solution.to_owned(),
            closed_at,
        }),
        // Still shown as closed: the missing half is filled in.
        (Status::Closed, solution, closed_at) => {
            warn!(
                %id,
                has_solution = solution.is_some(),
                has_closed_at = closed_at.is_some(),
                "closed ticket with incomplete resolution",
            );
            Some(Resolution {
                solution: solution.unwrap_or_default().to_owned(),
                closed_at: closed_at
                    .or(opened_at)
                    .unwrap_or(OffsetDateTime::UNIX_EPOCH),
            })
        }
        (_, None, None) => None,
        (status, ..) => {
            warn!(%id, ?status, "resolution of an unclosed ticket ignored");
            None
        }
    };

    Ok(Ticket {
        id,
        title: fields.string(TITLE),
        description: fields.string(DESCRIPTION),
        kind: fields.string(KIND),
        priority,
        status,
        requester,
        assignee: fields.int(ASSIGNEE).map(user::Id::from),
        opened_at,
        resolution,
    })
}

pub(crate) fn enum_value<E: TryFrom<u8>>(n: i64) -> Option<E> {
    u8::try_from(n).ok().and_then(|n| E::try_from(n).ok())
}

/// Body of `POST /api/Chamados`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewBody<'a> {
    titulo: &'a str,
    descricao: &'a str,
    tipo: &'a str,
    solicitante_id: i64,
    prioridade: u8,
    status: u8,
}

impl<'a> From<&'a NewTicket> for NewBody<'a> {
    fn from(new: &'a NewTicket) -> Self {
        Self {
            titulo: new.title.trim(),
            descricao: new.description.trim(),
            tipo: new.kind.trim(),
            solicitante_id: new.requester.get(),
            prioridade: new.priority as u8,
            status: Status::Open as u8,
        }
    }
}

/// Body of `PUT /api/Chamados/{id}`.
#[derive(Debug, Default, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    titulo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    descricao: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tipo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prioridade: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    status: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tecnico_responsavel_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data_fechamento: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    solucao: Option<&'a str>,
}

impl<'a> From<&'a Patch> for PatchBody<'a> {
    fn from(patch: &'a Patch) -> Self {
        let status = match &patch.resolution {
            Some(_) => Some(Status::Closed),
            None => patch.status,
        };
        Self {
            titulo: patch.title.as_deref(),
            descricao: patch.description.as_deref(),
            tipo: patch.kind.as_deref(),
            prioridade: patch.priority.map(|p| p as u8),
            status: status.map(|s| s as u8),
            tecnico_responsavel_id: patch.assignee.map(user::Id::get),
            data_fechamento: patch
                .resolution
                .as_ref()
                .and_then(|r| format_datetime(r.closed_at)),
            solucao: patch.resolution.as_ref().map(|r| r.solution.as_str()),
        }
    }
}
