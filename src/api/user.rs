use constcat::concat;
use serde::Serialize;
use serde_json::Value;

use crate::{
    model::{
        user::{Id, NewUser, Patch, Role},
        User,
    },
    Error,
};

use super::{ticket::enum_value, Fields};

pub const PATH: &str = "/api/Usuarios";
pub const PROFILE_PATH: &str = concat!(PATH, "/meu-perfil");
pub const PASSWORD_PATH: &str = concat!(PATH, "/alterar-senha");

const ID: &[&str] = &["Id", "id", "UsuarioId", "usuarioId"];
const NAME: &[&str] = &["Nome", "nome", "name"];
const EMAIL: &[&str] = &["Email", "email"];
const ROLE: &[&str] = &["Permissao", "permissao", "Role", "role"];
const PHONE: &[&str] = &["Telefone", "telefone", "phone"];
const JOB_TITLE: &[&str] = &["Cargo", "cargo", "jobTitle", "job_title"];

pub fn path(id: Id) -> String {
    format!("{PATH}/{id}")
}

/// Reads a user from a remote payload in any casing.
pub fn decode(value: &Value) -> Result<User, Error> {
    let fields = Fields::of(value)?;

    let id = fields
        .int(ID)
        .map(Id::from)
        .ok_or_else(|| Error::Malformed("user without id".into()))?;
    let role = match fields.int(ROLE) {
        Some(n) => enum_value::<Role>(n).ok_or_else(|| {
            Error::Malformed(format!("user {id}: unknown permission {n}"))
        })?,
        None => Role::Collaborator,
    };

    Ok(User {
        id,
        name: fields.string(NAME),
        email: fields.string(EMAIL),
        role,
        phone: fields.str(PHONE).map(str::to_owned),
        job_title: fields.string(JOB_TITLE),
    })
}

/// Body of `POST /api/Usuarios`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct NewBody<'a> {
    nome: &'a str,
    email: &'a str,
    senha: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    telefone: Option<&'a str>,
    cargo: &'a str,
    permissao: u8,
}

impl<'a> From<&'a NewUser> for NewBody<'a> {
    fn from(new: &'a NewUser) -> Self {
        Self {
            nome: new.name.trim(),
            email: new.email.trim(),
            senha: &new.password,
            telefone: new.phone.as_deref(),
            cargo: new.job_title.trim(),
            permissao: new.role as u8,
        }
    }
}

/// Body of `PUT /api/Usuarios/{id}` and `PUT /api/Usuarios/meu-perfil`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PatchBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    nome: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    telefone: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cargo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    permissao: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nova_senha: Option<&'a str>,
}

impl<'a> From<&'a Patch> for PatchBody<'a> {
    fn from(patch: &'a Patch) -> Self {
        Self {
            nome: patch.name.as_deref(),
            email: patch.email.as_deref(),
            telefone: patch.phone.as_deref(),
            cargo: patch.job_title.as_deref(),
            permissao: patch.role.map(|r| r as u8),
            nova_senha: patch.new_password.as_deref(),
        }
    }
}

/// Body of `PUT /api/Usuarios/alterar-senha`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PasswordBody<'a> {
    pub senha_atual: &'a str,
    pub nova_senha: &'a str,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn decodes_either_casing() {
        let pascal = decode(&json!({
            "Id": 2,
            "Nome": "Bruno",
            "Email": "bruno@example.com",
            "Permissao": 2,
            "Telefone": null,
            "Cargo": "Technician",
        }))
        .unwrap();
        let camel = decode(&json!({
            "id": 2,
            "nome": "Bruno",
            "email": "bruno@example.com",
            "permissao": "2",
            "cargo": "Technician",
        }))
        .unwrap();

        assert_eq!(pascal, camel);
        assert_eq!(pascal.role, Role::Support);
        assert_eq!(pascal.phone, None);
    }

    #[test]
    fn admin_patch_sends_role_and_reset() {
        let patch = Patch {
            role: Some(Role::Admin),
            new_password: Some("changeme".into()),
            ..Patch::default()
        };

        assert_eq!(
            serde_json::to_value(PatchBody::from(&patch)).unwrap(),
            json!({"Permissao": 3, "NovaSenha": "changeme"}),
        );
    }

    #[test]
    fn profile_paths() {
        assert_eq!(PROFILE_PATH, "/api/Usuarios/meu-perfil");
        assert_eq!(path(Id::from(4)), "/api/Usuarios/4");
    }
}
