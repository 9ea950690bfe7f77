use derive_more::{Display, From};
use enum_utils::TryFromRepr;

use crate::Error;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct User {
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub phone: Option<String>,
    pub job_title: String,
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

#[derive(Clone, Copy, Debug, Eq, TryFromRepr, PartialEq)]
#[repr(u8)]
pub enum Role {
    /// Files tickets and follows their progress.
    Collaborator = 1,

    /// Handles tickets: claims them on view and submits solutions.
    Support = 2,

    /// Support privileges plus user administration.
    Admin = 3,
}

impl Role {
    /// Whether this role claims and resolves tickets.
    pub fn handles_tickets(self) -> bool {
        matches!(self, Self::Support | Self::Admin)
    }
}

/// Account to be registered by an administrator.
#[derive(Clone, Debug)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Role,
    pub phone: Option<String>,
    pub job_title: String,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), Error> {
        if self.name.trim().is_empty() {
            return Err(Error::validation("name is required"));
        }
        if !self.email.contains('@') {
            return Err(Error::validation("a valid email is required"));
        }
        if self.password.is_empty() {
            return Err(Error::validation("password is required"));
        }
        Ok(())
    }
}

/// Partial update. Unset fields are left untouched on the server.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Patch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub job_title: Option<String>,
    pub role: Option<Role>,

    /// One-time password reset, set by an administrator.
    pub new_password: Option<String>,
}

impl Patch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.is_empty() {
            return Err(Error::validation("nothing to update"));
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(Error::validation("name cannot be blank"));
        }
        if self.email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(Error::validation("a valid email is required"));
        }
        if self.new_password.as_deref().is_some_and(str::is_empty) {
            return Err(Error::validation("new password cannot be blank"));
        }
        Ok(())
    }

    /// Fields a user may change on their own profile.
    pub fn is_self_service(&self) -> bool {
        self.role.is_none() && self.new_password.is_none()
    }
}

impl User {
    pub(crate) fn apply(&mut self, patch: &Patch) {
        if let Some(name) = &patch.name {
            self.name.clone_from(name);
        }
        if let Some(email) = &patch.email {
            self.email.clone_from(email);
        }
        if let Some(phone) = &patch.phone {
            self.phone = Some(phone.clone());
        }
        if let Some(job_title) = &patch.job_title {
            self.job_title.clone_from(job_title);
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
    }
}
