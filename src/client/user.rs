use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::{
    api,
    model::{
        user::{Id, NewUser, Patch},
        User,
    },
    transport::Request,
    Error, Transport,
};

use super::{unread, Client};

impl<T: Transport> Client<T> {
    pub async fn list_users(&self) -> Result<Vec<User>, Error> {
        let result = self
            .transport
            .send(Request::get(api::user::PATH))
            .await
            .and_then(|answer| api::decode_list(&answer, api::user::decode));
        self.or_degraded("list users", result, |store| Ok(store.list_users()))
    }

    /// Fetches a user by id, scanning the full list when the API has no
    /// usable by-id lookup.
    pub async fn get_user(&self, id: Id) -> Result<User, Error> {
        let result = self.remote_user(id).await;
        self.or_degraded("get user", result, |store| store.get_user(id))
    }

    async fn remote_user(&self, id: Id) -> Result<User, Error> {
        let direct = self
            .transport
            .send(Request::get(api::user::path(id)))
            .await
            .and_then(|answer| api::user::decode(&answer));
        match direct {
            Err(Error::Remote { status, .. }) => {
                debug!(%id, status, "by-id lookup refused, scanning list");
                self.scan_users(id).await
            }
            Err(Error::Malformed(reason)) => {
                debug!(%id, %reason, "by-id lookup unusable, scanning list");
                self.scan_users(id).await
            }
            other => other,
        }
    }

    async fn scan_users(&self, id: Id) -> Result<User, Error> {
        let answer = self.transport.send(Request::get(api::user::PATH)).await?;
        api::decode_list(&answer, api::user::decode)?
            .into_iter()
            .find(|u| u.id == id)
            .ok_or_else(|| Error::NotFound(format!("user {id}")))
    }

    /// Registers a user (administrators only, enforced by the server).
    pub async fn create_user(&self, new: NewUser) -> Result<User, Error> {
        new.validate()?;

        let body = api::user::NewBody::from(&new);
        let result = self
            .transport
            .send(Request::post(api::user::PATH, json!(body)))
            .await
            .and_then(|answer| {
                if api::is_acknowledgement(&answer) {
                    return Err(Error::Malformed(
                        "created user was not returned".into(),
                    ));
                }
                api::user::decode(&answer)
            });
        let user = self.or_degraded("create user", result, |store| {
            Ok(store.create_user(&new))
        })?;
        info!(id = %user.id, "user created");
        Ok(user)
    }

    /// Administrative update: may change the role and reset the password.
    pub async fn update_user(
        &self,
        id: Id,
        patch: Patch,
    ) -> Result<User, Error> {
        patch.validate()?;

        let path = api::user::path(id);
        match self.put_user(&path, &patch).await {
            Ok(Some(user)) => Ok(user),
            Ok(None) => self
                .remote_user(id)
                .await
                .map_err(|e| unread(format_args!("user {id}"), e)),
            Err(Error::Connectivity(reason)) => {
                warn!(%reason, "update user: serving from degraded store");
                self.store.update_user(id, &patch)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn delete_user(&self, id: Id) -> Result<(), Error> {
        let result = match self
            .transport
            .send(Request::delete(api::user::path(id)))
            .await
        {
            Ok(_) | Err(Error::Remote { status: 404, .. }) => Ok(()),
            Err(e) => Err(e),
        };
        self.or_degraded("delete user", result, |store| {
            store.delete_user(id);
            Ok(())
        })
    }

    /// Profile of the logged-in user. There is no offline identity, so a
    /// connectivity failure is returned as is.
    pub async fn my_profile(&self) -> Result<User, Error> {
        let answer = self
            .transport
            .send(Request::get(api::user::PROFILE_PATH))
            .await?;
        api::user::decode(&answer)
    }

    /// Self-service update of the logged-in user's own profile.
    pub async fn update_my_profile(&self, patch: Patch) -> Result<User, Error> {
        patch.validate()?;
        if !patch.is_self_service() {
            return Err(Error::validation(
                "role and password reset are set by an administrator",
            ));
        }

        match self.put_user(api::user::PROFILE_PATH, &patch).await? {
            Some(user) => Ok(user),
            None => self.my_profile().await,
        }
    }

    pub async fn change_password(
        &self,
        current: &str,
        new: &str,
    ) -> Result<(), Error> {
        if current.is_empty() || new.is_empty() {
            return Err(Error::validation(
                "current and new password are required",
            ));
        }
        if current == new {
            return Err(Error::validation(
                "new password must differ from the current one",
            ));
        }

        let body = api::user::PasswordBody {
            senha_atual: current,
            nova_senha: new,
        };
        self.transport
            .send(Request::put(api::user::PASSWORD_PATH, json!(body)))
            .await?;
        info!("password changed");
        Ok(())
    }

    /// `PUT`s `patch` to `path`. `None` when the server only acknowledged.
    async fn put_user(
        &self,
        path: &str,
        patch: &Patch,
    ) -> Result<Option<User>, Error> {
        let body = api::user::PatchBody::from(patch);
        let answer: Value =
            self.transport.send(Request::put(path, json!(body))).await?;
        if api::is_acknowledgement(&answer) {
            return Ok(None);
        }
        api::user::decode(&answer).map(Some)
    }
}
