use serde::Serialize;
use serde_json::Value;

use crate::{model::User, Error};

use super::{user, Fields};

pub const LOGIN_PATH: &str = "/api/Auth/login";

const TOKEN: &[&str] = &["Token", "token", "accessToken", "access_token"];
const USER: &[&str] = &["Usuario", "usuario", "User", "user"];

/// Body of `POST /api/Auth/login`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoginBody<'a> {
    pub email: &'a str,
    pub senha: &'a str,
}

/// Reads the bearer token and, when the server includes it, the
/// authenticated user.
pub fn decode_login(value: &Value) -> Result<(String, Option<User>), Error> {
    let fields = Fields::of(value)?;
    let token = fields
        .str(TOKEN)
        .ok_or_else(|| Error::Malformed("login answer without token".into()))?;
    let user = fields
        .value(USER)
        .map(user::decode)
        .transpose()?;
    Ok((token.to_owned(), user))
}
