use serde::Serialize;

use crate::{ApiClient, Credentials, Result};

#[derive(Debug, Serialize)]
pub struct LoginRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RegisterRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub username: &'a str,
}

impl ApiClient {
    /// Exchange email and password for a token.
    ///
    /// The returned credentials are meant for [`crate::Session::init`].
    pub async fn login(&self, email: &str, password: &str) -> Result<Credentials> {
        let response = self
            .post("/login")
            .json(&LoginRequest { email, password })
            .send()
            .await?;
        let credentials: Credentials = Self::json_response(response).await?;

        tracing::info!(user = %credentials.user.username, "logged in");
        Ok(credentials)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Credentials> {
        let response = self
            .post("/register")
            .json(&RegisterRequest {
                email,
                password,
                username,
            })
            .send()
            .await?;
        let credentials: Credentials = Self::json_response(response).await?;

        tracing::info!(user = %credentials.user.username, "registered");
        Ok(credentials)
    }
}
