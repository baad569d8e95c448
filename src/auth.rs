use async_trait::async_trait;
use pgwire::api::auth::{AuthSource, LoginInfo, Password};
use pgwire::error::{ErrorInfo, PgWireError, PgWireResult};

/// Cleartext credentials. With `user` unset any login name is accepted.
#[derive(Debug, Clone)]
pub struct BookqAuthSource {
    user: Option<String>,
    password: String,
}

impl BookqAuthSource {
    pub fn new(user: Option<String>, password: String) -> Self {
        Self { user, password }
    }

    pub fn accepts_user(&self, login_user: Option<&str>) -> bool {
        match &self.user {
            Some(expected) => login_user == Some(expected.as_str()),
            None => true,
        }
    }
}

#[async_trait]
impl AuthSource for BookqAuthSource {
    async fn get_password(&self, login: &LoginInfo) -> PgWireResult<Password> {
        if !self.accepts_user(login.user()) {
            metrics::counter!(crate::observability::AUTH_FAILURES_TOTAL).increment(1);
            return Err(PgWireError::UserError(Box::new(ErrorInfo::new(
                "FATAL".into(),
                "28P01".into(),
                format!("password authentication failed for user \"{}\"", login.user().unwrap_or("")),
            ))));
        }
        Ok(Password::new(None, self.password.as_bytes().to_vec()))
    }
}
