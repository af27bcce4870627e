use std::fmt;

use super::error::{CouchDaoError, CouchResult};

const ENV_BASE_URL: &str = "COUCH_BASE_URL";
const ENV_DATABASE: &str = "COUCH_DB";
const ENV_USERNAME: &str = "COUCH_USERNAME";
const ENV_PASSWORD: &str = "COUCH_PASSWORD";

/// Where the score documents live and how to authenticate against the server.
#[derive(Clone)]
pub struct CouchConfig {
    pub base_url: String,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl CouchConfig {
    /// Anonymous access to `database` on the server at `base_url`.
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
            username: None,
            password: None,
        }
    }

    /// Read `COUCH_BASE_URL`, `COUCH_DB` and the optional credential pair.
    pub fn from_env() -> CouchResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CouchResult<Self> {
        let required = |var: &'static str| {
            lookup(var)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
                .ok_or(CouchDaoError::MissingEnvVar { var })
        };

        let mut config = Self::new(required(ENV_BASE_URL)?, required(ENV_DATABASE)?);
        // Credentials only count as a pair.
        if let (Some(username), Some(password)) = (lookup(ENV_USERNAME), lookup(ENV_PASSWORD)) {
            config.username = Some(username);
            config.password = Some(password);
        }
        Ok(config)
    }
}

impl fmt::Debug for CouchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CouchConfig")
            .field("base_url", &self.base_url)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn missing_database_is_reported() {
        let err = CouchConfig::from_lookup(lookup(&[(ENV_BASE_URL, "http://couch:5984")]))
            .unwrap_err();
        assert!(matches!(
            err,
            CouchDaoError::MissingEnvVar { var: ENV_DATABASE }
        ));
    }

    #[test]
    fn half_a_credential_pair_is_ignored() {
        let config = CouchConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://couch:5984"),
            (ENV_DATABASE, "tally"),
            (ENV_USERNAME, "admin"),
        ]))
        .unwrap();
        assert_eq!(config.database, "tally");
        assert!(config.username.is_none());
    }

    #[test]
    fn debug_output_hides_the_password() {
        let config = CouchConfig::from_lookup(lookup(&[
            (ENV_BASE_URL, "http://couch:5984"),
            (ENV_DATABASE, "tally"),
            (ENV_USERNAME, "admin"),
            (ENV_PASSWORD, "hunter2"),
        ]))
        .unwrap();
        assert!(!format!("{config:?}").contains("hunter2"));
    }
}
