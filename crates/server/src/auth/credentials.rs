use std::collections::BTreeSet;

use anyhow::{Context, bail};
use config::{AuthConfig, IdentityClass, UserRecord};
use rate_limit::QuotaPolicy;
use secrecy::ExposeSecret;

/// Stored user credentials, loaded once at startup.
pub struct CredentialStore {
    users: Vec<UserRecord>,
}

impl CredentialStore {
    /// Loads inline users followed by the users file, if one is configured.
    pub fn load(config: &AuthConfig) -> anyhow::Result<Self> {
        let mut users = config.users.clone();

        if let Some(path) = &config.users_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read users file {}", path.display()))?;

            let from_file: Vec<UserRecord> = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse users file {}", path.display()))?;

            log::debug!("Loaded {} users from {}", from_file.len(), path.display());
            users.extend(from_file);
        }

        Self::new(users)
    }

    pub fn new(users: Vec<UserRecord>) -> anyhow::Result<Self> {
        let mut usernames = BTreeSet::new();

        for user in &users {
            if !usernames.insert(user.username.as_str()) {
                bail!("Username '{}' is defined more than once", user.username);
            }
        }

        Ok(Self { users })
    }

    /// Finds the record matching both fields exactly.
    pub fn find(&self, username: &str, password: &str) -> Option<&UserRecord> {
        self.users
            .iter()
            .find(|user| user.username == username && user.password.expose_secret() == password)
    }

    /// Fails when a stored user has a class without a quota limit.
    pub fn ensure_covered_by(&self, policy: &QuotaPolicy) -> anyhow::Result<()> {
        for class in self.classes() {
            if !policy.covers(class) {
                bail!("Users of class '{class}' exist, but the class has no quota limit. Add it to [server.quotas.limits].");
            }
        }

        Ok(())
    }

    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    fn classes(&self) -> BTreeSet<&IdentityClass> {
        self.users.iter().map(|user| &user.class).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use config::QuotaConfig;

    use super::*;

    fn record(id: &str, username: &str, password: &str, class: &str) -> UserRecord {
        UserRecord {
            id: id.to_string(),
            username: username.to_string(),
            password: password.to_string().into(),
            class: IdentityClass::new(class),
        }
    }

    #[test]
    fn lookup_is_exact_and_case_sensitive() {
        let store = CredentialStore::new(vec![record("1", "alice", "Secret", "user")]).unwrap();

        assert_eq!(store.find("alice", "Secret").map(|u| u.id.as_str()), Some("1"));
        assert!(store.find("alice", "secret").is_none());
        assert!(store.find("Alice", "Secret").is_none());
        assert!(store.find("alice", "Secret ").is_none());
        assert!(store.find("bob", "Secret").is_none());
    }

    #[test]
    fn users_file_is_merged_with_inline_users() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "2", "username": "bob", "password": "builder", "type": "user"}}]"#
        )
        .unwrap();

        let config = AuthConfig {
            users: vec![record("1", "alice", "wonderland", "user")],
            users_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };

        let store = CredentialStore::load(&config).unwrap();

        assert_eq!(store.user_count(), 2);
        assert_eq!(store.find("bob", "builder").map(|u| u.id.as_str()), Some("2"));
    }

    #[test]
    fn duplicate_usernames_are_rejected() {
        let result = CredentialStore::new(vec![
            record("1", "alice", "a", "user"),
            record("2", "alice", "b", "user"),
        ]);

        assert!(result.is_err());
    }

    #[test]
    fn duplicates_across_inline_users_and_users_file_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"id": "2", "username": "alice", "password": "other", "class": "user"}}]"#
        )
        .unwrap();

        let config = AuthConfig {
            users: vec![record("1", "alice", "wonderland", "user")],
            users_file: Some(file.path().to_path_buf()),
            ..Default::default()
        };

        let error = CredentialStore::load(&config).err().unwrap();
        assert_eq!(error.to_string(), "Username 'alice' is defined more than once");
    }

    #[test]
    fn classes_without_limits_are_rejected() {
        let policy = QuotaPolicy::new(&QuotaConfig::default());

        let store = CredentialStore::new(vec![record("1", "alice", "a", "user")]).unwrap();
        assert!(store.ensure_covered_by(&policy).is_ok());

        let store = CredentialStore::new(vec![record("1", "carol", "a", "enterprise")]).unwrap();
        let error = store.ensure_covered_by(&policy).unwrap_err();
        assert!(error.to_string().contains("'enterprise'"), "{error}");
    }

    #[test]
    fn missing_users_file_fails() {
        let config = AuthConfig {
            users_file: Some("/nonexistent/users.json".into()),
            ..Default::default()
        };

        let error = CredentialStore::load(&config).err().unwrap();
        assert!(error.to_string().contains("Failed to read users file"), "{error}");
    }
}
