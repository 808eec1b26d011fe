use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        errors::{AuthError, RepoError},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
        repo::UserStore,
        repo_types::{NewUser, User},
    },
    config::BootstrapConfig,
};

const MIN_PASSWORD_LEN: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone)]
pub struct RegisterUser {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    Created,
    AlreadyExists,
}

/// Credential checks and token issuance over an injected [`UserStore`].
#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn UserStore>,
    keys: Arc<JwtKeys>,
}

impl AuthService {
    pub fn new(store: Arc<dyn UserStore>, keys: Arc<JwtKeys>) -> Self {
        Self { store, keys }
    }

    /// Looks the user up by email and checks the password.
    ///
    /// An unknown email yields [`AuthError::UserNotFound`] and a wrong password
    /// [`AuthError::InvalidCredentials`]; the HTTP layer renders both identically.
    #[instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<User, AuthError> {
        let email = normalize_email(email);
        let mut tx = self.store.begin().await?;
        let user = match tx.find_by_email(&email).await? {
            Some(u) => u,
            None => {
                warn!(email = %email, "login unknown email");
                return Err(AuthError::UserNotFound);
            }
        };

        if !verify_password(password, &user.password_hash) {
            warn!(email = %email, user_id = %user.id, "login invalid password");
            return Err(AuthError::InvalidCredentials);
        }
        Ok(user)
    }

    /// Authenticates and returns a signed access token for the user's email.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let user = self.authenticate(email, password).await?;
        let token = self.keys.issue(&user.email)?;
        info!(user_id = %user.id, email = %user.email, "user logged in");
        Ok(token)
    }

    #[instrument(skip(self, req), fields(email = %req.email))]
    pub async fn register(&self, req: RegisterUser) -> Result<User, AuthError> {
        let email = normalize_email(&req.email);
        let name = req.name.trim().to_string();

        if name.is_empty() {
            return Err(AuthError::Validation("Name is required".into()));
        }
        if !is_valid_email(&email) {
            warn!(email = %email, "invalid email");
            return Err(AuthError::Validation("Invalid email".into()));
        }
        if req.password.chars().count() < MIN_PASSWORD_LEN {
            warn!("password too short");
            return Err(AuthError::Validation("Password too short".into()));
        }

        let mut tx = self.store.begin().await?;
        if tx.find_by_email(&email).await?.is_some() {
            warn!(email = %email, "email already registered");
            return Err(AuthError::Conflict);
        }

        let password_hash =
            hash_password(&req.password).map_err(|e| AuthError::Hash(e.to_string()))?;
        let user = tx
            .insert(NewUser {
                name,
                email,
                password_hash,
            })
            .await
            .map_err(conflict_on_duplicate)?;
        tx.commit().await.map_err(conflict_on_duplicate)?;

        info!(user_id = %user.id, email = %user.email, "user registered");
        Ok(user)
    }

    /// Resolves a bearer token to the stored user it names.
    pub async fn current_user(&self, token: &str) -> Result<User, AuthError> {
        let email = self.keys.verify(token)?;
        let mut tx = self.store.begin().await?;
        match tx.find_by_email(&email).await? {
            Some(u) => Ok(u),
            None => {
                warn!(email = %email, "token subject has no user");
                Err(AuthError::InvalidToken)
            }
        }
    }

    /// Creates the well-known default account if it does not exist yet.
    pub async fn bootstrap_default_user(
        &self,
        cfg: &BootstrapConfig,
    ) -> Result<BootstrapOutcome, AuthError> {
        let email = normalize_email(&cfg.email);
        let mut tx = self.store.begin().await?;
        if tx.find_by_email(&email).await?.is_some() {
            info!(email = %email, "default user already exists");
            return Ok(BootstrapOutcome::AlreadyExists);
        }

        let password_hash =
            hash_password(&cfg.password).map_err(|e| AuthError::Hash(e.to_string()))?;
        let inserted = tx
            .insert(NewUser {
                name: cfg.name.clone(),
                email: email.clone(),
                password_hash,
            })
            .await;
        let outcome = match inserted {
            Ok(_) => tx.commit().await.map(|_| BootstrapOutcome::Created),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(o) => {
                info!(email = %email, "default user created");
                Ok(o)
            }
            // Another instance created it between our lookup and insert.
            Err(RepoError::Duplicate(_)) => {
                info!(email = %email, "default user already exists");
                Ok(BootstrapOutcome::AlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn conflict_on_duplicate(e: RepoError) -> AuthError {
    match e {
        RepoError::Duplicate(_) => AuthError::Conflict,
        other => AuthError::Repository(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{auth::memory::MemoryUserStore, config::JwtConfig};

    fn make_service() -> (AuthService, MemoryUserStore) {
        let (svc, store, _) = make_service_with_keys();
        (svc, store)
    }

    fn make_service_with_keys() -> (AuthService, MemoryUserStore, Arc<JwtKeys>) {
        let store = MemoryUserStore::new();
        let keys = Arc::new(
            JwtKeys::new(&JwtConfig {
                secret: "secretkey123456".into(),
                algorithm: "HS256".into(),
                ttl_minutes: 30,
            })
            .expect("keys"),
        );
        let svc = AuthService::new(Arc::new(store.clone()), keys.clone());
        (svc, store, keys)
    }

    fn register_req(email: &str, password: &str) -> RegisterUser {
        RegisterUser {
            name: "Ana".into(),
            email: email.into(),
            password: password.into(),
        }
    }

    #[test]
    fn email_validation() {
        assert!(is_valid_email("admin@admin.com"));
        assert!(!is_valid_email("admin"));
        assert!(!is_valid_email("a b@c.d"));
        assert!(!is_valid_email("a@b"));
    }

    #[tokio::test]
    async fn default_admin_can_authenticate_after_bootstrap() {
        let (svc, _) = make_service();
        let outcome = svc
            .bootstrap_default_user(&BootstrapConfig::default())
            .await
            .unwrap();
        assert_eq!(outcome, BootstrapOutcome::Created);

        let user = svc.authenticate("admin@admin.com", "admin").await.unwrap();
        assert_eq!(user.email, "admin@admin.com");
        assert_eq!(user.name, "admin");
        assert_ne!(user.password_hash, "admin");

        assert!(matches!(
            svc.authenticate("admin@admin.com", "wrong").await,
            Err(AuthError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn bootstrap_twice_creates_one_user() {
        let (svc, store) = make_service();
        let cfg = BootstrapConfig::default();
        assert_eq!(
            svc.bootstrap_default_user(&cfg).await.unwrap(),
            BootstrapOutcome::Created
        );
        let first_hash = store.get("admin@admin.com").unwrap().password_hash;
        assert_eq!(
            svc.bootstrap_default_user(&cfg).await.unwrap(),
            BootstrapOutcome::AlreadyExists
        );
        assert_eq!(store.count(), 1);
        assert_eq!(store.get("admin@admin.com").unwrap().password_hash, first_hash);
    }

    #[tokio::test]
    async fn unknown_email_is_not_found() {
        let (svc, _) = make_service();
        assert!(matches!(
            svc.authenticate("ghost@nowhere.com", "anything").await,
            Err(AuthError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn register_then_login_issues_token_for_email() {
        let (svc, _, keys) = make_service_with_keys();
        let user = svc
            .register(register_req("  Ana@Example.COM ", "s3cretpass"))
            .await
            .unwrap();
        assert_eq!(user.email, "ana@example.com");

        let token = svc.login("ana@example.com", "s3cretpass").await.unwrap();
        assert_eq!(keys.verify(&token).unwrap(), "ana@example.com");

        let me = svc.current_user(&token).await.unwrap();
        assert_eq!(me.id, user.id);
    }

    #[tokio::test]
    async fn register_duplicate_email_conflicts() {
        let (svc, store) = make_service();
        svc.register(register_req("ana@example.com", "s3cretpass"))
            .await
            .unwrap();
        assert!(matches!(
            svc.register(register_req("ANA@example.com", "otherpass1")).await,
            Err(AuthError::Conflict)
        ));
        assert_eq!(store.count(), 1);
    }

    #[tokio::test]
    async fn register_validates_input() {
        let (svc, store) = make_service();
        assert!(matches!(
            svc.register(register_req("not-an-email", "s3cretpass")).await,
            Err(AuthError::Validation(_))
        ));
        assert!(matches!(
            svc.register(register_req("ana@example.com", "short")).await,
            Err(AuthError::Validation(_))
        ));
        let mut blank = register_req("ana@example.com", "s3cretpass");
        blank.name = "   ".into();
        assert!(matches!(svc.register(blank).await, Err(AuthError::Validation(_))));
        assert_eq!(store.count(), 0);
    }

    #[tokio::test]
    async fn current_user_rejects_token_for_missing_user() {
        let (svc, _, keys) = make_service_with_keys();
        let token = keys.issue("deleted@example.com").unwrap();
        assert!(matches!(
            svc.current_user(&token).await,
            Err(AuthError::InvalidToken)
        ));
    }

    #[tokio::test]
    async fn current_user_reports_expiry() {
        let (svc, _, keys) = make_service_with_keys();
        svc.bootstrap_default_user(&BootstrapConfig::default())
            .await
            .unwrap();
        let issued = time::OffsetDateTime::now_utc() - time::Duration::hours(1);
        let token = keys
            .issue_at("admin@admin.com", issued, keys.ttl())
            .unwrap();
        assert!(matches!(
            svc.current_user(&token).await,
            Err(AuthError::Expired)
        ));
    }
}
