/// Account registration, login and bearer-token sessions.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::{BookingError, BookingResult};
use crate::models::{Account, Language, LoginRequest, Principal, ProfileUpdate, RegisterRequest, Role, Session};
use crate::store::Store;

const BAD_CREDENTIALS: &str = "Invalid username or password";

pub struct IdentityService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    token_ttl: Duration,
    bcrypt_cost: u32,
}

/// A fresh session together with the account it belongs to.
#[derive(Debug, Clone)]
pub struct SignedIn {
    pub session: Session,
    pub account: Account,
}

impl IdentityService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, token_ttl_minutes: i64, bcrypt_cost: u32) -> Self {
        IdentityService {
            store,
            clock,
            token_ttl: Duration::minutes(token_ttl_minutes),
            bcrypt_cost,
        }
    }

    /// Register a patient account and sign it in.
    pub fn register(&self, request: RegisterRequest) -> BookingResult<SignedIn> {
        let account = self.create_account(request, Role::Patient)?;
        info!("Registered patient account {} ({})", account.username, account.id);
        self.start_session(account)
    }

    /// Create an account with an explicit role. Used for seeding admins.
    pub fn create_account(&self, request: RegisterRequest, role: Role) -> BookingResult<Account> {
        let username = request.username.trim();
        if username.len() < 3 {
            return Err(BookingError::validation(
                "Username must be at least 3 characters",
            ));
        }
        if request.password.len() < 6 {
            return Err(BookingError::validation(
                "Password must be at least 6 characters",
            ));
        }
        if request.full_name.trim().is_empty() {
            return Err(BookingError::validation("Full name cannot be empty"));
        }

        let account = Account {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash: bcrypt::hash(&request.password, self.bcrypt_cost)?,
            role,
            full_name: request.full_name.trim().to_string(),
            phone: request.phone.trim().to_string(),
            email: request.email.trim().to_string(),
            language_preference: request.language_preference,
            created_at: self.clock.now(),
        };
        self.store.insert_account(account.clone())?;
        Ok(account)
    }

    pub fn login(&self, request: LoginRequest) -> BookingResult<SignedIn> {
        let account = match self.store.account_by_username(&request.username)? {
            Some(account) => account,
            None => {
                warn!("Login failed for unknown username {}", request.username);
                return Err(BookingError::unauthorized(BAD_CREDENTIALS));
            }
        };

        if !bcrypt::verify(&request.password, &account.password_hash)? {
            warn!("Login failed for {}: wrong password", account.username);
            return Err(BookingError::unauthorized(BAD_CREDENTIALS));
        }

        info!("{} signed in as {}", account.username, account.role.name());
        self.start_session(account)
    }

    fn start_session(&self, account: Account) -> BookingResult<SignedIn> {
        let now = self.clock.now();
        let purged = self.store.purge_expired_sessions(now)?;
        if purged > 0 {
            debug!("Purged {} expired sessions", purged);
        }

        let session = Session {
            token: new_token(),
            account_id: account.id,
            expires_at: now + self.token_ttl,
        };
        self.store.insert_session(session.clone())?;
        Ok(SignedIn { session, account })
    }

    /// Resolve a bearer token to the caller. Expired sessions are dropped.
    pub fn authenticate(&self, token: &str) -> BookingResult<Principal> {
        let session = self
            .store
            .session(token)?
            .ok_or_else(|| BookingError::unauthorized("Invalid or expired token"))?;

        if self.clock.now() >= session.expires_at {
            self.store.remove_session(token)?;
            return Err(BookingError::unauthorized("Invalid or expired token"));
        }

        let account = self
            .store
            .account(session.account_id)?
            .ok_or_else(|| BookingError::unauthorized("Account no longer exists"))?;

        Ok(Principal {
            account_id: account.id,
            role: account.role,
            full_name: account.full_name,
        })
    }

    pub fn logout(&self, token: &str) -> BookingResult<()> {
        self.store.remove_session(token)?;
        Ok(())
    }

    pub fn account(&self, principal: &Principal) -> BookingResult<Account> {
        self.store
            .account(principal.account_id)?
            .ok_or_else(|| BookingError::not_found("Account not found"))
    }

    pub fn update_profile(&self, principal: &Principal, changes: ProfileUpdate) -> BookingResult<Account> {
        let mut account = self.account(principal)?;

        if let Some(full_name) = changes.full_name {
            if full_name.trim().is_empty() {
                return Err(BookingError::validation("Full name cannot be empty"));
            }
            account.full_name = full_name.trim().to_string();
        }
        if let Some(phone) = changes.phone {
            account.phone = phone.trim().to_string();
        }
        if let Some(email) = changes.email {
            account.email = email.trim().to_string();
        }
        if let Some(language) = changes.language_preference {
            account.language_preference = language;
        }

        self.store.update_account(account.clone())?;
        Ok(account)
    }

    pub fn ensure_account(&self, username: &str, password: &str, full_name: &str, role: Role) -> BookingResult<Account> {
        if let Some(existing) = self.store.account_by_username(username)? {
            return Ok(existing);
        }
        self.create_account(
            RegisterRequest {
                username: username.to_string(),
                password: password.to_string(),
                full_name: full_name.to_string(),
                phone: String::new(),
                email: String::new(),
                language_preference: Language::En,
            },
            role,
        )
    }
}

/// 256 random bits from two v4 UUIDs.
fn new_token() -> String {
    format!("{}{}", Uuid::new_v4().simple(), Uuid::new_v4().simple())
}
