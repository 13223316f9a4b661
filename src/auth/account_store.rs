//! Account Storage
//! Mission: Own account records and keep usernames unique

use crate::auth::models::{Account, NewAccount, Role};
use crate::auth::password::PasswordHasher;
use crate::error::ServiceError;
use crate::storage::{SnapshotBackend, SnapshotStore};
use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Account storage over a snapshot collection
pub struct AccountStore {
    accounts: SnapshotStore<Account>,
    hasher: Arc<dyn PasswordHasher>,
}

impl AccountStore {
    pub fn open(
        backend: Box<dyn SnapshotBackend<Account>>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, ServiceError> {
        Ok(Self {
            accounts: SnapshotStore::open("accounts", backend)?,
            hasher,
        })
    }

    /// Create a new account.
    ///
    /// The password is hashed before the collection is locked; the uniqueness
    /// check and the insert happen in the same transaction.
    pub fn register(&self, new_account: NewAccount) -> Result<Account, ServiceError> {
        if self.find_by_username(new_account.username()).is_some() {
            return Err(username_taken());
        }

        let account = Account {
            id: Uuid::new_v4(),
            username: new_account.username().to_string(),
            password_hash: self.hasher.hash(new_account.password())?,
            role: new_account.role(),
            created_at: Utc::now(),
        };

        self.accounts.transact(|txn| {
            if txn.records().iter().any(|a| a.username == account.username) {
                return Err(username_taken());
            }
            txn.records_mut().push(account.clone());
            Ok(())
        })?;

        info!(
            "✅ Registered account: {} ({})",
            account.username,
            account.role.as_str()
        );

        Ok(account)
    }

    /// Get account by username (case-sensitive)
    pub fn find_by_username(&self, username: &str) -> Option<Account> {
        self.accounts
            .read(|accounts| accounts.iter().find(|a| a.username == username).cloned())
    }

    pub fn find_by_id(&self, id: &Uuid) -> Option<Account> {
        self.accounts
            .read(|accounts| accounts.iter().find(|a| &a.id == id).cloned())
    }

    pub fn has_admin(&self) -> bool {
        self.accounts
            .read(|accounts| accounts.iter().any(|a| a.role == Role::Admin))
    }

    pub fn count(&self) -> usize {
        self.accounts.len()
    }

    /// Create the initial admin account when the store holds none.
    ///
    /// Returns the created account, or `None` when an admin already exists.
    pub fn ensure_admin(&self, username: &str, password: &str) -> Result<Option<Account>, ServiceError> {
        if self.has_admin() {
            return Ok(None);
        }

        match self.register(NewAccount::new(username, password, Role::Admin)?) {
            Ok(account) => {
                info!("🔐 Bootstrap admin created: {}", account.username);
                Ok(Some(account))
            }
            Err(ServiceError::Conflict(_)) => {
                warn!(
                    "⚠️  Bootstrap admin '{}' skipped: username already taken by a non-admin account",
                    username
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

fn username_taken() -> ServiceError {
    ServiceError::Conflict("username already exists".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::BcryptHasher;
    use crate::storage::{JsonFileBackend, MemoryBackend};
    use std::sync::Barrier;
    use std::thread;
    use tempfile::TempDir;

    fn hasher() -> Arc<dyn PasswordHasher> {
        Arc::new(BcryptHasher::new(4).unwrap())
    }

    fn create_test_store() -> AccountStore {
        AccountStore::open(Box::new(MemoryBackend::<Account>::new()), hasher()).unwrap()
    }

    fn new_account(username: &str, role: Role) -> NewAccount {
        NewAccount::new(username, "password123", role).unwrap()
    }

    #[test]
    fn test_register_and_find() {
        let store = create_test_store();

        let created = store.register(new_account("shopper1", Role::Normal)).unwrap();
        assert_eq!(created.username, "shopper1");
        assert_eq!(created.role, Role::Normal);

        let found = store.find_by_username("shopper1").unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(store.find_by_id(&created.id).unwrap().username, "shopper1");
    }

    #[test]
    fn test_raw_password_not_stored() {
        let store = create_test_store();
        let hasher = BcryptHasher::new(4).unwrap();

        let account = store.register(new_account("alice", Role::Admin)).unwrap();

        assert_ne!(account.password_hash, "password123");
        assert!(!account.password_hash.contains("password123"));
        assert!(hasher.verify("password123", &account.password_hash));
    }

    #[test]
    fn test_duplicate_username_conflicts() {
        let store = create_test_store();

        store.register(new_account("alice", Role::Normal)).unwrap();
        let second = store.register(new_account("alice", Role::Admin));

        assert!(matches!(second, Err(ServiceError::Conflict(_))));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_usernames_are_case_sensitive() {
        let store = create_test_store();

        store.register(new_account("alice", Role::Normal)).unwrap();
        store.register(new_account("Alice", Role::Normal)).unwrap();

        assert!(store.find_by_username("ALICE").is_none());
        assert_eq!(store.count(), 2);
    }

    #[test]
    fn test_concurrent_registration_single_winner() {
        for round in 0..5 {
            let store = Arc::new(create_test_store());
            let contenders = 8;
            let barrier = Arc::new(Barrier::new(contenders));
            let username = format!("racer{}", round);

            let handles: Vec<_> = (0..contenders)
                .map(|_| {
                    let store = store.clone();
                    let barrier = barrier.clone();
                    let username = username.clone();
                    thread::spawn(move || {
                        barrier.wait();
                        store.register(new_account(&username, Role::Normal))
                    })
                })
                .collect();

            let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
            let winners = results.iter().filter(|r| r.is_ok()).count();
            let conflicts = results
                .iter()
                .filter(|r| matches!(r, Err(ServiceError::Conflict(_))))
                .count();

            assert_eq!(winners, 1);
            assert_eq!(conflicts, contenders - 1);
            assert_eq!(store.count(), 1);
        }
    }

    #[test]
    fn test_accounts_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("accounts.json");

        let id = {
            let store = AccountStore::open(Box::new(JsonFileBackend::<Account>::new(&path)), hasher()).unwrap();
            store.register(new_account("persisted", Role::Admin)).unwrap().id
        };

        let reopened = AccountStore::open(Box::new(JsonFileBackend::<Account>::new(&path)), hasher()).unwrap();
        let account = reopened.find_by_username("persisted").unwrap();
        assert_eq!(account.id, id);
        assert_eq!(account.role, Role::Admin);

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(!on_disk.contains("password123"));
    }

    #[test]
    fn test_ensure_admin_only_when_missing() {
        let store = create_test_store();

        let created = store.ensure_admin("root", "bootstrap-pass").unwrap();
        assert!(created.is_some());
        assert!(store.has_admin());

        let again = store.ensure_admin("root2", "bootstrap-pass").unwrap();
        assert!(again.is_none());
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_ensure_admin_skips_taken_username() {
        let store = create_test_store();
        store.register(new_account("root", Role::Normal)).unwrap();

        let created = store.ensure_admin("root", "bootstrap-pass").unwrap();
        assert!(created.is_none());
        assert!(!store.has_admin());
    }
}
