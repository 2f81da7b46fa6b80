use sha2::{Digest, Sha256};

/// Hash a passphrase using SHA-256.
pub fn hash_password(plain: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(plain.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Verify if a passphrase matches a hash.
pub fn verify_password(plain: &str, hash: &str) -> bool {
    hash_password(plain) == hash
}

#[derive(Debug, Clone)]
pub struct AdminRecord {
    pub admin_id: i64,
    pub password_hash: String,
}

/// Admin identities known to the bridge, provisioned once at startup.
/// Only hashes are retained; login verification goes against the first
/// (lowest-id) admin.
#[derive(Debug, Clone, Default)]
pub struct AdminDirectory {
    admins: Vec<AdminRecord>,
}

impl AdminDirectory {
    pub fn new(mut admins: Vec<AdminRecord>) -> Self {
        admins.sort_by_key(|a| a.admin_id);
        Self { admins }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Directory with a single admin whose passphrase is hashed immediately.
    pub fn single(admin_id: i64, password: &str) -> Self {
        Self::new(vec![AdminRecord {
            admin_id,
            password_hash: hash_password(password),
        }])
    }

    /// True when `plain` matches the first admin's stored hash. False when
    /// no admin exists or the stored hash is empty.
    pub fn verify_password(&self, plain: &str) -> bool {
        match self.admins.first() {
            Some(admin) if !admin.password_hash.is_empty() => {
                verify_password(plain, &admin.password_hash)
            }
            _ => false,
        }
    }

    pub fn first_admin_id(&self) -> Option<i64> {
        self.admins.first().map(|a| a.admin_id)
    }

    pub fn count(&self) -> usize {
        self.admins.len()
    }
}
