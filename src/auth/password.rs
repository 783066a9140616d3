use anyhow::{anyhow, Result};
use argon2::password_hash::rand_core::{OsRng, RngCore};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};

/// Minimum length accepted by [`check_password_policy`].
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Length of passwords handed out by `add-user` when none is given.
pub const TEMPORARY_PASSWORD_LENGTH: usize = 14;

/// Argon2id work factors stored inside every PHC hash string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashCost {
    /// Memory in KiB.
    pub memory_kib: u32,
    pub iterations: u32,
    pub lanes: u32,
}

impl HashCost {
    /// 19 MiB, two passes, one lane.
    pub const STANDARD: HashCost = HashCost {
        memory_kib: 19456,
        iterations: 2,
        lanes: 1,
    };

    fn hasher(&self) -> Result<Argon2<'static>> {
        let params = Params::new(self.memory_kib, self.iterations, self.lanes, None)
            .map_err(|e| anyhow!("invalid argon2 params: {}", e))?;
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
    }

    pub fn hash(&self, password: &str) -> Result<String> {
        let salt = SaltString::generate(&mut OsRng);
        let phc = self
            .hasher()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!("failed to hash password: {}", e))?;
        Ok(phc.to_string())
    }
}

/// Hash with explicit work factors. Tests use tiny values to stay fast.
pub fn hash_password_with_params(
    password: &str,
    memory_cost: u32,
    time_cost: u32,
    parallelism: u32,
) -> Result<String> {
    HashCost {
        memory_kib: memory_cost,
        iterations: time_cost,
        lanes: parallelism,
    }
    .hash(password)
}

pub fn hash_password(password: &str) -> Result<String> {
    HashCost::STANDARD.hash(password)
}

/// Check a login attempt against a stored hash. The work factors come from
/// the hash itself, so accounts created with any [`HashCost`] verify.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!(error = %e, "Stored password hash is unreadable");
            false
        }
    }
}

/// Rule broken by a candidate password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PolicyViolation {
    #[error("password must be at least 8 characters long")]
    TooShort,
    #[error("password must contain at least one letter")]
    NoLetter,
    #[error("password must contain at least one digit")]
    NoDigit,
}

/// Rules listed on the change-password screen: at least
/// [`MIN_PASSWORD_LENGTH`] characters with a letter and a digit.
pub fn check_password_policy(password: &str) -> Result<(), PolicyViolation> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        Err(PolicyViolation::TooShort)
    } else if !password.chars().any(char::is_alphabetic) {
        Err(PolicyViolation::NoLetter)
    } else if !password.chars().any(|c| c.is_ascii_digit()) {
        Err(PolicyViolation::NoDigit)
    } else {
        Ok(())
    }
}

const TEMPORARY_ALPHABET: &[u8] = b"abcdefghijkmnpqrstuvwxyzABCDEFGHJKLMNPQRSTUVWXYZ23456789";

fn random_index(bound: usize) -> usize {
    let bound = bound as u32;
    let zone = u32::MAX - u32::MAX % bound;
    loop {
        let v = OsRng.next_u32();
        if v < zone {
            return (v % bound) as usize;
        }
    }
}

/// Random password for a new account. Look-alike characters (0/O, 1/l/I)
/// are left out since it is read off a console and typed back in.
/// Always satisfies [`check_password_policy`] for lengths of at least
/// [`MIN_PASSWORD_LENGTH`].
pub fn generate_temporary_password(length: usize) -> String {
    loop {
        let candidate: String = (0..length)
            .map(|_| TEMPORARY_ALPHABET[random_index(TEMPORARY_ALPHABET.len())] as char)
            .collect();
        if length < MIN_PASSWORD_LENGTH || check_password_policy(&candidate).is_ok() {
            return candidate;
        }
    }
}

/// `invterm hash-password`: print a hash suitable for
/// `bootstrap.admin_password_hash`.
pub fn hash_password_cli(password: Option<&str>) -> Result<()> {
    let password = match password {
        Some(p) => p.to_string(),
        None => {
            eprintln!("Enter password: ");
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    check_password_policy(&password)?;
    println!("{}", hash_password(&password)?);
    Ok(())
}
