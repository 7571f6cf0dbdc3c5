//! Random password generation for ephemeral test accounts.
//!
//! Passwords are 32 characters drawn uniformly from ASCII letters,
//! punctuation and digits, using the thread-local CSPRNG.
//!
//! # Example
//!
//! ```
//! use tokenserver_e2e_crypto::password::{PASSWORD_LENGTH, generate_password};
//!
//! let password = generate_password();
//! assert_eq!(password.chars().count(), PASSWORD_LENGTH);
//! ```

use rand::Rng;

/// Number of characters in a generated password.
pub const PASSWORD_LENGTH: usize = 32;

/// Alphabet passwords are drawn from: letters, then punctuation, then digits.
pub const PASSWORD_CHARACTERS: &str = concat!(
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ",
    "!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~",
    "0123456789",
);

/// Generates a new random password of [`PASSWORD_LENGTH`] characters.
pub fn generate_password() -> String {
    generate_password_with(&mut rand::thread_rng())
}

/// Generates a password from the supplied RNG.
pub fn generate_password_with<R: Rng>(rng: &mut R) -> String {
    let alphabet = PASSWORD_CHARACTERS.as_bytes();
    (0..PASSWORD_LENGTH)
        .map(|_| alphabet[rng.gen_range(0..alphabet.len())] as char)
        .collect()
}
