//! Input validation for the login use-cases.

use crate::error::{Error, Result};

const MIN_PHONE_DIGITS: usize = 10;
const MAX_PHONE_DIGITS: usize = 15;

/// Check a phone number given for pairing-code login.
///
/// The number must be in international form without the leading `+`
/// (e.g. `6281234567890`).
pub fn validate_login_with_code(phone: &str) -> Result<()> {
    if phone.trim().is_empty() {
        return Err(Error::Validation("phone number is required".into()));
    }
    if phone.starts_with('+') {
        return Err(Error::Validation(
            "phone number must not start with '+'".into(),
        ));
    }
    if !phone.chars().all(|c| c.is_ascii_digit()) {
        return Err(Error::Validation(
            "phone number must contain digits only".into(),
        ));
    }
    if !(MIN_PHONE_DIGITS..=MAX_PHONE_DIGITS).contains(&phone.len()) {
        return Err(Error::Validation(format!(
            "phone number must be {MIN_PHONE_DIGITS} to {MAX_PHONE_DIGITS} digits"
        )));
    }
    Ok(())
}
