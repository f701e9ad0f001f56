pub mod ip;
pub mod url_validator;

/// Generate a random alphanumeric token of the given length.
///
/// Tokens are minted once per (email, recipient) or (link, recipient) pair
/// and used as the sole lookup key on the public tracking endpoints; at the
/// default length of 32 the collision probability is negligible and the
/// unique database constraints catch the rest.
pub fn generate_token(length: usize) -> String {
    use std::iter;

    let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

    iter::repeat_with(|| chars[rand::random_range(0..chars.len())] as char)
        .take(length)
        .collect()
}
