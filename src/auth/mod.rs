//! Credential verification and the session/token lifecycle.

mod hasher;
mod reset;
mod session;
mod token;

pub use hasher::{HashError, HmacSha256Hasher, PasswordHasher};
pub use reset::{LogNotifier, ResetCodeNotifier, RESET_CODE_TTL_MINUTES};
pub use session::{AuthError, AuthService, ROTATION_THRESHOLD_DAYS};
pub use token::{days_until_expiry, RefreshToken, TokenCodec, TokenConfig, TokenError, Tokens};

#[cfg(test)]
pub(crate) use session::tests::test_codec;
