pub mod apple;
pub mod extractor;
pub mod password;
pub mod token;

pub use apple::{AppleHttpClient, AppleIdentityProvider, NoopAppleProvider};
pub use extractor::AuthUser;
pub use token::{Claims, TokenIssuer, TokenType};
