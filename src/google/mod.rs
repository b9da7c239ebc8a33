pub mod auth;
pub mod drive;
pub mod sheets;

pub use auth::{AccessTokenProvider, RefreshTokenSource, ServiceAccountTokenSource, StaticToken};
pub use drive::DriveClient;
pub use sheets::SheetsClient;
