mod projects;

pub use projects::{ProjectService, TokenCreateRequest, TokenDeleteRequest, TokenResponse};
