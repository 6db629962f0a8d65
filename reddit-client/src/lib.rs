pub mod api;
pub mod auth;

pub use api::RedditApiClient;
pub use auth::RedditAuth;
