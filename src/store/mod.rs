//! Task store client — the remote system of record for task state.

pub mod credentials;
pub mod http;
pub mod traits;

pub use credentials::{Auth0Config, Auth0TokenSource, CredentialHolder, StaticToken, TokenSource};
pub use http::HttpTaskStore;
pub use traits::TaskStore;
