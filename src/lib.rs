// Library root
// -----------
// This crate exposes a small library surface for the `ghauth` binary.
// `main.rs` parses flags and hands everything else to these modules.
//
// Module responsibilities:
// - `config`: Reads settings (API base URL, cache directory) from the
//   environment.
// - `cache`: Reads and writes the single plaintext token file.
// - `api`: Encapsulates HTTP interactions with the `/authorizations`
//   resource, including two-factor challenge detection.
// - `ui`: Terminal prompts and spinners.
// - `resolve`: The cache -> find -> create protocol that ties the others
//   together.
//
// `api` and `ui` sit behind traits (`AuthorizationStore`, `Prompter`) so the
// resolution protocol can be exercised without a terminal or a network.
pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod resolve;
pub mod ui;

pub use api::{authenticated_client, ApiClient, Credentials};
pub use config::Settings;
pub use error::{ApiError, AuthError};
pub use resolve::{Token, TokenResolver, TokenSource};
