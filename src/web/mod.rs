//! Web front-end and API proxy.
//!
//! ```text
//! ┌──────────┐  POST /api/run      ┌──────────────┐  POST /run        ┌──────────┐
//! │ Browser  │ ──────────────────> │  api.rs      │ ────────────────> │ Analysis │
//! │ (page)   │  GET /api/logs/{id} │  (proxy)     │  GET /logs/{id}   │ backend  │
//! │          │ <══ event-stream ══ │              │ <══ event-stream  │          │
//! └──────────┘                     └──────────────┘                   └──────────┘
//! ```
//!
//! | Module     | Responsibility                                        |
//! |------------|-------------------------------------------------------|
//! | `api`      | Route handlers, `AppState`, `ApiError`                |
//! | `server`   | Router assembly, static page serving, `start_server`  |
//! | `embedded` | `ui/` compiled into the binary (`rust-embed`)         |
//!
//! The page itself keeps all run state in the browser; the server never
//! inspects run submissions or log bytes.

pub mod api;
pub mod embedded;
pub mod server;
