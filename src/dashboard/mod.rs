//! Dashboard core: keeps repository, job and stats state in sync with the
//! agent backend and derives what the views show.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────────┐  list/connect/trigger  ┌─────────────────────────────────┐
//! │ Agent backend│ <───────────────────── │ client.rs  (RemoteService trait, │
//! │  (HTTP API)  │ ─────────────────────> │            HttpService)          │
//! └──────────────┘                        └───────────────┬─────────────────┘
//!                                                         │
//!                   ┌─────────────────────────────────────┼──────────────────┐
//!                   │ session.rs (DashboardSession)        │                  │
//!                   │    ├─ poller.rs   (initial load + interval ticks)      │
//!                   │    ├─ actions.rs  (connect, trigger + deferred reload) │
//!                   │    └─ chat.rs     (local agent chat)                   │
//!                   │             │ whole-entity writes, ticketed            │
//!                   │             v                                          │
//!                   │    store.rs  (DashboardStore, StoreEvent broadcast)    │
//!                   └─────────────┬──────────────────────────────────────────┘
//!                                 │ StoreSnapshot (read-only)
//!                                 v
//!                   view.rs  (DashboardView, JobsView, JobDetail)
//!                      ├─ ui::render   (terminal)
//!                      └─ server.rs + ws.rs  (JSON + WebSocket)
//! ```
//!
//! ## Supporting Modules
//!
//! | Module      | Responsibility                                           |
//! |-------------|----------------------------------------------------------|
//! | `models`    | Wire types: `Repository`, `Job`, `DashboardStats`, chat  |
//! | `status`    | Status descriptors, formatters, analysis-phase states    |
//! | `aggregate` | Counts, success rate, filters, recent/running jobs       |
//! | `fake`      | Scripted `RemoteService` for tests                       |

pub mod actions;
pub mod aggregate;
pub mod chat;
pub mod client;
#[cfg(test)]
pub mod fake;
pub mod models;
pub mod poller;
pub mod server;
pub mod session;
pub mod status;
pub mod store;
pub mod view;
pub mod ws;
