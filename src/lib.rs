//! Tollgate
//!
//! A dynamic role-based access control engine: operations declare the roles
//! and permissions they require, declarations are discovered at startup and
//! synchronized into the permission store, and configured rules grant new
//! permissions to roles automatically.
//!
//! ## Features
//!
//! - **Wildcard permissions** - `users.*`, `*.read` and `*` grants
//! - **Declarative guards** - `#[protected(controller = "users", permission = "users.read")]` on handlers
//! - **Permission sync** - discovered slugs are created in the store exactly once
//! - **Auto-assignment** - newly created permissions flow to roles by pattern
//! - **Admin API** - role and permission CRUD over HTTP
//!
//! ## Authorization Model
//!
//! ```text
//! declared roles        → principal must hold ANY of them
//! declared permissions  → principal must hold ALL of them (wildcards expand)
//! nothing declared      → allowed
//! ```
//!
//! ## Example Configuration
//!
//! ```toml
//! [server]
//! port = 3000
//! environment = "development"     # sync runs on startup unless disabled
//!
//! [database]
//! url = "sqlite://tollgate.db"
//!
//! [auto_assign]
//! admin = ["*"]
//! viewer = ["*.read"]
//!
//! [seed.roles.admin]
//! description = "Full access"
//!
//! [[auth.tokens]]
//! token = "change-me"
//! user_id = "1"
//! username = "root"
//! roles = ["admin"]
//! ```

pub mod access_control;
pub mod admin;
pub mod auth;
pub mod config;
pub mod declarations;
pub mod error;
pub mod seed;
pub mod server;
pub mod store;
pub mod sync;
pub mod util;

// Re-export main types
pub use access_control::{AccessDecision, Principal};
pub use config::{AppConfig, load_config};
pub use declarations::{DeclarationRegistry, OperationDeclaration};
pub use server::{AppState, build_router};
pub use store::{AccessStore, MemoryStore, SqliteStore};
pub use sync::{PermissionSync, SyncReport};
