//! Operation declarations
//!
//! Protected operations declare their requirements with the
//! [`protected`](tollgate_macros::protected) attribute, which submits an
//! [`OperationDeclaration`] to a link-time registry. The scanner walks that
//! registry to discover the permission catalog the code expects.
//!
//! ```ignore
//! #[protected(controller = "users", permission = "users.delete", role = "admin")]
//! async fn remove_user(/* ... */) { /* ... */ }
//!
//! // expands to a `REMOVE_USER_ACCESS` constant plus an inventory submission
//! ```

pub mod registry;
pub mod scanner;

pub use registry::{DeclarationLocation, DeclarationRegistry, OperationDeclaration};
pub use scanner::{DeclarationScanner, ScanResult};
