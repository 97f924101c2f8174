//! keystone-db — the application root of Keystone.
//!
//! Maps logical database names to [`Database`] handles and supervises the
//! long-lived [`AsyncUtility`] tasks started from configuration.
//!
//! # Architecture
//!
//! Each database is a redb file (or in-memory backend) with one table of
//! JSON-encoded objects. Handlers reach the objects through a
//! [`TransactionManager`]'s [`Root`], either one scoped to the request or
//! the database's own lazily created manager.

pub mod app;
pub mod database;
pub mod error;
pub mod store;
pub mod tables;
pub mod transaction;
pub mod utility;

pub use app::ApplicationRoot;
pub use database::Database;
pub use error::{DbError, DbResult};
pub use store::ObjectStore;
pub use transaction::{ITEMS_PAGE_SIZE, Root, TransactionManager};
pub use utility::{AsyncUtility, UtilityFactory, UtilityFuture, UtilityRegistry};
