/*!
 * SQLite checkpointing of pipeline runs.
 *
 * - Stage outputs keyed by run id, so an interrupted run can resume
 * - Durable completion cache shared across runs
 */

pub mod connection;
pub mod models;
pub mod repository;
pub mod schema;

pub use connection::DatabaseConnection;
pub use models::{RunRecord, Stage, StageRow};
pub use repository::Repository;
