pub mod config;
pub mod coordinator;
pub mod error;
pub mod local;
pub mod record;
pub mod remote;
pub mod store;
pub mod sync;

pub use coordinator::{Mode, TodoCoordinator};
pub use error::{ClientError, RemoteError, StorageError};
pub use local::LocalTodoService;
pub use record::{LocalTodo, Priority, TodoRecord};
pub use sync::{ConflictPolicy, SyncEngine, SyncOutcome, SyncReport};
