pub mod auth_service;
pub mod oauth_state;
pub mod scheduler;
pub mod todo_service;

pub use auth_service::AuthService;
pub use oauth_state::OAuthStateStore;
pub use scheduler::OAuthStateSweeper;
pub use todo_service::TodoService;
