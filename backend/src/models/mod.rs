pub mod auth;
pub mod todo;
pub mod user;

pub use auth::{AppleCallbackRequest, AppleLoginUrl, AppleUserInfo, LoginResponse, TokenRefreshRequest};
pub use todo::{NewTodoRequest, Priority, Todo, TodoQuery, UpdateTodoRequest};
pub use user::{LoginRequest, NewUserRequest, User, UserResponse, PROVIDER_APPLE, PROVIDER_EMAIL};
