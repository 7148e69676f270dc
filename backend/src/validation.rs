//! Request validation. Each validator collects every failing field instead of
//! stopping at the first one, so clients can highlight all of them at once.

use serde::Serialize;

use crate::error::AppError;
use crate::models::{NewTodoRequest, NewUserRequest, UpdateTodoRequest};

pub const TITLE_MAX: usize = 255;
pub const DESCRIPTION_MAX: usize = 1000;
pub const PASSWORD_MIN: usize = 6;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Default)]
struct Errors(Vec<FieldError>);

impl Errors {
    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    fn check_title(&mut self, title: &str) {
        let len = title.trim().chars().count();
        if len == 0 {
            self.push("title", "title is required");
        } else if len > TITLE_MAX {
            self.push("title", format!("title must be at most {} characters long", TITLE_MAX));
        }
    }

    fn check_description(&mut self, description: &str) {
        if description.chars().count() > DESCRIPTION_MAX {
            self.push(
                "description",
                format!("description must be at most {} characters long", DESCRIPTION_MAX),
            );
        }
    }

    fn finish(self) -> Result<(), AppError> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(AppError::Validation(self.0))
        }
    }
}

pub fn validate_new_todo(req: &NewTodoRequest) -> Result<(), AppError> {
    let mut errors = Errors::default();
    errors.check_title(&req.title);
    errors.check_description(&req.description);
    errors.finish()
}

pub fn validate_update_todo(req: &UpdateTodoRequest) -> Result<(), AppError> {
    let mut errors = Errors::default();
    if let Some(title) = &req.title {
        errors.check_title(title);
    }
    if let Some(description) = &req.description {
        errors.check_description(description);
    }
    errors.finish()
}

pub fn validate_new_user(req: &NewUserRequest) -> Result<(), AppError> {
    let mut errors = Errors::default();
    if req.email.trim().is_empty() {
        errors.push("email", "email is required");
    } else if !is_valid_email(&req.email) {
        errors.push("email", "email must be a valid email address");
    }
    if req.password.chars().count() < PASSWORD_MIN {
        errors.push(
            "password",
            format!("password must be at least {} characters long", PASSWORD_MIN),
        );
    }
    if req.name.trim().is_empty() {
        errors.push("name", "name is required");
    }
    errors.finish()
}

/// Deliberately loose: one `@`, a non-empty local part and a dotted domain.
pub fn is_valid_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !email.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, tld)| !host.is_empty() && !tld.is_empty() && !tld.ends_with('.'))
}
