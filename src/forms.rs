use std::collections::HashMap;
use std::hash::Hash;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::api::RegisterRequest;

pub const USERNAME_LENGTH_MESSAGE: &str = "Username must be at least 3 characters";
pub const EMAIL_MESSAGE: &str = "Please enter a valid email address";
pub const PASSWORD_LENGTH_MESSAGE: &str = "Password must be at least 8 characters";
pub const PASSWORD_MISMATCH_MESSAGE: &str = "Passwords don't match";

const MIN_USERNAME_CHARS: usize = 3;
const MIN_PASSWORD_CHARS: usize = 8;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9._%+'-]+@[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?)*\.[A-Za-z]{2,}$")
        .expect("valid email regex")
});

pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(value)
}

pub trait FormField: Copy + Eq + Hash + 'static {
    const ORDER: &'static [Self];

    fn title(self) -> &'static str;

    fn masked(self) -> bool {
        false
    }
}

pub type FieldErrors<F> = HashMap<F, String>;

#[derive(Debug, Clone)]
pub struct Form<F: FormField> {
    active: usize,
    values: HashMap<F, String>,
    errors: FieldErrors<F>,
    reveal: bool,
}

impl<F: FormField> Default for Form<F> {
    fn default() -> Self {
        Self {
            active: 0,
            values: HashMap::new(),
            errors: HashMap::new(),
            reveal: false,
        }
    }
}

impl<F: FormField> Form<F> {
    pub fn active(&self) -> F {
        F::ORDER[self.active.min(F::ORDER.len() - 1)]
    }

    pub fn focus(&mut self, field: F) {
        if let Some(idx) = F::ORDER.iter().position(|f| *f == field) {
            self.active = idx;
        }
    }

    pub fn next(&mut self) {
        self.active = (self.active + 1) % F::ORDER.len();
    }

    pub fn previous(&mut self) {
        self.active = (self.active + F::ORDER.len() - 1) % F::ORDER.len();
    }

    pub fn insert_char(&mut self, ch: char) {
        let field = self.active();
        self.values.entry(field).or_default().push(ch);
        self.errors.remove(&field);
    }

    pub fn backspace(&mut self) {
        let field = self.active();
        if let Some(value) = self.values.get_mut(&field) {
            value.pop();
        }
        self.errors.remove(&field);
    }

    pub fn clear_active(&mut self) {
        let field = self.active();
        self.values.remove(&field);
        self.errors.remove(&field);
    }

    pub fn set(&mut self, field: F, value: impl Into<String>) {
        self.values.insert(field, value.into());
    }

    pub fn value(&self, field: F) -> &str {
        self.values.get(&field).map(String::as_str).unwrap_or("")
    }

    pub fn display_value(&self, field: F) -> String {
        let raw = self.value(field);
        if field.masked() && !self.reveal {
            "•".repeat(raw.chars().count())
        } else {
            raw.to_string()
        }
    }

    pub fn toggle_reveal(&mut self) {
        self.reveal = !self.reveal;
    }

    pub fn revealed(&self) -> bool {
        self.reveal
    }

    pub fn error(&self, field: F) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn errors(&self) -> &FieldErrors<F> {
        &self.errors
    }

    /// Stores `errors` and focuses the first failing field. Returns true
    /// when there were none.
    fn apply_errors(&mut self, errors: FieldErrors<F>) -> bool {
        if let Some(first) = F::ORDER.iter().find(|f| errors.contains_key(f)) {
            self.focus(*first);
        }
        let ok = errors.is_empty();
        self.errors = errors;
        ok
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoginField {
    Username,
    Password,
}

impl FormField for LoginField {
    const ORDER: &'static [Self] = &[LoginField::Username, LoginField::Password];

    fn title(self) -> &'static str {
        match self {
            LoginField::Username => "Username",
            LoginField::Password => "Password",
        }
    }

    fn masked(self) -> bool {
        matches!(self, LoginField::Password)
    }
}

pub type LoginForm = Form<LoginField>;

impl Form<LoginField> {
    pub fn submit(&mut self) -> Option<(String, String)> {
        let username = self.value(LoginField::Username).trim().to_string();
        let password = self.value(LoginField::Password).to_string();
        let mut errors = HashMap::new();
        if username.is_empty() {
            errors.insert(LoginField::Username, "Username is required".to_string());
        }
        if password.is_empty() {
            errors.insert(LoginField::Password, "Password is required".to_string());
        }
        self.apply_errors(errors).then_some((username, password))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterField {
    Username,
    Email,
    FirstName,
    LastName,
    Password,
    ConfirmPassword,
}

impl FormField for RegisterField {
    const ORDER: &'static [Self] = &[
        RegisterField::Username,
        RegisterField::Email,
        RegisterField::FirstName,
        RegisterField::LastName,
        RegisterField::Password,
        RegisterField::ConfirmPassword,
    ];

    fn title(self) -> &'static str {
        match self {
            RegisterField::Username => "Username",
            RegisterField::Email => "Email",
            RegisterField::FirstName => "First name (optional)",
            RegisterField::LastName => "Last name (optional)",
            RegisterField::Password => "Password",
            RegisterField::ConfirmPassword => "Confirm password",
        }
    }

    fn masked(self) -> bool {
        matches!(
            self,
            RegisterField::Password | RegisterField::ConfirmPassword
        )
    }
}

pub type RegisterForm = Form<RegisterField>;

impl Form<RegisterField> {
    pub fn validate(&self) -> FieldErrors<RegisterField> {
        let mut errors = HashMap::new();
        if self.value(RegisterField::Username).chars().count() < MIN_USERNAME_CHARS {
            errors.insert(RegisterField::Username, USERNAME_LENGTH_MESSAGE.to_string());
        }
        if !is_valid_email(self.value(RegisterField::Email)) {
            errors.insert(RegisterField::Email, EMAIL_MESSAGE.to_string());
        }
        let password = self.value(RegisterField::Password);
        if password.chars().count() < MIN_PASSWORD_CHARS {
            errors.insert(RegisterField::Password, PASSWORD_LENGTH_MESSAGE.to_string());
        }
        // Confirmation is compared only once every field rule passes.
        if errors.is_empty() && password != self.value(RegisterField::ConfirmPassword) {
            errors.insert(
                RegisterField::ConfirmPassword,
                PASSWORD_MISMATCH_MESSAGE.to_string(),
            );
        }
        errors
    }

    pub fn submit(&mut self) -> Option<RegisterRequest> {
        let errors = self.validate();
        if !self.apply_errors(errors) {
            return None;
        }
        let optional = |field| {
            let value = self.value(field);
            (!value.is_empty()).then(|| value.to_string())
        };
        Some(RegisterRequest {
            username: self.value(RegisterField::Username).to_string(),
            email: self.value(RegisterField::Email).to_string(),
            password: self.value(RegisterField::Password).to_string(),
            first_name: optional(RegisterField::FirstName),
            last_name: optional(RegisterField::LastName),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ForgotField {
    Email,
}

impl FormField for ForgotField {
    const ORDER: &'static [Self] = &[ForgotField::Email];

    fn title(self) -> &'static str {
        "Email"
    }
}

#[derive(Debug, Clone, Default)]
pub struct ForgotPasswordForm {
    pub form: Form<ForgotField>,
    sent_to: Option<String>,
}

impl ForgotPasswordForm {
    pub fn submit(&mut self) -> bool {
        let email = self.form.value(ForgotField::Email).to_string();
        let mut errors = HashMap::new();
        if !is_valid_email(&email) {
            errors.insert(ForgotField::Email, EMAIL_MESSAGE.to_string());
        }
        if self.form.apply_errors(errors) {
            self.sent_to = Some(email);
            true
        } else {
            false
        }
    }

    pub fn sent_to(&self) -> Option<&str> {
        self.sent_to.as_deref()
    }

    pub fn reset(&mut self) {
        self.form.reset();
        self.sent_to = None;
    }
}
