//! Sign-in / sign-up form.

use crate::backend::SignUpProfile;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    SignIn,
    SignUp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthField {
    #[default]
    Email,
    Password,
    Username,
    FullName,
}

impl AuthField {
    fn fields(mode: AuthMode) -> &'static [AuthField] {
        match mode {
            AuthMode::SignIn => &[AuthField::Email, AuthField::Password],
            AuthMode::SignUp => &[
                AuthField::Email,
                AuthField::Password,
                AuthField::Username,
                AuthField::FullName,
            ],
        }
    }
}

/// A validated submission.
#[derive(Debug, Clone, PartialEq)]
pub enum Credentials {
    SignIn {
        email: String,
        password: String,
    },
    SignUp {
        email: String,
        password: String,
        profile: SignUpProfile,
    },
}

#[derive(Debug, Default)]
pub struct AuthForm {
    pub mode: AuthMode,
    pub email: String,
    pub password: String,
    pub username: String,
    pub full_name: String,
    pub focus: AuthField,
    submitting: bool,
}

impl AuthForm {
    pub fn is_submitting(&self) -> bool {
        self.submitting
    }

    pub fn set_mode(&mut self, mode: AuthMode) {
        if self.mode != mode {
            self.mode = mode;
            self.focus = AuthField::Email;
        }
    }

    pub fn cycle_focus(&mut self, forward: bool) {
        let fields = AuthField::fields(self.mode);
        let index = fields.iter().position(|f| *f == self.focus).unwrap_or(0);
        let next = if forward {
            (index + 1) % fields.len()
        } else {
            (index + fields.len() - 1) % fields.len()
        };
        self.focus = fields[next];
    }

    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
            AuthField::Username => &mut self.username,
            AuthField::FullName => &mut self.full_name,
        }
    }

    /// Checks the fields for the current mode. Sign-up requires a
    /// non-blank username; a blank full name is sent as none.
    pub fn validate(&self) -> Result<Credentials, &'static str> {
        let email = self.email.trim();
        if email.is_empty() || self.password.is_empty() {
            return Err("Email and password are required");
        }
        match self.mode {
            AuthMode::SignIn => Ok(Credentials::SignIn {
                email: email.to_string(),
                password: self.password.clone(),
            }),
            AuthMode::SignUp => {
                let username = self.username.trim();
                if username.is_empty() {
                    return Err("Username is required");
                }
                let full_name = self.full_name.trim();
                Ok(Credentials::SignUp {
                    email: email.to_string(),
                    password: self.password.clone(),
                    profile: SignUpProfile {
                        username: username.to_string(),
                        full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
                    },
                })
            }
        }
    }

    pub fn begin_submit(&mut self) -> Result<Credentials, &'static str> {
        if self.submitting {
            return Err("Already submitting");
        }
        let credentials = self.validate()?;
        self.submitting = true;
        Ok(credentials)
    }

    pub fn on_finished(&mut self, success: bool) {
        self.submitting = false;
        if success {
            self.password.clear();
        }
    }
}
