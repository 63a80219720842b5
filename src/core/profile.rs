//! Own-profile screen: fetched profile plus the edit form.

use crate::backend::{Profile, ProfileUpdate};

/// Which form field has focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProfileField {
    #[default]
    Username,
    FullName,
}

#[derive(Debug, Default)]
pub struct ProfileForm {
    profile: Option<Profile>,
    pub editing: bool,
    pub username: String,
    pub full_name: String,
    pub focus: ProfileField,
    saving: bool,
}

impl ProfileForm {
    pub fn profile(&self) -> Option<&Profile> {
        self.profile.as_ref()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn on_loaded(&mut self, profile: Profile) {
        if !self.editing {
            self.fill_from(&profile);
        }
        self.profile = Some(profile);
    }

    fn fill_from(&mut self, profile: &Profile) {
        self.username = profile.username.clone();
        self.full_name = profile.full_name.clone().unwrap_or_default();
    }

    pub fn begin_edit(&mut self) -> bool {
        if self.profile.is_none() {
            return false;
        }
        self.editing = true;
        self.focus = ProfileField::Username;
        true
    }

    /// Discards the edits and restores the fetched values.
    pub fn cancel(&mut self) {
        self.editing = false;
        if let Some(profile) = self.profile.clone() {
            self.fill_from(&profile);
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            ProfileField::Username => ProfileField::FullName,
            ProfileField::FullName => ProfileField::Username,
        };
    }

    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            ProfileField::Username => &mut self.username,
            ProfileField::FullName => &mut self.full_name,
        }
    }

    pub fn validate(&self) -> Result<ProfileUpdate, &'static str> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err("Username is required");
        }
        let full_name = self.full_name.trim();
        Ok(ProfileUpdate {
            username: username.to_string(),
            full_name: (!full_name.is_empty()).then(|| full_name.to_string()),
        })
    }

    /// Validates and marks the form as saving.
    pub fn begin_save(&mut self) -> Result<ProfileUpdate, &'static str> {
        if self.saving {
            return Err("Already saving");
        }
        let update = self.validate()?;
        self.saving = true;
        Ok(update)
    }

    pub fn on_saved(&mut self, update: ProfileUpdate) {
        self.saving = false;
        self.editing = false;
        if let Some(profile) = &mut self.profile {
            profile.username = update.username;
            profile.full_name = update.full_name;
        }
        if let Some(profile) = self.profile.clone() {
            self.fill_from(&profile);
        }
    }

    pub fn on_save_failed(&mut self) {
        self.saving = false;
    }
}

/// "Welcome, <name>!" for the chat header.
pub fn welcome_line(profile: Option<&Profile>) -> Option<String> {
    profile.map(|p| format!("Welcome, {}!", p.display_name()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            username: "ann".into(),
            full_name: Some("Ann Lee".into()),
            avatar_url: None,
            status: None,
        }
    }

    #[test]
    fn test_username_required() {
        let mut form = ProfileForm::default();
        form.on_loaded(profile());
        form.begin_edit();
        form.username = "  ".into();
        assert_eq!(form.begin_save(), Err("Username is required"));
        assert!(!form.is_saving());
    }

    #[test]
    fn test_blank_full_name_becomes_none() {
        let mut form = ProfileForm::default();
        form.on_loaded(profile());
        form.full_name = "   ".into();
        let update = form.validate().unwrap();
        assert_eq!(update.full_name, None);
        assert_eq!(update.username, "ann");
    }

    #[test]
    fn test_cancel_restores_fetched_values() {
        let mut form = ProfileForm::default();
        form.on_loaded(profile());
        form.begin_edit();
        form.username = "changed".into();
        form.cancel();
        assert_eq!(form.username, "ann");
        assert_eq!(form.full_name, "Ann Lee");
        assert!(!form.editing);
    }

    #[test]
    fn test_save_updates_profile() {
        let mut form = ProfileForm::default();
        form.on_loaded(profile());
        form.begin_edit();
        form.full_name = "Ann B. Lee".into();
        let update = form.begin_save().unwrap();
        form.on_saved(update);
        assert_eq!(form.profile().unwrap().display_name(), "Ann B. Lee");
        assert!(!form.editing);
    }

    #[test]
    fn test_welcome_line() {
        assert_eq!(welcome_line(Some(&profile())).as_deref(), Some("Welcome, Ann Lee!"));
        assert_eq!(welcome_line(None), None);
    }
}
