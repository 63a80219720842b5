//! Screens and the auth guard in front of them.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Login,
    Register,
    Chat,
    Profile,
    NotFound,
}

/// What the guard decided for a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guarded {
    /// Show this route.
    Show(Route),
    /// The stored session is still being restored; show a spinner.
    Loading,
}

impl Route {
    /// Maps a path to a route. Unknown paths land on `NotFound`.
    pub fn parse(path: &str) -> Route {
        let trimmed = path.trim().trim_end_matches('/');
        match trimmed {
            "" => Route::Landing,
            "/login" => Route::Login,
            "/register" => Route::Register,
            "/chat" => Route::Chat,
            "/profile" => Route::Profile,
            _ => Route::NotFound,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Route::Landing => "/",
            Route::Login => "/login",
            Route::Register => "/register",
            Route::Chat => "/chat",
            Route::Profile => "/profile",
            Route::NotFound => "/404",
        }
    }

    pub fn requires_auth(self) -> bool {
        matches!(self, Route::Chat | Route::Profile)
    }

    pub fn title(self) -> &'static str {
        match self {
            Route::Landing => "Welcome",
            Route::Login => "Sign in",
            Route::Register => "Create account",
            Route::Chat => "Chat",
            Route::Profile => "Profile",
            Route::NotFound => "Not found",
        }
    }
}

/// Protected routes without a session redirect to `Login`, unless a stored
/// session is still being restored.
pub fn guard(route: Route, authenticated: bool, restoring: bool) -> Guarded {
    if !route.requires_auth() || authenticated {
        return Guarded::Show(route);
    }
    if restoring {
        Guarded::Loading
    } else {
        Guarded::Show(Route::Login)
    }
}
