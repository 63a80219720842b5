//! Frame layout: title bar on top, then whatever screen the route guard
//! picked. The chat screen splits into sidebar, thread + composer, and the
//! optional copilot panel, with the emoji and user search overlays on top.

use chrono::Utc;
use ratatui::Frame;
use ratatui::layout::{Constraint, Layout, Rect};

use crate::core::profile::welcome_line;
use crate::core::route::{Guarded, Route};
use crate::core::state::App;
use crate::tui::component::Component;
use crate::tui::components::{
    AuthScreen, ConversationSidebar, CopilotView, EmojiGrid, LandingPage, LoadingScreen,
    MessageList, NotFoundScreen, ProfileScreen, TitleBar, UserSearchDialog, centered_rect,
};
use crate::tui::{Pane, TuiState};

const SIDEBAR_WIDTH: u16 = 32;

pub fn draw_ui(frame: &mut Frame, app: &App, tui: &mut TuiState) {
    use Constraint::{Length, Min};
    let [title_area, main_area] = Layout::vertical([Length(1), Min(0)]).areas(frame.area());

    let screen = app.screen();
    let screen_name = match screen {
        Guarded::Loading => "Loading",
        Guarded::Show(route) => route.title(),
    };
    let welcome = welcome_line(app.me()).or_else(|| {
        (!app.status_message.is_empty()).then(|| app.status_message.clone())
    });
    let toast = app.toasts.latest().map(|toast| toast.notice.clone());
    TitleBar::new(screen_name, welcome, toast).render(frame, title_area);

    match screen {
        Guarded::Loading => LoadingScreen {
            frame_index: tui.spinner_frame,
        }
        .render(frame, main_area),
        Guarded::Show(Route::Landing) => LandingPage.render(frame, main_area),
        Guarded::Show(Route::Login | Route::Register) => {
            AuthScreen::new(&app.auth_form).render(frame, main_area)
        }
        Guarded::Show(Route::Profile) => {
            let email = app.session.as_ref().and_then(|s| s.user.email.as_deref());
            ProfileScreen::new(&app.profile, email).render(frame, main_area)
        }
        Guarded::Show(Route::NotFound) => NotFoundScreen.render(frame, main_area),
        Guarded::Show(Route::Chat) => draw_chat(frame, main_area, app, tui),
    }
}

fn draw_chat(frame: &mut Frame, area: Rect, app: &App, tui: &mut TuiState) {
    use Constraint::{Length, Min, Percentage};

    let [sidebar_area, center_area, copilot_area] = if app.copilot.open {
        Layout::horizontal([Length(SIDEBAR_WIDTH), Min(0), Percentage(35)]).areas(area)
    } else {
        Layout::horizontal([Length(SIDEBAR_WIDTH), Min(0), Length(0)]).areas(area)
    };

    ConversationSidebar::new(
        &app.conversations,
        tui.focus == Pane::Conversations,
        Utc::now(),
    )
    .render(frame, sidebar_area);

    let composer_height = tui.input_box.calculate_height(center_area.width);
    let [thread_area, composer_area] =
        Layout::vertical([Min(0), Length(composer_height)]).areas(center_area);

    let conversation = app.thread.conversation_id().map(|id| {
        app.conversations
            .get(id)
            .map(|summary| summary.display_name())
            .unwrap_or("Conversation")
    });
    MessageList {
        state: &mut tui.message_list,
        messages: app.thread.messages(),
        status: app.thread.status(),
        conversation,
        me: app.user_id(),
        editing: app.composer.editing(),
        focused: tui.focus == Pane::Thread,
    }
    .render(frame, thread_area);

    tui.input_box.render(frame, composer_area);

    if app.copilot.open {
        CopilotView::new(
            &app.copilot,
            app.selection.as_deref(),
            tui.focus == Pane::Copilot,
        )
        .render(frame, copilot_area);
    }

    if app.emoji.open {
        let (width, height) = EmojiGrid::size();
        let width = width.min(center_area.width);
        let height = height.min(composer_area.y.saturating_sub(center_area.y));
        let popup = Rect {
            x: composer_area.right().saturating_sub(width),
            y: composer_area.y.saturating_sub(height),
            width,
            height,
        };
        EmojiGrid::new(&app.emoji).render(frame, popup);
    }

    if app.user_search.open {
        UserSearchDialog::new(&app.user_search).render(frame, centered_rect(60, 50, area));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{ConversationSummary, Message};
    use crate::core::action::{Action, update};
    use crate::test_support::{test_app, test_profile, test_session};
    use ratatui::Terminal;
    use ratatui::backend::TestBackend;
    use uuid::Uuid;

    fn rendered(app: &App, tui: &mut TuiState) -> String {
        let backend = TestBackend::new(120, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|f| draw_ui(f, app, tui)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|c| c.symbol())
            .collect::<String>()
    }

    fn signed_in_app() -> App {
        let mut app = test_app();
        let session = test_session();
        let me = session.user.id;
        app.session = Some(session);
        app.profile.on_loaded(test_profile(me, "ann"));
        app
    }

    #[test]
    fn test_guard_shows_login_without_session() {
        let app = test_app();
        let text = rendered(&app, &mut TuiState::new());
        assert!(text.contains("Sign in"));
    }

    #[test]
    fn test_restoring_shows_spinner() {
        let mut app = test_app();
        app.restoring = true;
        let text = rendered(&app, &mut TuiState::new());
        assert!(text.contains("Restoring your session"));
    }

    #[test]
    fn test_chat_layout_with_open_conversation() {
        let mut app = signed_in_app();
        let me = app.user_id().unwrap();
        let bob = Uuid::new_v4();
        let id = Uuid::new_v4();
        update(
            &mut app,
            Action::ConversationsLoaded(Ok(vec![ConversationSummary {
                id,
                last_message: Some("see you".into()),
                last_message_at: Some(Utc::now()),
                updated_at: None,
                other_user: Some(test_profile(bob, "bob")),
            }])),
        );
        let effects = update(&mut app, Action::SelectConversation(id));
        assert!(!effects.is_empty());
        let generation = app.thread.generation();
        update(
            &mut app,
            Action::HistoryLoaded {
                generation,
                result: Ok(vec![Message {
                    id: Uuid::new_v4(),
                    conversation_id: id,
                    user_id: me,
                    content: "lunch at noon?".into(),
                    created_at: Utc::now(),
                    updated_at: None,
                    is_edited: false,
                }]),
            },
        );

        let text = rendered(&app, &mut TuiState::new());
        assert!(text.contains("Copilot Chat"));
        assert!(text.contains("bob"));
        assert!(text.contains("lunch at noon?"));
        assert!(text.contains("Message"));
    }

    #[test]
    fn test_overlays_render_on_top() {
        let mut app = signed_in_app();
        app.user_search.open();
        let text = rendered(&app, &mut TuiState::new());
        assert!(text.contains("New conversation"));

        app.user_search.close();
        app.copilot.open = true;
        app.emoji.open = true;
        let text = rendered(&app, &mut TuiState::new());
        assert!(text.contains("AI Copilot"));
        assert!(text.contains(app.emoji.current()));
    }
}
