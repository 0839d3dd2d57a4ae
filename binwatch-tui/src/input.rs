use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::app::{App, Screen};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    None,
    Quit,
    /// Run `service.refresh`()
    Refresh,
    /// Run `service.mark_collected`(...) for the selected bin
    CollectSelected,
    /// Run `service.delete_bin`(...) for the selected bin
    DeleteSelected,
    /// Validate the form and run `service.add_bin`(...)
    SubmitNewBin,
    /// Run `service.route_to`(...) from the operator position to the selected bin
    RouteToSelected,
    /// Enable the configured operator position
    LocateUser,
}

pub(crate) fn handle_key_event(key: KeyEvent, app: &mut App) -> Action {
    use KeyCode::{BackTab, Backspace, Char, Down, Enter, Esc, F, Tab, Up};

    // Global quit shortcuts
    if key.code == Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Action::Quit;
    }
    // `q` is text while the form is open
    if key.code == Char('q') && key.modifiers.is_empty() && app.screen != Screen::AddBin {
        return Action::Quit;
    }

    let mut action = Action::None;

    match app.screen {
        Screen::Dashboard => match key.code {
            Up | Char('k') => app.select_previous(),
            Down | Char('j') => app.select_next(),
            Tab => app.screen = Screen::Analytics,
            Char('a') => app.open_add_form(),
            Char('c') => action = Action::CollectSelected,
            Char('d') => action = Action::DeleteSelected,
            Char('r') => action = Action::RouteToSelected,
            Char('l') => action = Action::LocateUser,
            Char('R') | F(5) => action = Action::Refresh,
            _ => {}
        },

        Screen::Analytics => match key.code {
            Tab | Esc => app.screen = Screen::Dashboard,
            Char('R') | F(5) => action = Action::Refresh,
            _ => {}
        },

        Screen::AddBin => match key.code {
            Tab | Down => app.form.focus = app.form.focus.next(),
            BackTab | Up => app.form.focus = app.form.focus.previous(),
            Char(character) => {
                if !key.modifiers.contains(KeyModifiers::CONTROL)
                    && !key.modifiers.contains(KeyModifiers::ALT)
                {
                    app.form.focused_mut().push(character);
                }
            }
            Backspace => {
                app.form.focused_mut().pop();
            }
            Enter => action = Action::SubmitNewBin,
            Esc => app.screen = Screen::Dashboard,
            _ => {}
        },

        Screen::Route => match key.code {
            Esc | Char('x') => {
                app.route = None;
                app.screen = Screen::Dashboard;
            }
            _ => {}
        },
    }
    action
}
