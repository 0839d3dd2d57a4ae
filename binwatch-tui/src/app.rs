use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration as StdDuration, Instant};

use binwatch_core::{
    model::{Bin, BinId, Coordinate, NewBin, Route},
    service::BinwatchService,
    store::StoreState,
    validation::ValidationError,
};
use tokio::sync::watch;

const TOAST_TTL: StdDuration = StdDuration::from_secs(4);
const MAX_TOASTS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Dashboard,
    Analytics,
    AddBin,
    Route,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ToastKind {
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub(crate) struct Toast {
    pub kind: ToastKind,
    pub message: String,
    expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FormField {
    Location,
    Latitude,
    Longitude,
    Capacity,
}

impl FormField {
    pub(crate) const ALL: [FormField; 4] = [
        FormField::Location,
        FormField::Latitude,
        FormField::Longitude,
        FormField::Capacity,
    ];

    pub(crate) fn next(self) -> Self {
        match self {
            FormField::Location => FormField::Latitude,
            FormField::Latitude => FormField::Longitude,
            FormField::Longitude => FormField::Capacity,
            FormField::Capacity => FormField::Location,
        }
    }

    pub(crate) fn previous(self) -> Self {
        match self {
            FormField::Location => FormField::Capacity,
            FormField::Latitude => FormField::Location,
            FormField::Longitude => FormField::Latitude,
            FormField::Capacity => FormField::Longitude,
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            FormField::Location => "Location name",
            FormField::Latitude => "Latitude",
            FormField::Longitude => "Longitude",
            FormField::Capacity => "Capacity (liters)",
        }
    }
}

/// Text typed into the add-bin form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct AddBinForm {
    pub location: String,
    pub latitude: String,
    pub longitude: String,
    pub capacity: String,
    pub focus: FormField,
}

impl Default for AddBinForm {
    fn default() -> Self {
        Self {
            location: String::new(),
            latitude: String::new(),
            longitude: String::new(),
            capacity: binwatch_core::DEFAULT_CAPACITY_LITERS.to_string(),
            focus: FormField::Location,
        }
    }
}

impl AddBinForm {
    pub(crate) fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Location => &self.location,
            FormField::Latitude => &self.latitude,
            FormField::Longitude => &self.longitude,
            FormField::Capacity => &self.capacity,
        }
    }

    pub(crate) fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            FormField::Location => &mut self.location,
            FormField::Latitude => &mut self.latitude,
            FormField::Longitude => &mut self.longitude,
            FormField::Capacity => &mut self.capacity,
        }
    }

    pub(crate) fn parse(&self) -> Result<NewBin, ValidationError> {
        NewBin::parse(&self.location, &self.latitude, &self.longitude, &self.capacity)
    }
}

/// Route currently drawn on the route screen.
#[derive(Debug, Clone)]
pub(crate) struct ActiveRoute {
    pub bin: Bin,
    pub origin: Coordinate,
    pub route: Route,
}

pub(crate) struct App {
    pub service: Arc<BinwatchService>,
    updates: watch::Receiver<StoreState>,

    pub screen: Screen,
    pub state: StoreState,
    pub list_index: usize,
    /// Bin the list cursor is on; survives re-sorting of the snapshot.
    selected_id: Option<BinId>,

    pub form: AddBinForm,

    /// Configured operator position; `None` disables routing.
    pub origin: Option<Coordinate>,
    pub location_enabled: bool,
    pub route: Option<ActiveRoute>,

    /// A change feed subscription is open.
    pub live_updates: bool,
    pub is_busy: bool,
    pub toasts: VecDeque<Toast>,
}

impl App {
    pub(crate) fn new(service: Arc<BinwatchService>, origin: Option<Coordinate>) -> Self {
        let updates = service.subscribe();
        let state = updates.borrow().clone();
        let mut app = Self {
            service,
            updates,
            screen: Screen::Dashboard,
            state,
            list_index: 0,
            selected_id: None,
            form: AddBinForm::default(),
            origin,
            location_enabled: false,
            route: None,
            live_updates: false,
            is_busy: false,
            toasts: VecDeque::new(),
        };
        app.remember_selection();
        app
    }

    /// Pull the latest store state if it changed. Returns whether it did.
    ///
    /// The cursor follows the selected bin to its new position; it is clamped
    /// only when that bin is gone.
    pub(crate) fn sync_store(&mut self) -> bool {
        if !self.updates.has_changed().unwrap_or(false) {
            return false;
        }
        self.state = self.updates.borrow_and_update().clone();

        let bins = self.state.bins();
        let found = self
            .selected_id
            .as_ref()
            .and_then(|id| bins.iter().position(|bin| &bin.id == id));
        self.list_index = match found {
            Some(index) => index,
            None => self.list_index.min(bins.len().saturating_sub(1)),
        };
        self.remember_selection();
        true
    }

    pub(crate) fn selected_bin(&self) -> Option<&Bin> {
        self.state.bins().get(self.list_index)
    }

    pub(crate) fn select_next(&mut self) {
        if self.list_index + 1 < self.state.bins().len() {
            self.list_index += 1;
        }
        self.remember_selection();
    }

    pub(crate) fn select_previous(&mut self) {
        self.list_index = self.list_index.saturating_sub(1);
        self.remember_selection();
    }

    fn remember_selection(&mut self) {
        self.selected_id = self.selected_bin().map(|bin| bin.id.clone());
    }

    pub(crate) fn open_add_form(&mut self) {
        self.form = AddBinForm::default();
        self.screen = Screen::AddBin;
    }

    /// Position to route from, if the operator has enabled it.
    pub(crate) fn user_location(&self) -> Option<Coordinate> {
        self.origin.filter(|_| self.location_enabled)
    }

    pub(crate) fn notify_success<S: Into<String>>(&mut self, message: S) {
        self.push_toast(ToastKind::Success, message.into());
    }

    pub(crate) fn notify_error<S: Into<String>>(&mut self, message: S) {
        self.push_toast(ToastKind::Error, message.into());
    }

    fn push_toast(&mut self, kind: ToastKind, message: String) {
        if self.toasts.len() == MAX_TOASTS {
            self.toasts.pop_front();
        }
        self.toasts.push_back(Toast {
            kind,
            message,
            expires_at: Instant::now() + TOAST_TTL,
        });
    }

    pub(crate) fn prune_toasts(&mut self, now: Instant) {
        self.toasts.retain(|toast| toast.expires_at > now);
    }

    pub(crate) fn latest_toast(&self) -> Option<&Toast> {
        self.toasts.back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn form_cycles_through_fields() {
        let mut field = FormField::Location;
        for _ in 0..FormField::ALL.len() {
            field = field.next();
        }
        assert_eq!(field, FormField::Location);
        assert_eq!(FormField::Location.previous(), FormField::Capacity);
    }

    #[test]
    fn default_form_prefills_capacity() {
        let mut form = AddBinForm::default();
        assert_eq!(form.value(FormField::Capacity), "100");

        form.location.push_str("Guindy");
        form.latitude.push_str("13.0067");
        form.longitude.push_str("80.2206");
        let new_bin = form.parse().expect("form is valid");
        assert_eq!(new_bin.capacity, 100);
    }

    #[test]
    fn focused_field_receives_input() {
        let mut form = AddBinForm {
            focus: FormField::Longitude,
            ..AddBinForm::default()
        };
        form.focused_mut().push('8');
        assert_eq!(form.longitude, "8");
        assert!(form.location.is_empty());
    }
}
