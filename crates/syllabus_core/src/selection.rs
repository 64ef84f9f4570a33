//! crates/syllabus_core/src/selection.rs
//!
//! Decides which breakdown is active.
//!
//! The controller is a plain state machine. It holds identifiers only; the
//! breakdown records themselves stay in the repository. Inputs arrive as
//! discrete transitions and each one is applied completely before the next.
//!
//! Resolution order when a load completes with a non-empty list:
//! 1. a freshly generated breakdown that is now present,
//! 2. a deep-link target that has not been applied yet and is present,
//! 3. the current selection if it is still present,
//! 4. the newest breakdown.

use tracing::debug;
use uuid::Uuid;

use crate::error::SelectionError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Unselected,
    Selected(Uuid),
    /// Still shown, but the last refresh of the list failed.
    Stale(Uuid),
}

impl Selection {
    pub fn active_id(&self) -> Option<Uuid> {
        match *self {
            Selection::Unselected => None,
            Selection::Selected(id) | Selection::Stale(id) => Some(id),
        }
    }
}

#[derive(Debug, Default)]
pub struct SelectionController {
    state: Selection,
    loaded_ids: Vec<Uuid>,
    target: Option<Uuid>,
    target_pending: bool,
    generated: Option<Uuid>,
}

impl SelectionController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Selection {
        self.state
    }

    pub fn active_id(&self) -> Option<Uuid> {
        self.state.active_id()
    }

    /// The current deep-link target, if it parsed as an id.
    pub fn target(&self) -> Option<Uuid> {
        self.target
    }

    /// Applies the authoritative result of a breakdown load.
    ///
    /// `ids` must already be in display order (newest first).
    pub fn on_loaded(&mut self, ids: &[Uuid]) -> Selection {
        self.loaded_ids = ids.to_vec();

        let Some(&newest) = ids.first() else {
            self.state = Selection::Unselected;
            return self.state;
        };

        if let Some(generated) = self.generated.filter(|id| ids.contains(id)) {
            self.generated = None;
            self.target_pending = false;
            self.state = Selection::Selected(generated);
            return self.state;
        }

        if self.target_pending {
            if let Some(target) = self.target.filter(|id| ids.contains(id)) {
                self.target_pending = false;
                self.state = Selection::Selected(target);
                return self.state;
            }
            debug!(target = ?self.target, "Deep-link target not loaded yet; using default selection.");
        }

        self.state = match self.state {
            Selection::Selected(current) | Selection::Stale(current) if ids.contains(&current) => {
                Selection::Selected(current)
            }
            _ => Selection::Selected(newest),
        };
        self.state
    }

    /// A load failed. The visible selection is kept but marked stale.
    pub fn on_load_failed(&mut self) -> Selection {
        if let Selection::Selected(id) = self.state {
            self.state = Selection::Stale(id);
        }
        self.state
    }

    /// The deep-link target changed. Malformed values count as "not found".
    ///
    /// A target already in the loaded list is shown straight away; otherwise it
    /// stays pending until a load contains it or the user picks something.
    /// A stale selection stays stale until the next successful load.
    pub fn on_target_changed(&mut self, raw_target: Option<&str>) -> Selection {
        let target = raw_target.and_then(|raw| {
            let parsed = Uuid::parse_str(raw.trim()).ok();
            if parsed.is_none() {
                debug!(raw, "Ignoring malformed deep-link target.");
            }
            parsed
        });
        self.target = target;
        self.target_pending = target.is_some();

        if let Some(target) = target.filter(|id| self.loaded_ids.contains(id)) {
            self.target_pending = false;
            self.state = match self.state {
                Selection::Stale(_) => Selection::Stale(target),
                _ => Selection::Selected(target),
            };
        }
        self.state
    }

    /// Explicit user choice. Consumes the deep-link target.
    ///
    /// A generated id still waiting for its reload is kept, so it is shown once that reload lands.
    pub fn select(&mut self, id: Uuid) -> Result<Selection, SelectionError> {
        if !self.loaded_ids.contains(&id) {
            return Err(SelectionError::NotLoaded(id));
        }
        self.target_pending = false;
        self.state = Selection::Selected(id);
        Ok(self.state)
    }

    /// A new breakdown was generated. It becomes active once a load containing it completes.
    pub fn on_generated(&mut self, id: Uuid) {
        self.generated = Some(id);
    }

    /// The signed-in user changed; nothing selected for the previous owner survives.
    pub fn reset(&mut self) {
        self.state = Selection::Unselected;
        self.loaded_ids.clear();
        self.generated = None;
        if self.target.is_some() {
            self.target_pending = true;
        }
    }
}
