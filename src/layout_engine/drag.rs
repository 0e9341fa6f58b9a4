//! Dragging a docked icon around.
//!
//! Motion only asks where the icon would land. The renderer is told so it
//! can preview the result, but no table changes until the drag is
//! committed, and cancelling puts every preview back where it came from.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace};

use super::engine::DockEngine;
use super::systems::{SnapPlan, SnapRejection};
use super::{DockError, DockId, GridPos, Point};
use crate::model::{IconId, IconRole};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragSession {
    pub icon: IconId,
    pub source: DockId,
    /// Where the icon was when the drag began.
    pub origin: GridPos,
    /// Last accepted snap, if the icon is over a dock that would take it.
    pub preview: Option<(DockId, SnapPlan)>,
}

impl DragSession {
    pub fn involves(&self, dock: DockId) -> bool {
        self.source == dock || self.preview.as_ref().is_some_and(|(target, _)| *target == dock)
    }
}

const NO_DRAG: DockError = DockError::NotApplicable("no drag in progress");

impl DockEngine {
    pub fn drag(&self) -> Option<&DragSession> { self.drag.as_ref() }

    /// Starts dragging a docked icon. Any drag already in progress is
    /// cancelled first.
    #[instrument(skip(self))]
    pub fn begin_drag(&mut self, icon: IconId) -> Result<(), DockError> {
        self.cancel_drag();
        let source = self.locate(icon).ok_or(DockError::NotDocked(icon))?;
        let found = self.icon(icon).ok_or(DockError::NotDocked(icon))?;
        if found.role == IconRole::Anchor {
            return Err(DockError::NotApplicable("the anchor cannot be dragged"));
        }
        let origin = found.pos();
        self.drag = Some(DragSession { icon, source, origin, preview: None });
        debug!(?source, %origin, "drag started");
        Ok(())
    }

    /// The dragged icon's top-left corner moved to `req` over `dock`.
    pub fn drag_motion(&mut self, dock: DockId, req: Point) -> Result<SnapPlan, SnapRejection> {
        let mut session = self.drag.take().ok_or(NO_DRAG)?;
        let result = match self.icon(session.icon).cloned() {
            Some(icon) => self.snap_plan(dock, &icon, req, dock == session.source),
            None => Err(DockError::NotDocked(session.icon).into()),
        };

        let preview = result.as_ref().ok().map(|plan| (dock, plan.clone()));
        if preview != session.preview {
            self.spring_back(&session);
            if let Some((target, plan)) = &preview {
                for slide in &plan.slides {
                    self.broadcast().icon_moved(*target, slide.icon, slide.to);
                }
                self.broadcast().icon_moved(*target, session.icon, plan.pos);
            }
            trace!(?dock, %req, accepted = preview.is_some(), "drag preview changed");
        }
        session.preview = preview;
        self.drag = Some(session);
        result
    }

    /// Drops the icon where the last motion said it would land. Without an
    /// accepted preview the icon springs back and nothing changes.
    #[instrument(skip(self))]
    pub fn commit_drag(&mut self) -> Result<Option<(DockId, GridPos)>, DockError> {
        let session = self.drag.take().ok_or(NO_DRAG)?;
        let Some((dock, plan)) = session.preview.clone() else {
            debug!("dropped outside any dock");
            self.spring_back(&session);
            return Ok(None);
        };
        match self.move_icon(session.icon, dock, plan.pos) {
            Ok(()) => {
                debug!(?dock, pos = %plan.pos, slid = plan.slides.len(), "drag committed");
                Ok(Some((dock, plan.pos)))
            }
            Err(err) => {
                debug!(?dock, %err, "drop refused");
                self.spring_back(&session);
                Err(err)
            }
        }
    }

    /// Abandons the drag. Returns whether one was in progress.
    pub fn cancel_drag(&mut self) -> bool {
        let Some(session) = self.drag.take() else {
            return false;
        };
        self.spring_back(&session);
        debug!(icon = %session.icon, "drag cancelled");
        true
    }

    /// Tells the renderer to put back whatever the preview moved.
    fn spring_back(&self, session: &DragSession) {
        if let Some((dock, plan)) = &session.preview {
            for slide in &plan.slides {
                self.broadcast().icon_moved(*dock, slide.icon, slide.from);
            }
        }
        self.broadcast().icon_moved(session.source, session.icon, session.origin);
    }
}
