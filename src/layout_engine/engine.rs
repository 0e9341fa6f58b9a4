//! The engine owns every dock of one screen: the main dock, its drawers and
//! one clip per workspace. Raw table operations live on [`Dock`]; the
//! methods here compose them with drawer reflow, omnipresence and
//! notifications so that every table stays consistent after each call.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;

use ascii_tree::Tree;
use slotmap::SlotMap;
use tracing::{debug, error, info, instrument, trace, warn};

use super::drag::DragSession;
use super::systems::{DockSystem, PlacementContext, Slide, SnapPlan, SnapRejection};
use super::{
    ClipSystem, Dock, DockError, DockId, DockKind, DrawerSystem, GridPos, MainDockSystem, Point,
    Screen, reflow,
};
use crate::actor::auto_visibility::{self, AutoVisibility, Family};
use crate::actor::broadcast::{Broadcast, BroadcastReceiver};
use crate::actor::timer::{ManualScheduler, Scheduler, TimerEvent};
use crate::common::config::Settings;
use crate::model::persist::{self, DockEntry, DrawerEntry, RestoreIssue, SessionState};
use crate::model::{
    Icon, IconFlags, IconId, IconRole, OmnipresentEntry, OmnipresentRegistry, SharedRegistry,
};

pub struct DockEngine {
    docks: SlotMap<DockId, Dock>,
    main_dock: DockId,
    /// One clip per workspace, in workspace order.
    clips: Vec<DockId>,
    current_workspace: usize,
    registry: SharedRegistry,
    settings: Settings,
    screen: Screen,
    next_icon: IconId,
    broadcast: Broadcast,
    scheduler: Box<dyn Scheduler>,
    pub(super) drag: Option<DragSession>,
}

impl DockEngine {
    /// Builds the main dock and the first workspace's clip. Timers go to a
    /// [`ManualScheduler`] until [`DockEngine::set_scheduler`] installs
    /// another one.
    pub fn new(settings: Settings, screen: Screen) -> Self {
        let mut engine = DockEngine {
            docks: SlotMap::with_key(),
            main_dock: DockId::default(),
            clips: Vec::new(),
            current_workspace: 0,
            registry: OmnipresentRegistry::shared(),
            settings,
            screen,
            next_icon: IconId::new(1),
            broadcast: Broadcast::default(),
            scheduler: Box::new(ManualScheduler::new()),
            drag: None,
        };

        let main = engine.settings.dock;
        let origin = engine.main_origin(main.on_right_side);
        let anchor = engine.anchor();
        let capacity = engine.capacity();
        engine.main_dock = engine.docks.insert_with_key(|id| {
            let mut dock = Dock::new(id, MainDockSystem.into(), origin, capacity, anchor, None);
            dock.on_right_side = main.on_right_side;
            dock.auto_raise_lower = main.auto_raise_lower;
            dock.lowered = main.lowered;
            dock
        });
        engine.push_clip();
        engine
    }

    pub fn set_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        for dock in self.docks.values_mut() {
            dock.timers.cancel_all();
        }
        self.scheduler = scheduler;
    }

    /// Routes renderer notifications to the returned receiver.
    pub fn subscribe(&mut self) -> BroadcastReceiver { self.broadcast.subscribe() }

    pub fn settings(&self) -> &Settings { &self.settings }

    pub fn screen(&self) -> Screen { self.screen }

    pub fn main_dock(&self) -> DockId { self.main_dock }

    pub fn clips(&self) -> &[DockId] { &self.clips }

    pub fn current_workspace(&self) -> usize { self.current_workspace }

    pub fn current_clip(&self) -> DockId { self.clips[self.current_workspace] }

    pub fn registry(&self) -> &SharedRegistry { &self.registry }

    pub fn dock(&self, id: DockId) -> Option<&Dock> { self.docks.get(id) }

    pub fn docks(&self) -> impl Iterator<Item = &Dock> + '_ { self.docks.values() }

    /// Drawers attached to the main dock with the row their tile is on,
    /// top to bottom.
    pub fn drawers(&self) -> Vec<(DockId, i32)> {
        let mut drawers: Vec<(DockId, i32)> = self
            .docks
            .get(self.main_dock)
            .into_iter()
            .flat_map(|main| main.table().members())
            .filter_map(|tile| Some((tile.drawer()?, tile.grid_y)))
            .collect();
        drawers.sort_by_key(|&(_, row)| row);
        drawers
    }

    /// The dock currently holding `icon`.
    pub fn locate(&self, icon: IconId) -> Option<DockId> {
        self.docks.iter().find(|(_, dock)| dock.icon(icon).is_some()).map(|(id, _)| id)
    }

    pub fn icon(&self, icon: IconId) -> Option<&Icon> {
        self.docks.values().find_map(|dock| dock.icon(icon))
    }

    /// A fresh, undocked launcher with an id unique to this engine.
    pub fn new_icon(&mut self, name: impl Into<String>, command: Option<String>) -> Icon {
        Icon::launcher(self.alloc_icon_id(), name, command)
    }

    pub fn context(&self) -> PlacementContext<'_> {
        PlacementContext::new(self.screen, &self.settings.grid)
            .with_clips(self.clips.iter().filter_map(|&id| self.docks.get(id)))
    }

    pub(super) fn broadcast(&self) -> &Broadcast { &self.broadcast }

    fn alloc_icon_id(&mut self) -> IconId {
        let id = self.next_icon;
        self.next_icon = id.next();
        id
    }

    fn anchor(&mut self) -> Icon { Icon::bare(self.alloc_icon_id(), IconRole::Anchor) }

    fn capacity(&self) -> usize { self.settings.grid.max_icons }

    fn dock_ref(&self, id: DockId) -> Result<&Dock, DockError> {
        self.docks.get(id).ok_or(DockError::UnknownDock)
    }

    fn dock_mut(&mut self, id: DockId) -> Result<&mut Dock, DockError> {
        self.docks.get_mut(id).ok_or(DockError::UnknownDock)
    }

    fn main_origin(&self, on_right_side: bool) -> Point {
        let x = if on_right_side { self.screen.width - self.settings.grid.icon_size } else { 0 };
        Point::new(x, 0)
    }

    fn clip_origin(&self) -> Point {
        let on_right_side = self.docks.get(self.main_dock).is_some_and(|dock| dock.on_right_side);
        self.main_origin(!on_right_side)
    }

    /// Drawers open level with their tile.
    fn drawer_origin(&self, row: i32) -> Point {
        let main = self.docks.get(self.main_dock).map_or(Point::default(), Dock::origin);
        Point::new(main.x, main.y + row * self.settings.grid.icon_size)
    }

    fn push_clip(&mut self) -> DockId {
        let workspace = self.clips.len();
        let origin = self.clip_origin();
        let anchor = self.anchor();
        let capacity = self.capacity();
        let registry = self.registry.clone();
        let clip = self.settings.clip;
        let id = self.docks.insert_with_key(|id| {
            let kind = ClipSystem { workspace }.into();
            let mut dock = Dock::new(id, kind, origin, capacity, anchor, Some(registry));
            dock.auto_collapse = clip.auto_collapse;
            dock.auto_raise_lower = clip.auto_raise_lower;
            dock.attract_icons = clip.attract_icons;
            dock
        });
        self.clips.push(id);
        id
    }

    fn publish_slides(&self, dock: DockId, slides: &[Slide]) {
        for slide in slides {
            self.broadcast.icon_moved(dock, slide.icon, slide.to);
        }
    }

    fn publish_visibility(&self, id: DockId) {
        if let Some(dock) = self.docks.get(id) {
            self.broadcast.visibility_changed(id, dock.collapsed, dock.lowered);
        }
    }

    fn undo_slides(dock: &mut Dock, slides: &[Slide]) {
        if let Err(err) = reflow::revert(dock, slides) {
            error!(dock = ?dock.id(), %err, "could not undo drawer slides");
        }
    }

    /// Slides a drawer's icons so that `pos` is free for an arriving icon.
    fn open_gap(dock: &mut Dock, moving: IconId, pos: GridPos) -> Result<Vec<Slide>, DockError> {
        dock.kind().check_slot(dock, pos)?;
        if pos.x.abs() > dock.occupied_count() as i32 {
            return Err(DockError::out_of_range(pos));
        }
        let hole = reflow::hole_index(dock, moving, false)?;
        let slides = reflow::slide_plan(dock, moving, pos, hole)?;
        reflow::apply(dock, &slides)?;
        Ok(slides)
    }

    pub fn find_free_slot(&self, dock: DockId) -> Option<GridPos> {
        let target = self.docks.get(dock)?;
        target.kind().find_free_slot(target, &self.context())
    }

    /// Where a dragged icon whose top-left corner is at `req` would land,
    /// and what would have to slide for it. Changes nothing.
    pub fn snap_plan(
        &self,
        dock: DockId,
        icon: &Icon,
        req: Point,
        redocking: bool,
    ) -> Result<SnapPlan, SnapRejection> {
        let target = self.docks.get(dock).ok_or(DockError::UnknownDock)?;
        target.kind().snap(target, icon, req, redocking, &self.context())
    }

    pub fn snap(&self, dock: DockId, icon: &Icon, req: Point, redocking: bool) -> Option<GridPos> {
        self.snap_plan(dock, icon, req, redocking).ok().map(|plan| plan.pos)
    }

    #[instrument(skip(self, icon), fields(icon = %icon.id))]
    pub fn attach_icon(&mut self, dock: DockId, icon: Icon, pos: GridPos) -> Result<(), DockError> {
        let id = icon.id;
        let target = self.dock_mut(dock)?;
        if target.is_full() {
            return Err(DockError::Full);
        }
        let slides =
            if target.kind().is_drawer() { Self::open_gap(target, id, pos)? } else { Vec::new() };
        if let Err(err) = target.attach(icon, pos) {
            Self::undo_slides(target, &slides);
            return Err(err);
        }
        self.publish_slides(dock, &slides);
        self.broadcast.icon_moved(dock, id, pos);
        debug!(?dock, %pos, slid = slides.len(), "attached icon");
        Ok(())
    }

    /// Attaches `icon` wherever the dock would put a new icon.
    pub fn place_icon(&mut self, dock: DockId, icon: Icon) -> Result<GridPos, DockError> {
        self.dock_ref(dock)?;
        let pos = self.find_free_slot(dock).ok_or(DockError::Full)?;
        self.attach_icon(dock, icon, pos)?;
        Ok(pos)
    }

    /// Captures a newly started application's icon into the current clip.
    pub fn attract_icon(&mut self, mut icon: Icon) -> Result<GridPos, DockError> {
        let clip = self.current_clip();
        if !self.dock_ref(clip)?.attract_icons {
            return Err(DockError::NotApplicable("the clip does not attract icons"));
        }
        icon.flags |= IconFlags::ATTRACTED;
        self.place_icon(clip, icon)
    }

    /// Removes an icon from whatever dock holds it. The icon is handed back
    /// only if its application is still running; otherwise it is gone.
    #[instrument(skip(self))]
    pub fn detach_icon(&mut self, icon: IconId) -> Result<Option<Icon>, DockError> {
        let dock_id = self.locate(icon).ok_or(DockError::NotDocked(icon))?;
        let dock = self.dock_mut(dock_id)?;
        let pos = match dock.icon(icon) {
            Some(found) if found.drawer().is_some() => {
                return Err(DockError::NotApplicable("remove the drawer instead"));
            }
            Some(found) => found.pos(),
            None => return Err(DockError::NotDocked(icon)),
        };

        let detached = dock.detach(icon)?;
        let slides = if dock.kind().is_drawer() {
            match reflow::fill_gap(dock, icon, false) {
                Ok(slides) => slides,
                Err(err) => {
                    if let Err(undo) = dock.attach(detached, pos) {
                        error!(%undo, "could not restore icon after failed reflow");
                    }
                    return Err(err);
                }
            }
        } else {
            Vec::new()
        };

        self.broadcast.icon_removed(dock_id, icon);
        self.publish_slides(dock_id, &slides);
        debug!(dock = ?dock_id, running = detached.is_running(), "detached icon");
        Ok(detached.is_running().then_some(detached))
    }

    /// Removes several icons at once, then squeezes every drawer that lost
    /// icons. Nothing is removed unless every icon can be.
    #[instrument(skip(self))]
    pub fn detach_icons(&mut self, icons: &[IconId]) -> Result<Vec<Icon>, DockError> {
        let mut plan: Vec<(DockId, IconId)> = Vec::with_capacity(icons.len());
        for &icon in icons {
            if plan.iter().any(|&(_, planned)| planned == icon) {
                continue;
            }
            let dock = self.locate(icon).ok_or(DockError::NotDocked(icon))?;
            match self.dock_ref(dock)?.icon(icon).map(|found| found.role) {
                Some(IconRole::Launcher) => plan.push((dock, icon)),
                Some(_) => return Err(DockError::NotApplicable("only launchers can be removed")),
                None => return Err(DockError::NotDocked(icon)),
            }
        }

        let mut touched: Vec<DockId> = Vec::new();
        let mut running = Vec::new();
        for (dock, icon) in plan {
            let detached = self.dock_mut(dock)?.detach(icon)?;
            self.broadcast.icon_removed(dock, icon);
            if !touched.contains(&dock) {
                touched.push(dock);
            }
            if detached.is_running() {
                running.push(detached);
            }
        }
        for dock in touched {
            let target = self.dock_mut(dock)?;
            if target.kind().is_drawer() {
                let slides = reflow::consolidate(target)?;
                self.publish_slides(dock, &slides);
            }
        }
        Ok(running)
    }

    /// Fails with `Occupied` if an omnipresent icon moving to `pos` in
    /// `home` would land on an icon of another clip.
    fn check_mirrored_cell(
        &self,
        icon: IconId,
        home: DockId,
        pos: GridPos,
    ) -> Result<(), DockError> {
        for &clip in self.clips.iter().filter(|&&clip| clip != home) {
            let taken = self
                .dock_ref(clip)?
                .table()
                .at(pos)
                .is_some_and(|occupant| occupant.id != icon);
            if taken {
                return Err(DockError::occupied(pos));
            }
        }
        Ok(())
    }

    /// Moves a docked icon to `pos` in `dest`, which may be the dock it is
    /// already in.
    #[instrument(skip(self))]
    pub fn move_icon(&mut self, icon: IconId, dest: DockId, pos: GridPos) -> Result<(), DockError> {
        let src = self.locate(icon).ok_or(DockError::NotDocked(icon))?;
        let target = self.dock_ref(dest)?;
        let omnipresent = self.dock_ref(src)?.icon(icon).is_some_and(|found| found.omnipresent);
        if omnipresent && target.kind().is_clip() {
            self.check_mirrored_cell(icon, dest, pos)?;
        }
        if src == dest {
            self.reposition(dest, icon, pos)
        } else {
            self.transfer(src, dest, icon, pos)
        }
    }

    fn reposition(&mut self, dock_id: DockId, icon: IconId, pos: GridPos) -> Result<(), DockError> {
        let dock = self.dock_mut(dock_id)?;
        let current = dock.icon(icon).ok_or(DockError::NotDocked(icon))?;
        let (from, tile) = (current.pos(), current.drawer());
        if from == pos {
            return Ok(());
        }

        let mut moves = Vec::new();
        if dock.kind().is_drawer() {
            dock.kind().check_slot(dock, pos)?;
            if pos.x.abs() >= dock.occupied_count() as i32 {
                return Err(DockError::out_of_range(pos));
            }
            let hole = reflow::hole_index(dock, icon, true)?;
            moves = reflow::slide_plan(dock, icon, pos, hole)?;
        }
        moves.push(Slide { icon, from, to: pos });
        reflow::apply(dock, &moves)?;

        if let Some(drawer) = tile {
            let origin = self.drawer_origin(pos.y);
            self.dock_mut(drawer)?.set_origin(origin);
        }
        self.publish_slides(dock_id, &moves);
        Ok(())
    }

    fn transfer(
        &mut self,
        src: DockId,
        dest: DockId,
        icon: IconId,
        pos: GridPos,
    ) -> Result<(), DockError> {
        let [from, to] = self.docks.get_disjoint_mut([src, dest]).ok_or(DockError::UnknownDock)?;
        let opened = if to.kind().is_drawer() {
            if to.is_full() {
                return Err(DockError::DestinationFull);
            }
            Self::open_gap(to, icon, pos)?
        } else {
            Vec::new()
        };
        if let Err(err) = Dock::move_between(from, to, icon, pos) {
            Self::undo_slides(to, &opened);
            return Err(err);
        }
        let closed =
            if from.kind().is_drawer() { reflow::fill_gap(from, icon, false)? } else { Vec::new() };

        self.publish_slides(dest, &opened);
        self.broadcast.icon_moved(dest, icon, pos);
        self.publish_slides(src, &closed);
        Ok(())
    }

    /// Marks a clip icon as shown in every workspace, or stops doing so.
    ///
    /// Its cell is reserved in every other clip, so this fails with `Full`
    /// when another clip has no room left or already has an icon there.
    #[instrument(skip(self))]
    pub fn set_omnipresent(&mut self, icon: IconId, omnipresent: bool) -> Result<(), DockError> {
        let home = self.locate(icon).ok_or(DockError::NotDocked(icon))?;
        let dock = self.dock_ref(home)?;
        if !dock.kind().is_clip() {
            return Err(DockError::NotApplicable("only clip icons can be omnipresent"));
        }
        let current = dock.icon(icon).ok_or(DockError::NotDocked(icon))?;
        if current.role != IconRole::Launcher {
            return Err(DockError::NotApplicable("only launchers can be omnipresent"));
        }
        if current.omnipresent == omnipresent {
            return Ok(());
        }
        let pos = current.pos();

        if omnipresent {
            for &clip in self.clips.iter().filter(|&&clip| clip != home) {
                let other = self.dock_ref(clip)?;
                if other.is_full() || other.table().at(pos).is_some() {
                    debug!(?clip, %pos, "no room for the reservation");
                    return Err(DockError::Full);
                }
            }
            match self.registry.write().add(OmnipresentEntry { icon, clip: home, pos }) {
                Ok(()) => {}
                Err(DockError::Occupied { .. }) => return Err(DockError::Full),
                Err(err) => return Err(err),
            }
        } else {
            self.registry.write().remove(icon);
        }

        if let Some(found) = self.dock_mut(home)?.icon_mut(icon) {
            found.omnipresent = omnipresent;
        }
        self.broadcast.icon_moved(home, icon, pos);
        Ok(())
    }

    pub fn add_workspace(&mut self) -> usize {
        self.push_clip();
        let workspace = self.clips.len() - 1;
        info!(workspace, "added workspace");
        workspace
    }

    /// Makes `workspace` current. Omnipresent icons follow into its clip at
    /// the same cells.
    #[instrument(skip(self))]
    pub fn switch_workspace(&mut self, workspace: usize) -> Result<(), DockError> {
        let target = *self.clips.get(workspace).ok_or(DockError::UnknownDock)?;
        if workspace == self.current_workspace {
            return Ok(());
        }
        let migrating: Vec<OmnipresentEntry> =
            self.registry.read().iter().filter(|entry| entry.clip != target).copied().collect();
        for entry in &migrating {
            let [from, to] =
                self.docks.get_disjoint_mut([entry.clip, target]).ok_or(DockError::UnknownDock)?;
            Dock::move_between(from, to, entry.icon, entry.pos)?;
            self.broadcast.icon_moved(target, entry.icon, entry.pos);
        }
        self.current_workspace = workspace;
        info!(workspace, migrated = migrating.len(), "switched workspace");
        Ok(())
    }

    /// Drops a workspace's clip. Its omnipresent icons move on to the clip
    /// that is current afterwards; running icons are handed back.
    #[instrument(skip(self))]
    pub fn remove_workspace(&mut self, workspace: usize) -> Result<Vec<Icon>, DockError> {
        if self.clips.len() <= 1 {
            return Err(DockError::NotApplicable("the last workspace keeps its clip"));
        }
        let removed = *self.clips.get(workspace).ok_or(DockError::UnknownDock)?;
        let remaining: Vec<DockId> =
            self.clips.iter().copied().filter(|&id| id != removed).collect();
        let current = match workspace.cmp(&self.current_workspace) {
            std::cmp::Ordering::Less => self.current_workspace - 1,
            std::cmp::Ordering::Equal => self.current_workspace.min(remaining.len() - 1),
            std::cmp::Ordering::Greater => self.current_workspace,
        };
        let heir = remaining[current];

        let rehomed: Vec<OmnipresentEntry> =
            self.registry.read().in_clip(removed).copied().collect();
        for entry in &rehomed {
            let [from, to] =
                self.docks.get_disjoint_mut([removed, heir]).ok_or(DockError::UnknownDock)?;
            Dock::move_between(from, to, entry.icon, entry.pos)?;
            self.broadcast.icon_moved(heir, entry.icon, entry.pos);
        }

        let mut running = Vec::new();
        let members: Vec<IconId> =
            self.dock_ref(removed)?.table().members().map(|icon| icon.id).collect();
        for id in members {
            let icon = self.dock_mut(removed)?.detach(id)?;
            self.broadcast.icon_removed(removed, id);
            if icon.is_running() {
                running.push(icon);
            }
        }

        self.abandon_drag_in(removed);
        self.docks.remove(removed);
        self.clips = remaining;
        for (workspace, &id) in self.clips.iter().enumerate() {
            if let Some(DockKind::Clip(clip)) = self.docks.get_mut(id).map(Dock::kind_mut) {
                clip.workspace = workspace;
            }
        }
        self.current_workspace = current;
        info!(workspace, rehomed = rehomed.len(), handed_back = running.len(), "removed workspace");
        Ok(running)
    }

    /// Adds a drawer whose tile sits in the main dock at `row`, or at the
    /// first free row.
    #[instrument(skip(self))]
    pub fn add_drawer(&mut self, row: Option<i32>) -> Result<DockId, DockError> {
        let main_id = self.main_dock;
        let pos = match row {
            Some(row) => GridPos::new(0, row),
            None => self.find_free_slot(main_id).ok_or(DockError::Full)?,
        };
        let main = self.dock_ref(main_id)?;
        if main.is_full() {
            return Err(DockError::Full);
        }
        main.kind().check_slot(main, pos)?;
        if pos == GridPos::ORIGIN || !main.table().is_free(pos) {
            return Err(DockError::occupied(pos));
        }
        let (on_right_side, lowered) = (main.on_right_side, main.lowered);

        let origin = self.drawer_origin(pos.y);
        let anchor = self.anchor();
        let capacity = self.capacity();
        let auto_collapse = self.settings.drawer.auto_collapse;
        let drawer = self.docks.insert_with_key(|id| {
            let kind = DrawerSystem { parent: main_id }.into();
            let mut dock = Dock::new(id, kind, origin, capacity, anchor, None);
            dock.on_right_side = on_right_side;
            dock.lowered = lowered;
            dock.auto_collapse = auto_collapse;
            dock
        });

        let tile = Icon::bare(self.alloc_icon_id(), IconRole::DrawerTile(drawer));
        let tile_id = tile.id;
        if let Err(err) = self.dock_mut(main_id)?.attach(tile, pos) {
            self.docks.remove(drawer);
            return Err(err);
        }
        self.broadcast.icon_moved(main_id, tile_id, pos);
        info!(?drawer, row = pos.y, "added drawer");
        Ok(drawer)
    }

    /// Removes a drawer and its tile. Its icons go to the current clip while
    /// it has room; the rest are detached and, if running, handed back.
    #[instrument(skip(self))]
    pub fn remove_drawer(&mut self, drawer: DockId) -> Result<Vec<Icon>, DockError> {
        let parent = self
            .dock_ref(drawer)?
            .kind()
            .parent()
            .ok_or(DockError::NotApplicable("not a drawer"))?;
        let clip = self.current_clip();
        let members: Vec<IconId> =
            self.dock_ref(drawer)?.table().members().map(|icon| icon.id).collect();

        let mut running = Vec::new();
        for id in members {
            let slot = self.find_free_slot(clip);
            let [from, to] =
                self.docks.get_disjoint_mut([drawer, clip]).ok_or(DockError::UnknownDock)?;
            if let Some(pos) = slot
                && Dock::move_between(from, to, id, pos).is_ok()
            {
                self.broadcast.icon_moved(clip, id, pos);
                continue;
            }
            let icon = from.detach(id)?;
            self.broadcast.icon_removed(drawer, id);
            if icon.is_running() {
                running.push(icon);
            }
        }

        let main = self.dock_mut(parent)?;
        let tile =
            main.table().members().find(|icon| icon.drawer() == Some(drawer)).map(|icon| icon.id);
        if let Some(tile) = tile {
            main.detach(tile)?;
            self.broadcast.icon_removed(parent, tile);
        }
        self.abandon_drag_in(drawer);
        self.docks.remove(drawer);
        info!(?drawer, handed_back = running.len(), "removed drawer");
        Ok(running)
    }

    /// Moves the main dock to the other screen edge. Drawers flip with it
    /// so they keep opening away from the edge, and clips parked on the new
    /// edge move to the one the dock left.
    #[instrument(skip(self))]
    pub fn set_dock_side(&mut self, on_right_side: bool) -> Result<(), DockError> {
        let origin = self.main_origin(on_right_side);
        let vacated = self.main_origin(!on_right_side);
        if self.dock_ref(self.main_dock)?.on_right_side == on_right_side {
            return Ok(());
        }
        let displaced: Vec<DockId> = self
            .clips
            .iter()
            .copied()
            .filter(|&clip| self.docks.get(clip).is_some_and(|dock| dock.origin() == origin))
            .collect();
        if !displaced.is_empty()
            && displaced.len() != self.clips.len()
            && !self.registry.read().is_empty()
        {
            return Err(DockError::NotApplicable("omnipresent clips are split between both edges"));
        }

        let main = self.dock_mut(self.main_dock)?;
        main.on_right_side = on_right_side;
        main.set_origin(origin);

        for (drawer, row) in self.drawers() {
            let origin = self.drawer_origin(row);
            let dock = self.dock_mut(drawer)?;
            dock.on_right_side = on_right_side;
            dock.set_origin(origin);
            let flips: Vec<Slide> = dock
                .table()
                .members()
                .map(|icon| Slide {
                    icon: icon.id,
                    from: icon.pos(),
                    to: GridPos::new(-icon.grid_x, 0),
                })
                .collect();
            reflow::apply(dock, &flips)?;
            self.publish_slides(drawer, &flips);
        }
        if !displaced.is_empty() {
            self.mirror_clips(&displaced, vacated)?;
        }
        info!(on_right_side, displaced = displaced.len(), "moved dock to the other side");
        Ok(())
    }

    /// Moves `clips` to `origin` with every icon mirrored across the
    /// anchor's column, reservations included.
    fn mirror_clips(&mut self, clips: &[DockId], origin: Point) -> Result<(), DockError> {
        {
            let mut registry = self.registry.write();
            let entries: Vec<OmnipresentEntry> = registry.iter().copied().collect();
            for entry in entries {
                registry.update(entry.icon, entry.clip, GridPos::new(-entry.pos.x, entry.pos.y));
            }
        }
        for &clip in clips {
            let dock = self.dock_mut(clip)?;
            dock.set_origin(origin);
            let flips: Vec<Slide> = dock
                .table()
                .members()
                .filter(|icon| icon.grid_x != 0)
                .map(|icon| Slide {
                    icon: icon.id,
                    from: icon.pos(),
                    to: GridPos::new(-icon.grid_x, icon.grid_y),
                })
                .collect();
            reflow::apply(dock, &flips)?;
            self.publish_slides(clip, &flips);
        }
        Ok(())
    }

    pub fn set_lowered(&mut self, dock: DockId, lowered: bool) -> Result<(), DockError> {
        self.dock_mut(dock)?.lowered = lowered;
        self.publish_visibility(dock);
        if dock == self.main_dock {
            self.mirror_lowered();
        }
        Ok(())
    }

    pub fn set_collapsed(&mut self, dock: DockId, collapsed: bool) -> Result<(), DockError> {
        self.dock_mut(dock)?.collapsed = collapsed;
        self.publish_visibility(dock);
        Ok(())
    }

    /// Drawers stack with the main dock.
    fn mirror_lowered(&mut self) {
        let Some(lowered) = self.docks.get(self.main_dock).map(|main| main.lowered) else {
            return;
        };
        for (drawer, _) in self.drawers() {
            if let Some(dock) = self.docks.get_mut(drawer)
                && dock.lowered != lowered
            {
                dock.lowered = lowered;
                self.publish_visibility(drawer);
            }
        }
    }

    pub fn set_auto_raise_lower(&mut self, dock: DockId, enabled: bool) -> Result<(), DockError> {
        let group = self.raise_group(dock);
        let target = self.dock_mut(group)?;
        target.auto_raise_lower = enabled;
        if !enabled {
            auto_visibility::disable(target, Family::RaiseLower);
        }
        Ok(())
    }

    pub fn set_auto_collapse(&mut self, dock: DockId, enabled: bool) -> Result<(), DockError> {
        let target = self.dock_mut(dock)?;
        target.auto_collapse = enabled;
        if !enabled {
            auto_visibility::disable(target, Family::Collapse);
        }
        Ok(())
    }

    /// Dock whose raise/lower timers govern `dock`: drawers follow the main
    /// dock.
    fn raise_group(&self, dock: DockId) -> DockId {
        self.docks.get(dock).and_then(|found| found.kind().parent()).unwrap_or(dock)
    }

    #[instrument(skip(self))]
    pub fn pointer_entered(&mut self, dock: DockId) -> Result<(), DockError> {
        self.dock_ref(dock)?;
        let group = self.raise_group(dock);
        let fsm = AutoVisibility { scheduler: &*self.scheduler, timing: &self.settings.timing };
        if let Some(target) = self.docks.get_mut(group) {
            fsm.enter(target, Family::RaiseLower);
        }
        if let Some(target) = self.docks.get_mut(dock) {
            fsm.enter(target, Family::Collapse);
        }
        Ok(())
    }

    /// The pointer left `dock`. `pending_enter` is the dock named by the next
    /// queued enter notification, if any: moving within one dock, or between
    /// a drawer and the main dock for raise/lower, is not leaving.
    #[instrument(skip(self))]
    pub fn pointer_left(
        &mut self,
        dock: DockId,
        pending_enter: Option<DockId>,
    ) -> Result<(), DockError> {
        self.dock_ref(dock)?;
        if pending_enter == Some(dock) {
            trace!("pointer is still inside");
            return Ok(());
        }
        let group = self.raise_group(dock);
        let same_group = pending_enter.is_some_and(|next| self.raise_group(next) == group);

        let fsm = AutoVisibility { scheduler: &*self.scheduler, timing: &self.settings.timing };
        if !same_group && let Some(target) = self.docks.get_mut(group) {
            fsm.leave(target, Family::RaiseLower);
        }
        if let Some(target) = self.docks.get_mut(dock) {
            fsm.leave(target, Family::Collapse);
        }
        Ok(())
    }

    /// Applies a timer delivered by the scheduler. Returns whether a dock's
    /// visible state changed; stale timers and removed docks are ignored.
    #[instrument(skip(self), fields(dock = ?event.dock, kind = %event.kind))]
    pub fn timer_fired(&mut self, event: TimerEvent) -> bool {
        let Some(dock) = self.docks.get_mut(event.dock) else {
            trace!("timer for a removed dock");
            return false;
        };
        let Some(changed) = auto_visibility::fired(dock, &event) else {
            return false;
        };
        if changed {
            self.publish_visibility(event.dock);
        }
        if event.dock == self.main_dock && Family::of(event.kind) == Family::RaiseLower {
            self.mirror_lowered();
        }
        changed
    }

    fn dock_entry(dock: &Dock) -> Result<DockEntry, DockError> {
        let applications = dock
            .table()
            .members()
            .filter(|icon| icon.role == IconRole::Launcher)
            .map(persist::serialize_icon)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(DockEntry {
            position: dock.origin(),
            lowered: dock.lowered,
            collapsed: dock.collapsed,
            auto_collapse: dock.auto_collapse,
            auto_raise_lower: dock.auto_raise_lower,
            attract_icons: dock.attract_icons,
            on_right_side: dock.on_right_side,
            applications,
        })
    }

    fn restore_flags(dock: &mut Dock, entry: &DockEntry) {
        dock.set_origin(entry.position);
        dock.lowered = entry.lowered;
        dock.collapsed = entry.collapsed;
        dock.auto_collapse = entry.auto_collapse;
        dock.auto_raise_lower = entry.auto_raise_lower;
        dock.attract_icons = entry.attract_icons;
        dock.on_right_side = entry.on_right_side;
    }

    pub fn export_session(&self) -> Result<SessionState, DockError> {
        let drawers = self
            .drawers()
            .into_iter()
            .map(|(drawer, row)| -> Result<DrawerEntry, DockError> {
                Ok(DrawerEntry { row, dock: Self::dock_entry(self.dock_ref(drawer)?)? })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let clips = self
            .clips
            .iter()
            .map(|&clip| Self::dock_entry(self.dock_ref(clip)?))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(SessionState {
            screen: self.screen,
            current_workspace: self.current_workspace,
            dock: Self::dock_entry(self.dock_ref(self.main_dock)?)?,
            drawers,
            clips,
        })
    }

    /// Rebuilds an engine from saved state. Entries that no longer fit are
    /// repaired with a warning rather than failing the whole restore.
    pub fn import_session(settings: Settings, state: &SessionState) -> Self {
        let (engine, issues) = Self::restore(settings, state);
        for issue in &issues {
            warn!(%issue, "repaired saved session");
        }
        engine
    }

    /// Rebuilds an engine only if the saved state needs no repair.
    pub fn import_session_strict(
        settings: Settings,
        state: &SessionState,
    ) -> Result<Self, RestoreIssue> {
        let (engine, issues) = Self::restore(settings, state);
        match issues.into_iter().next() {
            Some(issue) => Err(issue),
            None => Ok(engine),
        }
    }

    fn restore(settings: Settings, state: &SessionState) -> (Self, Vec<RestoreIssue>) {
        let mut issues = Vec::new();
        let mut engine = DockEngine::new(settings, state.screen);
        let main = engine.main_dock;
        if let Some(dock) = engine.docks.get_mut(main) {
            Self::restore_flags(dock, &state.dock);
        }
        while engine.clips.len() < state.clips.len() {
            engine.push_clip();
        }

        let mut placements: Vec<(DockId, &DockEntry)> = vec![(main, &state.dock)];
        for entry in &state.drawers {
            match engine.add_drawer(Some(entry.row)) {
                Ok(drawer) => {
                    if let Some(dock) = engine.docks.get_mut(drawer) {
                        Self::restore_flags(dock, &entry.dock);
                    }
                    placements.push((drawer, &entry.dock));
                }
                Err(err) => issues.push(RestoreIssue::Drawer { row: entry.row, err }),
            }
        }
        for (&clip, entry) in engine.clips.iter().zip(&state.clips) {
            if let Some(dock) = engine.docks.get_mut(clip) {
                Self::restore_flags(dock, entry);
            }
            placements.push((clip, entry));
        }

        let mut omnipresent = Vec::new();
        for (dock, entry) in placements {
            for saved in &entry.applications {
                let id = engine.alloc_icon_id();
                let icon = persist::restore_icon(saved, id);
                let Some(target) = engine.docks.get_mut(dock) else { continue };
                match target.attach(icon, saved.position) {
                    Ok(()) if saved.omnipresent => omnipresent.push((id, saved.position)),
                    Ok(()) => {}
                    Err(err) => issues.push(RestoreIssue::Icon {
                        name: saved.name.clone(),
                        pos: saved.position,
                        err,
                    }),
                }
            }
            if let Some(target) = engine.docks.get_mut(dock)
                && target.kind().is_drawer()
            {
                match reflow::consolidate(target) {
                    Ok(slides) if slides.is_empty() => {}
                    Ok(_) => issues.push(RestoreIssue::DrawerHoles { dock }),
                    Err(err) => issues.push(RestoreIssue::Compaction { dock, err }),
                }
            }
        }
        for (id, pos) in omnipresent {
            if let Err(err) = engine.set_omnipresent(id, true) {
                issues.push(RestoreIssue::Omnipresent { pos, err });
            }
        }
        if state.current_workspace >= engine.clips.len() {
            issues.push(RestoreIssue::Workspace(state.current_workspace));
        }
        engine.current_workspace = state.current_workspace.min(engine.clips.len() - 1);
        debug!(docks = engine.docks.len(), repairs = issues.len(), "restored session");
        (engine, issues)
    }

    fn read_session(path: PathBuf) -> anyhow::Result<SessionState> {
        let mut buf = String::new();
        File::open(path)?.read_to_string(&mut buf)?;
        Ok(ron::from_str(&buf)?)
    }

    pub fn load(path: PathBuf, settings: Settings) -> anyhow::Result<Self> {
        Ok(Self::import_session(settings, &Self::read_session(path)?))
    }

    /// Loads a session and fails on the first entry that would need repair.
    pub fn load_strict(path: PathBuf, settings: Settings) -> anyhow::Result<Self> {
        Ok(Self::import_session_strict(settings, &Self::read_session(path)?)?)
    }

    pub fn save(&self, path: PathBuf) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(path)?.write_all(self.serialize_to_string()?.as_bytes())?;
        Ok(())
    }

    pub fn serialize_to_string(&self) -> anyhow::Result<String> {
        let state = self.export_session()?;
        Ok(ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::default())?)
    }

    /// Checks every dock's tables plus the cross-dock rules: drawer tiles
    /// point at live drawers, and omnipresent icons are registered and
    /// their cells are free in every other clip.
    pub fn check_invariants(&self) -> Result<(), DockError> {
        for dock in self.docks.values() {
            dock.check_invariants()?;
        }
        for (drawer, row) in self.drawers() {
            if self.dock_ref(drawer).map(|dock| dock.kind().parent()) != Ok(Some(self.main_dock)) {
                return Err(DockError::invariant(format!("tile on row {row} has no drawer")));
            }
        }

        let registry = self.registry.read();
        for entry in registry.iter() {
            match self.dock_ref(entry.clip)?.icon(entry.icon) {
                Some(icon) if icon.omnipresent && icon.pos() == entry.pos => {}
                _ => {
                    return Err(DockError::invariant(format!(
                        "omnipresent icon {} is not where the registry says",
                        entry.icon
                    )));
                }
            }
            for &clip in self.clips.iter().filter(|&&clip| clip != entry.clip) {
                if self.dock_ref(clip)?.table().at(entry.pos).is_some() {
                    return Err(DockError::invariant(format!(
                        "cell {} reserved for {} is taken in another clip",
                        entry.pos, entry.icon
                    )));
                }
            }
        }
        for &clip in &self.clips {
            let stray = self
                .dock_ref(clip)?
                .icons()
                .find(|icon| icon.omnipresent && !registry.contains(icon.id))
                .map(|icon| icon.id);
            if let Some(icon) = stray {
                return Err(DockError::invariant(format!(
                    "icon {icon} is omnipresent but unregistered"
                )));
            }
        }
        Ok(())
    }

    fn dock_label(&self, dock: &Dock) -> String {
        let mut label = match dock.kind() {
            DockKind::MainDock(_) => "dock".to_string(),
            DockKind::Clip(clip) if clip.workspace == self.current_workspace => {
                format!("clip {} (current)", clip.workspace)
            }
            DockKind::Clip(clip) => format!("clip {}", clip.workspace),
            DockKind::Drawer(_) => "drawer".to_string(),
        };
        label += &format!(" at {} [{}/{}]", dock.origin(), dock.occupied_count(), dock.capacity());
        if dock.lowered {
            label.push_str(" lowered");
        }
        if dock.collapsed {
            label.push_str(" collapsed");
        }
        label
    }

    fn dock_tree(&self, dock: &Dock) -> Tree {
        let mut icons: Vec<&Icon> = dock.table().members().collect();
        icons.sort_by_key(|icon| (icon.grid_y, icon.grid_x));
        let children = icons
            .into_iter()
            .map(|icon| match icon.drawer().and_then(|drawer| self.docks.get(drawer)) {
                Some(drawer) => match self.dock_tree(drawer) {
                    Tree::Node(label, children) => {
                        Tree::Node(format!("{} {label}", icon.pos()), children)
                    }
                    leaf => leaf,
                },
                None => {
                    let mark = if icon.omnipresent { " *" } else { "" };
                    Tree::Leaf(vec![format!("{} {}{mark}", icon.pos(), icon.label())])
                }
            })
            .collect();
        Tree::Node(self.dock_label(dock), children)
    }

    pub fn draw_tree(&self) -> String {
        let mut children = Vec::new();
        if let Some(main) = self.docks.get(self.main_dock) {
            children.push(self.dock_tree(main));
        }
        children.extend(
            self.clips.iter().filter_map(|&id| self.docks.get(id)).map(|clip| self.dock_tree(clip)),
        );
        let screen = format!("screen {}x{}", self.screen.width, self.screen.height);
        let tree = Tree::Node(screen, children);

        let mut out = String::new();
        if let Err(err) = ascii_tree::write_tree(&mut out, &tree) {
            warn!(%err, "could not draw dock tree");
        }
        out
    }

    pub fn debug_tree(&self) { debug!("Tree\n{}", self.draw_tree().trim()); }

    fn abandon_drag_in(&mut self, dock: DockId) {
        if self.drag.as_ref().is_some_and(|session| session.involves(dock)) {
            debug!(?dock, "dock went away under a drag");
            self.drag = None;
        }
    }
}
