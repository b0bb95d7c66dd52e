//! Tray menu built from the core `MenuModel`, plus the presenter that keeps
//! the widgets and the icon in sync with state changes.

use std::collections::HashMap;

use log::{debug, warn};
use muda::{Menu, MenuId, MenuItem, PredefinedMenuItem};
use tray_icon::{Icon, TrayIcon};
use vpn_indicator_core::aggregator::Snapshot;
use vpn_indicator_core::menu::{EntryId, MenuModel};
use vpn_indicator_core::monitor::ServiceAction;
use vpn_indicator_core::notifier::ChangeEvent;
use vpn_indicator_core::platform::StatePresenter;
use vpn_indicator_core::state::ConnectionStatus;

#[derive(Debug, Clone)]
pub enum MenuAction {
    Refresh,
    Control(String, ServiceAction),
    Wake(String),
    OpenConfig,
    Quit,
}

pub struct MenuHandles {
    pub items: HashMap<EntryId, MenuItem>,
    pub actions: HashMap<MenuId, MenuAction>,
}

pub fn build_menu(model: &MenuModel) -> (Menu, MenuHandles) {
    let menu = Menu::new();
    let mut items = HashMap::new();
    let mut actions = HashMap::new();
    let mut previous_group = None;

    for (id, entry) in model.entries() {
        let group = group_of(id);
        if previous_group.is_some_and(|g| g != group) {
            append_separator(&menu);
        }
        previous_group = Some(group);

        let item = MenuItem::new(&entry.label, entry.enabled, None);
        if let Err(e) = menu.append(&item) {
            debug!("failed to append menu item: {e}");
        }
        actions.insert(item.id().clone(), action_for(id));
        items.insert(id.clone(), item);
    }

    append_separator(&menu);
    for (label, action) in [
        ("Open config folder", MenuAction::OpenConfig),
        ("Exit VPN Indicator", MenuAction::Quit),
    ] {
        let item = MenuItem::new(label, true, None);
        if let Err(e) = menu.append(&item) {
            debug!("failed to append menu item: {e}");
        }
        actions.insert(item.id().clone(), action);
    }

    (menu, MenuHandles { items, actions })
}

fn group_of(id: &EntryId) -> u8 {
    match id {
        EntryId::Status => 0,
        EntryId::Connect(_) | EntryId::Disconnect(_) | EntryId::Reconnect(_) => 1,
        EntryId::Wake(_) => 2,
    }
}

fn action_for(id: &EntryId) -> MenuAction {
    match id {
        EntryId::Status => MenuAction::Refresh,
        EntryId::Connect(unit) => MenuAction::Control(unit.clone(), ServiceAction::Start),
        EntryId::Disconnect(unit) => MenuAction::Control(unit.clone(), ServiceAction::Stop),
        EntryId::Reconnect(unit) => MenuAction::Control(unit.clone(), ServiceAction::Restart),
        EntryId::Wake(name) => MenuAction::Wake(name.clone()),
    }
}

fn append_separator(menu: &Menu) {
    if let Err(e) = menu.append(&PredefinedMenuItem::separator()) {
        debug!("failed to append separator: {e}");
    }
}

pub struct StatusIcons {
    pub connected: Icon,
    pub connecting: Icon,
    pub disconnected: Icon,
}

impl StatusIcons {
    fn for_status(&self, status: ConnectionStatus) -> Icon {
        match status {
            ConnectionStatus::Connected => self.connected.clone(),
            ConnectionStatus::Connecting => self.connecting.clone(),
            ConnectionStatus::Disconnected => self.disconnected.clone(),
        }
    }
}

/// Renders state changes onto the tray icon and its menu items.
pub struct TrayPresenter {
    model: MenuModel,
    items: HashMap<EntryId, MenuItem>,
    tray_icon: TrayIcon,
    icons: StatusIcons,
}

impl TrayPresenter {
    pub fn new(
        model: MenuModel,
        items: HashMap<EntryId, MenuItem>,
        tray_icon: TrayIcon,
        icons: StatusIcons,
    ) -> Self {
        Self {
            model,
            items,
            tray_icon,
            icons,
        }
    }
}

impl StatePresenter for TrayPresenter {
    fn on_state_changed(&mut self, change: &ChangeEvent, snapshot: &Snapshot) {
        debug!("Refreshing menu");

        for id in self.model.apply(change, snapshot) {
            let (Some(item), Some(entry)) = (self.items.get(&id), self.model.get(&id)) else {
                continue;
            };
            item.set_text(&entry.label);
            item.set_enabled(entry.enabled);
        }

        if let ChangeEvent::Status(status) = change {
            if let Err(e) = self.tray_icon.set_icon(Some(self.icons.for_status(*status))) {
                warn!("failed to update tray icon: {e}");
            }
            let tooltip = format!("VPN {}", status.as_str().to_lowercase());
            if let Err(e) = self.tray_icon.set_tooltip(Some(tooltip)) {
                warn!("failed to update tooltip: {e}");
            }
        }
    }
}
