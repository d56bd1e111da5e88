// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session registry (C6): maps app slugs, session ids and route keys to
//! live sessions; factory that picks the right backend from an `AppEntry`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;

use crate::config::AppEntry;
use crate::identity::{RouteKey, SessionId};

use super::app::AppSession;
use super::terminal::TerminalSession;
use super::{Connector, Session};

const CLOSE_ALL_DEADLINE: Duration = Duration::from_secs(5);

struct Maps {
    apps_by_slug: HashMap<String, AppEntry>,
    sessions: HashMap<SessionId, Arc<Session>>,
    routes: HashMap<RouteKey, SessionId>,
}

/// Registry of sessions by session id and by route key (§4.6). Map
/// operations are short and protected by a single mutex; session creation
/// and startup happen outside the lock.
pub struct SessionManager {
    maps: Mutex<Maps>,
}

impl SessionManager {
    pub fn new(apps: Vec<AppEntry>) -> Self {
        let apps_by_slug = apps.into_iter().map(|a| (a.slug.clone(), a)).collect();
        Self {
            maps: Mutex::new(Maps { apps_by_slug, sessions: HashMap::new(), routes: HashMap::new() }),
        }
    }

    pub async fn app_entry(&self, slug: &str) -> Option<AppEntry> {
        self.maps.lock().await.apps_by_slug.get(slug).cloned()
    }

    /// Resolve the `AppEntry` for `slug`, construct the matching session
    /// kind (C5 if `terminal`, else C4), and register it under both maps.
    /// Does *not* start it — construction already spawns the backend, but
    /// the caller is responsible for binding a real connector first.
    pub async fn new_session(
        &self,
        route_key: RouteKey,
        session_id: SessionId,
        slug: &str,
        cols: u16,
        rows: u16,
        connector: Connector,
    ) -> anyhow::Result<Arc<Session>> {
        let entry = self
            .app_entry(slug)
            .await
            .ok_or_else(|| anyhow::anyhow!("no app configured for slug {slug}"))?;

        let session = if entry.terminal {
            Session::Terminal(TerminalSession::spawn(
                session_id.clone(),
                &entry.command,
                &entry.working_directory,
                cols,
                rows,
                connector,
            )?)
        } else {
            Session::App(AppSession::spawn(
                session_id.clone(),
                &entry.command,
                &entry.working_directory,
                cols,
                rows,
                connector,
            )?)
        };

        let session = Arc::new(session);

        let mut maps = self.maps.lock().await;
        maps.sessions.insert(session_id.clone(), Arc::clone(&session));
        maps.routes.insert(route_key, session_id);

        Ok(session)
    }

    pub async fn get_session_by_route_key(&self, route_key: &RouteKey) -> Option<Arc<Session>> {
        let maps = self.maps.lock().await;
        let id = maps.routes.get(route_key)?;
        maps.sessions.get(id).cloned()
    }

    pub async fn remove_route(&self, route_key: &RouteKey) {
        self.maps.lock().await.routes.remove(route_key);
    }

    /// Close every live session in parallel, bounded by a single shutdown
    /// deadline (§4.6, §5).
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = {
            let maps = self.maps.lock().await;
            maps.sessions.values().cloned().collect()
        };

        let closes = sessions.iter().map(|s| s.close());
        let _ = tokio::time::timeout(CLOSE_ALL_DEADLINE, futures_util::future::join_all(closes)).await;

        let mut maps = self.maps.lock().await;
        maps.sessions.clear();
        maps.routes.clear();
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
