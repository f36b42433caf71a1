//! In-memory store for published documents

use chrono::Utc;
use dashmap::DashMap;
use forge_types::PublishedSite;
use tracing::debug;

pub const DEFAULT_TITLE: &str = "Untitled Project";

pub const ANONYMOUS_USER: &str = "anonymous";

/// Published documents keyed by id
#[derive(Default)]
pub struct PublishStore {
    sites: DashMap<String, PublishedSite>,
}

impl PublishStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a document and return its record
    pub fn publish(&self, code: String, title: Option<String>, user_id: Option<String>) -> PublishedSite {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_string());
        let user_id = user_id
            .filter(|u| !u.trim().is_empty())
            .unwrap_or_else(|| ANONYMOUS_USER.to_string());

        let site = PublishedSite {
            id: uuid::Uuid::new_v4().to_string(),
            code,
            title,
            user_id,
            created_at: Utc::now(),
            views: 0,
        };
        debug!("Published {} ({} bytes)", site.id, site.code.len());
        self.sites.insert(site.id.clone(), site.clone());
        site
    }

    /// Fetch a document without counting a view
    pub fn get(&self, id: &str) -> Option<PublishedSite> {
        self.sites.get(id).map(|entry| entry.clone())
    }

    /// Fetch a document and count the view
    pub fn view(&self, id: &str) -> Option<PublishedSite> {
        self.sites.get_mut(id).map(|mut entry| {
            entry.views += 1;
            entry.clone()
        })
    }

    pub fn len(&self) -> usize {
        self.sites.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }
}
