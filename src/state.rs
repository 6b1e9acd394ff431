//! Shared state handed to every handler.

use std::sync::Arc;

use crate::application::services::{LinkService, OwnerResolver};

#[derive(Clone)]
pub struct AppState {
    pub link_service: Arc<LinkService>,
    pub owner_resolver: Arc<dyn OwnerResolver>,
}

impl AppState {
    pub fn new(link_service: Arc<LinkService>, owner_resolver: Arc<dyn OwnerResolver>) -> Self {
        Self {
            link_service,
            owner_resolver,
        }
    }
}
