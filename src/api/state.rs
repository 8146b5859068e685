use std::sync::Arc;

use anyhow::Result;
use handlebars::Handlebars;

use super::page;
use crate::chat::TurnCoordinator;

pub struct AppState {
    pub coordinator: Arc<TurnCoordinator>,
    // Name of the model shown on the chat page
    pub model: String,
    pub templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(coordinator: TurnCoordinator, model: &str) -> Result<Self> {
        Ok(Self {
            coordinator: Arc::new(coordinator),
            model: model.to_string(),
            templates: page::templates()?,
        })
    }
}
