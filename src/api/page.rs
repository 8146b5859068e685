//! HTML pages rendered with Handlebars. Handlebars escapes
//! everything it renders by default which matters here since the
//! page shows model output.

use std::fmt;

use anyhow::Result;
use handlebars::Handlebars;

#[derive(Debug)]
pub enum Page {
    Chat,
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

const CHAT_PAGE: &str = include_str!("../../templates/chat.html");

pub fn templates() -> Result<Handlebars<'static>> {
    let mut registry = Handlebars::new();
    registry.set_strict_mode(true);
    registry.register_template_string(&Page::Chat.to_string(), CHAT_PAGE)?;
    Ok(registry)
}
