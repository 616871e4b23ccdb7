//! Email layouts rendered with askama

use std::collections::HashMap;

use askama::Template;
use serde_json::Value;

use crate::domain::email::{errors::RenderError, RenderData, Renderer};

/// Renders a layout from its data context
pub type LayoutFn = fn(&RenderData) -> Result<String, askama::Error>;

/// Name of the bundled layout
pub const MESSAGE_LAYOUT: &str = "emails/message";

/// A plain message: a title and a body of text
#[derive(Debug, Template)]
#[template(path = "emails/message.html")]
pub struct MessageTemplate {
    /// The heading, also used as the document title
    pub title: String,

    /// The message text
    pub body: String,
}

impl MessageTemplate {
    /// Builds the template from the `title` and `body` render data entries
    pub fn from_data(data: &RenderData) -> Self {
        Self {
            title: text(data, "title"),
            body: text(data, "body"),
        }
    }
}

fn text(data: &RenderData, key: &str) -> String {
    match data.get(key) {
        Some(Value::String(value)) => value.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn render_message(data: &RenderData) -> Result<String, askama::Error> {
    MessageTemplate::from_data(data).render()
}

/// A [`Renderer`] backed by named askama layouts.
///
/// CSS is inlined into the rendered HTML unless disabled, since most mail
/// clients ignore `<style>` blocks.
#[derive(Debug, Clone)]
pub struct LayoutRenderer {
    layouts: HashMap<String, LayoutFn>,
    inline_css: bool,
}

impl LayoutRenderer {
    /// A renderer without any layout
    pub fn empty() -> Self {
        Self {
            layouts: HashMap::new(),
            inline_css: true,
        }
    }

    /// Registers a layout under `name`
    pub fn register(&mut self, name: impl Into<String>, layout: LayoutFn) -> &mut Self {
        self.layouts.insert(name.into(), layout);
        self
    }

    /// Enables or disables CSS inlining
    pub fn inline_css(mut self, enabled: bool) -> Self {
        self.inline_css = enabled;
        self
    }
}

impl Default for LayoutRenderer {
    fn default() -> Self {
        let mut renderer = Self::empty();
        renderer.register(MESSAGE_LAYOUT, render_message);
        renderer
    }
}

impl Renderer for LayoutRenderer {
    fn render(&self, layout: &str, data: &RenderData) -> Result<String, RenderError> {
        let render = self
            .layouts
            .get(layout)
            .ok_or_else(|| RenderError::UnknownLayout(layout.to_string()))?;

        let html = render(data)?;

        if !self.inline_css {
            return Ok(html);
        }

        Ok(css_inline::inline(&html)?)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    fn data() -> RenderData {
        RenderData::from_iter([
            ("title".to_string(), json!("Welcome")),
            ("body".to_string(), json!("Hello <Ada>")),
        ])
    }

    #[test]
    fn test_render_message_layout() -> TestResult {
        let renderer = LayoutRenderer::default().inline_css(false);

        let html = renderer.render(MESSAGE_LAYOUT, &data())?;

        assert!(html.contains("<h1>Welcome</h1>"));
        assert!(html.contains("Hello &lt;Ada&gt;"));

        Ok(())
    }

    #[test]
    fn test_render_inlines_css() -> TestResult {
        let renderer = LayoutRenderer::default();

        let html = renderer.render(MESSAGE_LAYOUT, &data())?;

        assert!(html.contains("<h1 style="));

        Ok(())
    }

    #[test]
    fn test_render_unknown_layout() {
        let renderer = LayoutRenderer::default();

        let result = renderer.render("emails/missing", &data());

        assert!(matches!(result, Err(RenderError::UnknownLayout(name)) if name == "emails/missing"));
    }

    #[test]
    fn test_non_string_values_are_displayed() {
        let template = MessageTemplate::from_data(&RenderData::from_iter([(
            "title".to_string(),
            json!(3),
        )]));

        assert_eq!(template.title, "3");
        assert_eq!(template.body, "");
    }
}
