//! Layout renderer contract

use std::fmt;

use serde_json::{Map, Value};

#[cfg(test)]
use mockall::mock;

use super::errors::RenderError;

/// The context a layout is rendered with
pub type RenderData = Map<String, Value>;

/// Turns a named layout and a data context into an HTML body.
pub trait Renderer: Send + Sync + fmt::Debug {
    /// Renders `layout` with `data`.
    ///
    /// # Returns
    /// The rendered HTML, or a [`RenderError`] if the layout is unknown or fails to render.
    fn render(&self, layout: &str, data: &RenderData) -> Result<String, RenderError>;
}

#[cfg(test)]
mock! {
    pub Renderer {}

    impl Renderer for Renderer {
        fn render(&self, layout: &str, data: &RenderData) -> Result<String, RenderError>;
    }
}

#[cfg(test)]
impl fmt::Debug for MockRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockRenderer").finish_non_exhaustive()
    }
}
