//! Subject and body rendering.
//!
//! Patterns are Handlebars templates stored on [`Template`] records, rendered
//! against a JSON context with dotted-path access (`{{object.name}}`,
//! `{{site.domain}}`, `{{recipient.email}}`).

mod admin;

pub use admin::TemplateService;

use handlebars::{Handlebars, no_escape};
use serde_json::Value;
use tracing::debug;

use crate::error::CourierResult;
use crate::models::Template;

/// Renders template patterns against a context.
///
/// Rendering is strict: a reference to a variable missing from the context is
/// an error rather than an empty string. Bodies are HTML and get escaped
/// interpolation; subjects are plain text header values and do not.
pub struct TemplateRenderer {
    html: Handlebars<'static>,
    text: Handlebars<'static>,
}

impl TemplateRenderer {
    pub fn new() -> Self {
        let mut html = Handlebars::new();
        html.set_strict_mode(true);

        let mut text = Handlebars::new();
        text.set_strict_mode(true);
        text.register_escape_fn(no_escape);

        Self { html, text }
    }

    /// Render a template's subject line.
    pub fn render_subject(&self, template: &Template, context: &Value) -> CourierResult<String> {
        debug!(template = %template.slug, "Rendering subject");
        let subject = self.text.render_template(&template.subject, context)?;
        // Header values cannot span lines
        Ok(subject.lines().map(str::trim).collect::<Vec<_>>().join(" "))
    }

    /// Render a template's HTML body. A template without a body renders empty.
    pub fn render_body(&self, template: &Template, context: &Value) -> CourierResult<String> {
        match &template.body {
            Some(body) => Ok(self.html.render_template(body, context)?),
            None => Ok(String::new()),
        }
    }

    /// Parse a template's patterns without rendering them.
    pub fn check_syntax(template: &Template) -> CourierResult<()> {
        handlebars::Template::compile(&template.subject)?;
        if let Some(body) = &template.body {
            handlebars::Template::compile(body)?;
        }
        Ok(())
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CourierError;
    use crate::models::CreateTemplate;
    use serde_json::json;

    fn template(subject: &str, body: Option<&str>) -> Template {
        Template::new(CreateTemplate {
            slug: "order-created".to_string(),
            subject: subject.to_string(),
            body: body.map(str::to_string),
        })
    }

    #[test]
    fn test_render_subject_with_dotted_path() {
        let renderer = TemplateRenderer::new();
        let context = json!({ "object": { "name": "Widget" } });

        let subject = renderer
            .render_subject(&template("Hi {{object.name}}", None), &context)
            .unwrap();
        assert_eq!(subject, "Hi Widget");
    }

    #[test]
    fn test_subject_is_not_html_escaped() {
        let renderer = TemplateRenderer::new();
        let context = json!({ "object": { "name": "Fish & Chips" } });

        let subject = renderer
            .render_subject(&template("Order: {{object.name}}", None), &context)
            .unwrap();
        assert_eq!(subject, "Order: Fish & Chips");
    }

    #[test]
    fn test_body_is_html_escaped() {
        let renderer = TemplateRenderer::new();
        let context = json!({ "object": { "name": "<b>Widget</b>" } });

        let body = renderer
            .render_body(&template("s", Some("<p>{{object.name}}</p>")), &context)
            .unwrap();
        assert_eq!(body, "<p>&lt;b&gt;Widget&lt;/b&gt;</p>");
    }

    #[test]
    fn test_missing_variable_is_an_error() {
        let renderer = TemplateRenderer::new();
        let context = json!({ "object": { "name": "Widget" } });

        let result = renderer.render_subject(&template("Hi {{order.name}}", None), &context);
        assert!(matches!(result, Err(CourierError::TemplateRender(_))));
    }

    #[test]
    fn test_malformed_template_is_an_error() {
        let renderer = TemplateRenderer::new();
        let broken = template("Hi {{#if object}}", None);

        let result = renderer.render_subject(&broken, &json!({ "object": 1 }));
        assert!(matches!(result, Err(CourierError::TemplateRender(_))));
        assert!(TemplateRenderer::check_syntax(&broken).is_err());
        assert!(TemplateRenderer::check_syntax(&template("Hi", Some("<p>{{x}}</p>"))).is_ok());
    }

    #[test]
    fn test_empty_body_renders_empty() {
        let renderer = TemplateRenderer::new();
        let body = renderer.render_body(&template("s", None), &json!({})).unwrap();
        assert!(body.is_empty());
    }
}
