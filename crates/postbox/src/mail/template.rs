use std::{collections::HashMap, error::Error, fmt};

use askama::Template;
use serde_json::Value;

use super::message::{DEFAULT_TEMPLATE, DataMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Html,
    Plain,
}

impl Format {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Html => ".html",
            Self::Plain => ".plain",
        }
    }

    pub fn file_name(self, template: &str) -> String {
        format!("{template}{}", self.suffix())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("template {0} does not exist")]
    NotFound(String),
    #[error("failed to render template {template}: {source}")]
    Render {
        template: String,
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
}

/// A source of email templates.
///
/// Every template name refers to a pair: one variant per [`Format`]. The only
/// value a template can see is the [`DataMap`].
pub trait TemplateStore: Send + Sync + 'static {
    fn render(
        &self,
        template: &str,
        format: Format,
        data: &DataMap,
    ) -> impl Future<Output = Result<String, TemplateError>> + Send;
}

pub type RenderFn = fn(&DataMap) -> askama::Result<String>;

#[derive(Debug, Clone, Copy)]
pub struct TemplatePair {
    pub html: RenderFn,
    pub plain: RenderFn,
}

/// Template pairs compiled into the binary.
#[derive(Debug, Clone)]
pub struct EmbeddedTemplates {
    templates: HashMap<String, TemplatePair>,
}

impl EmbeddedTemplates {
    pub fn empty() -> Self {
        Self {
            templates: HashMap::new(),
        }
    }

    pub fn with_template(mut self, name: impl Into<String>, pair: TemplatePair) -> Self {
        self.templates.insert(name.into(), pair);
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }
}

impl Default for EmbeddedTemplates {
    fn default() -> Self {
        Self::empty().with_template(
            DEFAULT_TEMPLATE,
            TemplatePair {
                html: |data| {
                    MailHtml {
                        message: Payload::new(data.message()),
                    }
                    .render()
                },
                plain: |data| {
                    MailPlain {
                        message: Payload::new(data.message()),
                    }
                    .render()
                },
            },
        )
    }
}

impl TemplateStore for EmbeddedTemplates {
    async fn render(
        &self,
        template: &str,
        format: Format,
        data: &DataMap,
    ) -> Result<String, TemplateError> {
        let pair = self
            .templates
            .get(template)
            .ok_or_else(|| TemplateError::NotFound(format.file_name(template)))?;

        let render = match format {
            Format::Html => pair.html,
            Format::Plain => pair.plain,
        };

        render(data).map_err(|error| TemplateError::Render {
            template: format.file_name(template),
            source: Box::new(error),
        })
    }
}

static NULL: Value = Value::Null;

/// Template-facing view of the message payload.
///
/// Strings print without quotes, `null` prints nothing and anything else
/// prints as JSON.
#[derive(Debug, Clone, Copy)]
pub struct Payload<'a>(&'a Value);

impl<'a> Payload<'a> {
    pub fn new(value: &'a Value) -> Self {
        Self(value)
    }

    pub fn field(&self, key: &str) -> Payload<'a> {
        Payload(self.0.get(key).unwrap_or(&NULL))
    }

    pub fn is_present(&self) -> bool {
        !self.0.is_null()
    }
}

impl fmt::Display for Payload<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Value::Null => Ok(()),
            Value::String(string) => f.write_str(string),
            other => write!(f, "{other}"),
        }
    }
}

#[derive(Template)]
#[template(path = "mail.html")]
struct MailHtml<'a> {
    message: Payload<'a>,
}

#[derive(Template)]
#[template(path = "mail.plain", escape = "none")]
struct MailPlain<'a> {
    message: Payload<'a>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn default_pair_renders_both_formats() {
        let templates = EmbeddedTemplates::default();
        let data = DataMap::wrap(json!("Your order has shipped"));

        let html = templates
            .render(DEFAULT_TEMPLATE, Format::Html, &data)
            .await
            .unwrap();
        let plain = templates
            .render(DEFAULT_TEMPLATE, Format::Plain, &data)
            .await
            .unwrap();

        assert!(html.contains("<p>Your order has shipped</p>"));
        assert!(html.contains("class=\"content\""));
        assert_eq!(plain.trim(), "Your order has shipped");
    }

    #[tokio::test]
    async fn html_variant_escapes_the_payload() {
        let templates = EmbeddedTemplates::default();
        let data = DataMap::wrap(json!("<script>alert(1)</script>"));

        let html = templates
            .render(DEFAULT_TEMPLATE, Format::Html, &data)
            .await
            .unwrap();
        let plain = templates
            .render(DEFAULT_TEMPLATE, Format::Plain, &data)
            .await
            .unwrap();

        assert!(!html.contains("<script>"));
        assert_eq!(plain.trim(), "<script>alert(1)</script>");
    }

    #[tokio::test]
    async fn missing_template_is_not_found() {
        let templates = EmbeddedTemplates::default();
        let error = templates
            .render("welcome", Format::Html, &DataMap::wrap(Value::Null))
            .await
            .unwrap_err();

        assert!(matches!(error, TemplateError::NotFound(ref name) if name == "welcome.html"));
    }

    #[tokio::test]
    async fn registered_pairs_are_looked_up_by_name() {
        let templates = EmbeddedTemplates::empty().with_template(
            "welcome",
            TemplatePair {
                html: |data| Ok(format!("<h1>{}</h1>", Payload::new(data.message()).field("name"))),
                plain: |data| Ok(format!("Welcome {}", Payload::new(data.message()).field("name"))),
            },
        );
        let data = DataMap::wrap(json!({ "name": "Ada" }));

        assert!(!templates.contains(DEFAULT_TEMPLATE));
        assert_eq!(
            templates.render("welcome", Format::Html, &data).await.unwrap(),
            "<h1>Ada</h1>"
        );
        assert_eq!(
            templates.render("welcome", Format::Plain, &data).await.unwrap(),
            "Welcome Ada"
        );
    }

    #[test]
    fn payload_display() {
        assert_eq!(Payload::new(&Value::Null).to_string(), "");
        assert_eq!(Payload::new(&json!("text")).to_string(), "text");
        assert_eq!(Payload::new(&json!(42)).to_string(), "42");
        assert_eq!(Payload::new(&json!({ "a": 1 })).field("a").to_string(), "1");
        assert!(!Payload::new(&json!({ "a": 1 })).field("b").is_present());
    }

    #[test]
    fn file_names_use_format_suffix() {
        assert_eq!(Format::Html.file_name("mail"), "mail.html");
        assert_eq!(Format::Plain.file_name("mail"), "mail.plain");
    }
}
