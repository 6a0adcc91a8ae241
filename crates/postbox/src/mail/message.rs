use std::path::PathBuf;

use serde_derive::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::settings::Sender;

pub const DEFAULT_TEMPLATE: &str = "mail";

/// Key the message payload is bound to inside every template.
pub const DATA_KEY: &str = "message";

/// A unit of outbound mail as handed to the mailer.
///
/// Empty `from`, `from_name` and `template` fields are filled in when the
/// message is sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub from: String,
    pub from_name: String,
    pub to: String,
    pub subject: String,
    pub attachments: Vec<PathBuf>,
    pub template: String,
    pub data: Value,
}

impl Message {
    pub fn new(to: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            ..Default::default()
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }

    pub fn with_attachment(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    pub fn with_sender(mut self, address: impl Into<String>, name: impl Into<String>) -> Self {
        self.from = address.into();
        self.from_name = name.into();
        self
    }

    /// Fills in the default template and the configured sender identity.
    pub fn with_defaults(mut self, sender: &Sender) -> Self {
        if self.template.is_empty() {
            self.template = DEFAULT_TEMPLATE.to_owned();
        }

        if self.from.is_empty() {
            self.from.clone_from(&sender.address);
        }

        if self.from_name.is_empty() {
            self.from_name.clone_from(&sender.name);
        }

        self
    }
}

/// The values visible to a template: the message payload under [`DATA_KEY`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DataMap(Map<String, Value>);

impl DataMap {
    pub fn wrap(data: Value) -> Self {
        let mut map = Map::with_capacity(1);
        map.insert(DATA_KEY.to_owned(), data);
        Self(map)
    }

    pub fn message(&self) -> &Value {
        self.0.get(DATA_KEY).unwrap_or(&Value::Null)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn sender() -> Sender {
        Sender {
            address: "noreply@example.com".to_owned(),
            name: "Example".to_owned(),
        }
    }

    #[test]
    fn empty_fields_take_defaults() {
        let message = Message::new("a@example.com", "Hi").with_defaults(&sender());

        assert_eq!(message.template, DEFAULT_TEMPLATE);
        assert_eq!(message.from, "noreply@example.com");
        assert_eq!(message.from_name, "Example");
    }

    #[test]
    fn explicit_fields_are_kept() {
        let message = Message::new("a@example.com", "Hi")
            .with_template("welcome")
            .with_sender("support@example.com", "Support")
            .with_defaults(&sender());

        assert_eq!(message.template, "welcome");
        assert_eq!(message.from, "support@example.com");
        assert_eq!(message.from_name, "Support");
    }

    #[test]
    fn partial_sender_is_completed_field_by_field() {
        let message = Message {
            from: "support@example.com".to_owned(),
            ..Message::new("a@example.com", "Hi")
        }
        .with_defaults(&sender());

        assert_eq!(message.from, "support@example.com");
        assert_eq!(message.from_name, "Example");
    }

    #[test]
    fn data_map_holds_only_the_payload() {
        let data = json!({ "name": "Ada", "items": [1, 2, 3] });
        let map = DataMap::wrap(data.clone());

        assert_eq!(map.len(), 1);
        assert_eq!(map.message(), &data);
        assert_eq!(serde_json::to_value(&map).unwrap(), json!({ "message": data }));
    }

    #[test]
    fn message_deserializes_with_missing_fields() {
        let message: Message =
            serde_json::from_value(json!({ "to": "a@example.com", "subject": "Hi" })).unwrap();

        assert_eq!(message, Message::new("a@example.com", "Hi"));
        assert!(message.attachments.is_empty());
        assert_eq!(message.data, Value::Null);
    }
}
