// Local crates
use crate::{
    graylog::models::{MESSAGE_ID_FIELD, Message},
    streams::directory::{Stream, StreamDirectory},
};

// External crates
use clap::ValueEnum;
use crossterm::style::Stylize;
use serde_json::{Map, Value};
use std::io::{self, Write};

/// Fields shown in the header line when no explicit field list is requested.
const DEFAULT_HEADER_FIELDS: [&str; 4] = ["facility", "level", "source", "loggerName"];

/// Fields holding the message body, in order of preference.
const BODY_FIELDS: [&str; 2] = ["full_message", "message"];

const DISPLAY_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Header line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Header values separated by spaces
    Text,
    /// Header as a JSON object
    #[default]
    Json,
}

/// Formats messages for the terminal: a (bold) header line with metadata,
/// then the message body on its own line.
#[derive(Debug, Clone)]
pub struct MessageRenderer<'a> {
    streams: &'a StreamDirectory,
    fields: Option<Vec<String>>,
    format: OutputFormat,
    bold: bool,
}

impl<'a> MessageRenderer<'a> {
    pub fn new(
        streams: &'a StreamDirectory,
        fields: Option<Vec<String>>,
        format: OutputFormat,
        bold: bool,
    ) -> Self {
        Self {
            streams,
            fields: fields.filter(|f| !f.is_empty()),
            format,
            bold,
        }
    }

    /// Write one message.
    pub fn render<W: Write>(&self, message: &Message, out: &mut W) -> io::Result<()> {
        let header = self.header(message);
        let line = match self.format {
            OutputFormat::Text => header
                .iter()
                .map(|(_, value)| value.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            OutputFormat::Json => {
                let object: Map<String, Value> = header
                    .into_iter()
                    .map(|(key, value)| (key, Value::String(value)))
                    .collect();
                Value::Object(object).to_string()
            }
        };

        writeln!(out, "{}", emphasize(&line, self.bold))?;

        if let Some(body) = self.body(message) {
            writeln!(out, "{body}")?;
        }
        Ok(())
    }

    /// Ordered `(name, value)` pairs for the header line.
    fn header(&self, message: &Message) -> Vec<(String, String)> {
        if let Some(fields) = &self.fields {
            return fields
                .iter()
                .filter(|field| field.as_str() != MESSAGE_ID_FIELD)
                .filter_map(|field| {
                    message
                        .field(field)
                        .map(|value| (field.clone(), display_value(value)))
                })
                .collect();
        }

        let mut header = vec![(
            "timestamp".to_string(),
            message.timestamp.format(DISPLAY_TIMESTAMP_FORMAT).to_string(),
        )];

        if !message.stream_ids.is_empty() && !self.streams.is_empty() {
            let titles: Vec<&str> = message
                .stream_ids
                .iter()
                .map(|id| self.streams.get(id).map_or(id.as_str(), |s| s.title.as_str()))
                .collect();
            header.push(("streams".to_string(), format!("[{}]", titles.join(", "))));
        }

        for name in DEFAULT_HEADER_FIELDS {
            if let Some(value) = message.field(name) {
                header.push((name.to_string(), display_value(value)));
            }
        }

        header
    }

    /// Body text, only shown without an explicit field list.
    fn body(&self, message: &Message) -> Option<String> {
        if self.fields.is_some() {
            return None;
        }

        BODY_FIELDS
            .iter()
            .find_map(|name| message.field(name))
            .map(display_value)
    }
}

/// Print `Title - description` for each stream, titles in bold.
pub fn render_stream_list<'s, W, I>(streams: I, bold: bool, out: &mut W) -> io::Result<()>
where
    W: Write,
    I: IntoIterator<Item = &'s Stream>,
{
    for stream in streams {
        let title = emphasize(&stream.title, bold);
        match &stream.description {
            Some(description) => writeln!(out, "{title} - {description}")?,
            None => writeln!(out, "{title}")?,
        }
    }
    Ok(())
}

fn emphasize(text: &str, bold: bool) -> String {
    if bold {
        text.bold().to_string()
    } else {
        text.to_string()
    }
}

/// Strings are shown raw, everything else in its JSON form.
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn directory() -> StreamDirectory {
        StreamDirectory::from_streams([
            Stream {
                id: "s1".into(),
                title: "Web".into(),
                description: Some("frontend".into()),
                active: true,
            },
            Stream {
                id: "s2".into(),
                title: "Jobs".into(),
                description: None,
                active: true,
            },
        ])
    }

    fn message(fields: Value) -> Message {
        let Value::Object(fields) = fields else {
            unreachable!("test fields must be an object")
        };
        Message {
            id: "abc".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            fields,
            stream_ids: vec!["s1".into(), "unknown".into()],
        }
    }

    fn render(renderer: &MessageRenderer<'_>, message: &Message) -> String {
        let mut out = Vec::new();
        renderer.render(message, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn json_header_with_body() {
        let streams = directory();
        let renderer = MessageRenderer::new(&streams, None, OutputFormat::Json, false);
        let msg = message(json!({
            "_id": "abc",
            "source": "web-01",
            "level": 3,
            "message": "short",
            "full_message": "long body",
        }));

        let output = render(&renderer, &msg);
        let mut lines = output.lines();
        let header: Value = serde_json::from_str(lines.next().unwrap()).unwrap();

        assert_eq!(header["timestamp"], "2024-05-01 12:00:00.000000");
        assert_eq!(header["streams"], "[Web, unknown]");
        assert_eq!(header["source"], "web-01");
        assert_eq!(header["level"], "3");
        assert!(header.get("_id").is_none());
        assert_eq!(lines.next(), Some("long body"));
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn text_header_keeps_field_order() {
        let streams = directory();
        let renderer = MessageRenderer::new(&streams, None, OutputFormat::Text, false);
        let msg = message(json!({ "facility": "app", "source": "db-02", "message": "hello" }));

        assert_eq!(
            render(&renderer, &msg),
            "2024-05-01 12:00:00.000000 [Web, unknown] app db-02\nhello\n"
        );
    }

    #[test]
    fn explicit_fields_skip_id_and_body() {
        let streams = directory();
        let fields = Some(vec!["source".to_string(), "missing".to_string(), "_id".to_string()]);
        let renderer = MessageRenderer::new(&streams, fields, OutputFormat::Text, false);
        let msg = message(json!({ "_id": "abc", "source": "db-02", "message": "hello" }));

        assert_eq!(render(&renderer, &msg), "db-02\n");
    }

    #[test]
    fn bold_wraps_header_in_ansi() {
        let streams = directory();
        let renderer = MessageRenderer::new(&streams, None, OutputFormat::Text, true);
        let msg = message(json!({ "message": "hello" }));

        let output = render(&renderer, &msg);
        assert!(output.starts_with("\u{1b}["));
        assert!(output.ends_with("\nhello\n"));
    }

    #[test]
    fn stream_list_shows_descriptions() {
        let streams = directory();
        let mut out = Vec::new();
        render_stream_list(streams.list(), false, &mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "Jobs\nWeb - frontend\n");
    }
}
