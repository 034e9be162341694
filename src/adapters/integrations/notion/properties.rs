//! Property conversion in both directions.

use super::blocks::truncate;
use crate::domain::{PropertyInput, PropertyValue};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;

fn plain_text(rich: Option<&Value>) -> String {
    rich.and_then(Value::as_array)
        .map(|runs| {
            runs.iter()
                .filter_map(|r| r.get("plain_text").and_then(Value::as_str))
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn name_of(v: Option<&Value>) -> Option<String> {
    v.and_then(|o| o.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn str_of(v: Option<&Value>) -> Option<String> {
    v.and_then(Value::as_str).map(str::to_string)
}

fn ids(v: Option<&Value>) -> Vec<String> {
    v.and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

/// Reads one property object (`{"type": ..., <type>: ...}`).
pub fn parse_value(prop: &Value) -> PropertyValue {
    let kind = prop.get("type").and_then(Value::as_str).unwrap_or("");
    let body = prop.get(kind);
    match kind {
        "title" => PropertyValue::Title(plain_text(body)),
        "rich_text" => PropertyValue::RichText(plain_text(body)),
        "number" => PropertyValue::Number(body.and_then(Value::as_f64)),
        "select" => PropertyValue::Select(name_of(body)),
        "status" => PropertyValue::Status(name_of(body)),
        "multi_select" => PropertyValue::MultiSelect(
            body.and_then(Value::as_array)
                .map(|opts| opts.iter().filter_map(|o| name_of(Some(o))).collect())
                .unwrap_or_default(),
        ),
        "date" => PropertyValue::Date {
            start: str_of(body.and_then(|d| d.get("start"))),
            end: str_of(body.and_then(|d| d.get("end"))),
        },
        "people" => PropertyValue::People(ids(body)),
        "relation" => PropertyValue::Relation(ids(body)),
        "url" => PropertyValue::Url(str_of(body)),
        "email" => PropertyValue::Email(str_of(body)),
        "checkbox" => PropertyValue::Checkbox(body.and_then(Value::as_bool).unwrap_or(false)),
        "formula" => parse_formula(body),
        other => PropertyValue::Unsupported(other.to_string()),
    }
}

fn parse_formula(body: Option<&Value>) -> PropertyValue {
    let Some(f) = body else {
        return PropertyValue::Unsupported("formula".to_string());
    };
    match f.get("type").and_then(Value::as_str) {
        Some("string") => PropertyValue::RichText(str_of(f.get("string")).unwrap_or_default()),
        Some("number") => PropertyValue::Number(f.get("number").and_then(Value::as_f64)),
        Some("boolean") => {
            PropertyValue::Checkbox(f.get("boolean").and_then(Value::as_bool).unwrap_or(false))
        }
        Some("date") => PropertyValue::Date {
            start: str_of(f.get("date").and_then(|d| d.get("start"))),
            end: str_of(f.get("date").and_then(|d| d.get("end"))),
        },
        _ => PropertyValue::Unsupported("formula".to_string()),
    }
}

pub fn parse_properties(props: Option<&Value>) -> BTreeMap<String, PropertyValue> {
    props
        .and_then(Value::as_object)
        .map(|m| m.iter().map(|(k, v)| (k.clone(), parse_value(v))).collect())
        .unwrap_or_default()
}

/// Property-item endpoint result. Paginated types (title, rich text, people,
/// relation) come back as a `list` of single items and are merged here.
pub fn parse_property_item(item: &Value) -> PropertyValue {
    if item.get("object").and_then(Value::as_str) != Some("list") {
        return parse_value(item);
    }
    let results = item
        .get("results")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    let kind = item
        .get("property_item")
        .and_then(|p| p.get("type"))
        .and_then(Value::as_str)
        .unwrap_or("");
    match kind {
        "title" | "rich_text" => {
            let text: String = results
                .iter()
                .filter_map(|r| r.get(kind))
                .filter_map(|t| t.get("plain_text").and_then(Value::as_str))
                .collect();
            if kind == "title" {
                PropertyValue::Title(text)
            } else {
                PropertyValue::RichText(text)
            }
        }
        "people" | "relation" => {
            let ids: Vec<String> = results
                .iter()
                .filter_map(|r| r.get(kind))
                .filter_map(|v| v.get("id").and_then(Value::as_str))
                .map(str::to_string)
                .collect();
            if kind == "people" {
                PropertyValue::People(ids)
            } else {
                PropertyValue::Relation(ids)
            }
        }
        other => PropertyValue::Unsupported(other.to_string()),
    }
}

fn text_value(content: &str) -> Value {
    json!([{ "type": "text", "text": { "content": truncate(content) } }])
}

pub fn input_value(input: &PropertyInput) -> Value {
    match input {
        PropertyInput::Title(t) => json!({ "title": text_value(t) }),
        PropertyInput::RichText(t) => json!({ "rich_text": text_value(t) }),
        PropertyInput::Select(s) => json!({ "select": { "name": s } }),
        PropertyInput::Status(s) => json!({ "status": { "name": s } }),
        PropertyInput::MultiSelect(names) => json!({
            "multi_select": names.iter().map(|n| json!({ "name": n })).collect::<Vec<_>>()
        }),
        PropertyInput::Date { start, end } => json!({ "date": { "start": start, "end": end } }),
        PropertyInput::People(ids) => json!({
            "people": ids.iter().map(|id| json!({ "id": id })).collect::<Vec<_>>()
        }),
        PropertyInput::Url(u) => json!({ "url": u }),
        PropertyInput::Number(n) => json!({ "number": n }),
        PropertyInput::Checkbox(b) => json!({ "checkbox": b }),
    }
}

pub fn input_map(props: &BTreeMap<String, PropertyInput>) -> Value {
    let map: Map<String, Value> = props
        .iter()
        .map(|(k, v)| (k.clone(), input_value(v)))
        .collect();
    Value::Object(map)
}

/// Title of a page: the one property whose type is `title`.
pub fn page_title(props: &BTreeMap<String, PropertyValue>) -> Option<String> {
    props.values().find_map(|v| match v {
        PropertyValue::Title(t) if !t.is_empty() => Some(t.clone()),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_common_types() {
        let props = json!({
            "Task Name": { "type": "title", "title": [{ "plain_text": "Ship " }, { "plain_text": "QR" }] },
            "Priority": { "type": "select", "select": null },
            "Status": { "type": "status", "status": { "name": "In Progress" } },
            "Due": { "type": "date", "date": { "start": "2026-01-25", "end": null } },
            "Score": { "type": "formula", "formula": { "type": "number", "number": 42.0 } },
            "Files": { "type": "files", "files": [] }
        });
        let parsed = parse_properties(Some(&props));
        assert_eq!(parsed["Task Name"], PropertyValue::Title("Ship QR".into()));
        assert_eq!(parsed["Priority"], PropertyValue::Select(None));
        assert_eq!(parsed["Status"].as_text(), Some("In Progress"));
        assert_eq!(
            parsed["Due"],
            PropertyValue::Date {
                start: Some("2026-01-25".into()),
                end: None
            }
        );
        assert_eq!(parsed["Score"], PropertyValue::Number(Some(42.0)));
        assert_eq!(parsed["Files"], PropertyValue::Unsupported("files".into()));
        assert_eq!(page_title(&parsed).as_deref(), Some("Ship QR"));
    }

    #[test]
    fn test_property_item_list_merges_rich_text() {
        let item = json!({
            "object": "list",
            "results": [
                { "type": "rich_text", "rich_text": { "plain_text": "long " } },
                { "type": "rich_text", "rich_text": { "plain_text": "summary" } }
            ],
            "property_item": { "type": "rich_text" }
        });
        assert_eq!(
            parse_property_item(&item),
            PropertyValue::RichText("long summary".into())
        );
    }

    #[test]
    fn test_input_builders() {
        assert_eq!(
            input_value(&PropertyInput::Select("High".into())),
            json!({ "select": { "name": "High" } })
        );
        assert_eq!(
            input_value(&PropertyInput::Date {
                start: "2026-01-25".into(),
                end: None
            }),
            json!({ "date": { "start": "2026-01-25", "end": null } })
        );
        let title = input_value(&PropertyInput::Title("Task".into()));
        assert_eq!(title["title"][0]["text"]["content"], "Task");
    }
}
