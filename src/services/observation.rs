//! Wunderground `current_observation` extraction.
//!
//! Reads the leaf elements directly below `/response/current_observation`
//! into a flat name → text map, then picks out the fields the weather model
//! publishes. Absent leaves come back as empty strings; no individual field
//! is treated as an error.

use quick_xml::events::Event;
use quick_xml::Reader;
use std::collections::HashMap;
use thiserror::Error;

/// Element path of the live weather snapshot inside the response document.
pub const CURRENT_OBSERVATION_PATH: [&str; 2] = ["response", "current_observation"];

#[derive(Debug, Error)]
pub enum ObservationError {
    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),
}

/// The fields of a current observation that the weather model publishes,
/// verbatim as the provider formatted them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentObservation {
    /// `<weather>`
    pub weather: String,
    /// `<temp_c>`
    pub temp_c: String,
    /// `<feelslike_c>`
    pub feelslike_c: String,
    /// `<relative_humidity>`
    pub relative_humidity: String,
    /// `<wind_dir>`
    pub wind_dir: String,
    /// `<wind_kph>`
    pub wind_kph: String,
    /// `<icon_url>`
    pub icon_url: String,
}

impl CurrentObservation {
    fn from_fields(mut fields: HashMap<String, String>) -> Self {
        let mut take = |key: &str| fields.remove(key).unwrap_or_default();
        Self {
            weather: take("weather"),
            temp_c: take("temp_c"),
            feelslike_c: take("feelslike_c"),
            relative_humidity: take("relative_humidity"),
            wind_dir: take("wind_dir"),
            wind_kph: take("wind_kph"),
            icon_url: take("icon_url"),
        }
    }
}

/// Parse a Wunderground XML body into its current observation.
///
/// A document without a `current_observation` node yields an all-empty
/// observation.
pub fn parse_current_observation(xml: &str) -> Result<CurrentObservation, ObservationError> {
    let fields = extract_leaf_fields(xml, &CURRENT_OBSERVATION_PATH)?;
    Ok(CurrentObservation::from_fields(fields))
}

/// Collect the text of every leaf child of the first element at `path`.
///
/// Children that contain further elements (e.g. `display_location`) are
/// skipped. If a leaf name repeats, the first occurrence wins.
pub fn extract_leaf_fields(
    xml: &str,
    path: &[&str],
) -> Result<HashMap<String, String>, ObservationError> {
    let mut reader = Reader::from_str(xml);
    let mut fields = HashMap::new();

    // Open elements from the document root down to the current position.
    let mut stack: Vec<String> = Vec::new();
    // Leaf child currently being read: (name, text, has_child_elements)
    let mut current: Option<(String, String, bool)> = None;

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) => {
                let name = local_name_str(e.name().as_ref());
                if stack.len() == path.len() && at_path(&stack, path) {
                    current = Some((name.clone(), String::new(), false));
                } else if stack.len() > path.len() {
                    if let Some((_, _, nested)) = current.as_mut() {
                        *nested = true;
                    }
                }
                stack.push(name);
            }
            Ok(Event::Empty(ref e)) => {
                if stack.len() == path.len() && at_path(&stack, path) {
                    let name = local_name_str(e.name().as_ref());
                    fields.entry(name).or_insert_with(String::new);
                } else if let Some((_, _, nested)) = current.as_mut() {
                    *nested = true;
                }
            }
            Ok(Event::Text(ref e)) => {
                if stack.len() == path.len() + 1 {
                    if let Some((_, text, _)) = current.as_mut() {
                        text.push_str(&e.unescape().unwrap_or_default());
                    }
                }
            }
            Ok(Event::CData(ref e)) => {
                if stack.len() == path.len() + 1 {
                    if let Some((_, text, _)) = current.as_mut() {
                        text.push_str(&String::from_utf8_lossy(e));
                    }
                }
            }
            Ok(Event::End(_)) => {
                if stack.len() == path.len() + 1 {
                    if let Some((name, text, nested)) = current.take() {
                        if !nested {
                            fields
                                .entry(name)
                                .or_insert_with(|| text.trim().to_string());
                        }
                    }
                }
                let closing_target = stack.len() == path.len() && at_path(&stack, path);
                stack.pop();
                if closing_target {
                    // Only the first matching node is read.
                    break;
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(ObservationError::Xml(e)),
            _ => {}
        }
        buf.clear();
    }

    Ok(fields)
}

fn at_path(stack: &[String], path: &[&str]) -> bool {
    stack.len() >= path.len()
        && stack
            .iter()
            .zip(path)
            .all(|(open, expected)| open == expected)
}

/// Extract the local name from a potentially namespaced XML element name.
/// e.g. `wu:temp_c` -> `temp_c`, `temp_c` -> `temp_c`
fn local_name_str(full: &[u8]) -> String {
    let s = std::str::from_utf8(full).unwrap_or("");
    match s.rfind(':') {
        Some(pos) => s[pos + 1..].to_string(),
        None => s.to_string(),
    }
}
