//! Parsing of sectioned config file content.
//!
//! Hardware configuration files travel through the conditions database
//! as plain text values. Their format is line oriented: comment lines
//! are dropped, a line whose first token matches one of the awaited
//! section names opens that section, and every other line becomes a row
//! of the section that is currently open.

use std::collections::HashMap;

use tracing::debug;

use crate::error::{CondbError, Result};

/// One parsed section: its raw token rows plus two keyed views of them.
/// The first token of a row keys both views; `name_values` keeps the
/// second token only, `name_vectors` everything after the first.
#[derive(Debug, Clone, Default)]
pub struct ConfigSection {
    name: String,
    rows: Vec<Vec<String>>,
    name_values: HashMap<String, String>,
    name_vectors: HashMap<String, Vec<String>>,
}

impl ConfigSection {
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }
    pub fn name_values(&self) -> &HashMap<String, String> {
        &self.name_values
    }
    pub fn name_vectors(&self) -> &HashMap<String, Vec<String>> {
        &self.name_vectors
    }
}

/// Everything found while parsing one config text.
#[derive(Debug, Clone)]
pub struct ConfigParseResult {
    section_names: Vec<String>,
    found_section_names: Vec<String>,
    sections: HashMap<String, ConfigSection>,
}

impl ConfigParseResult {
    /// The section names the caller asked for.
    pub fn section_names(&self) -> &[String] {
        &self.section_names
    }
    /// The awaited names actually present, in order of appearance.
    pub fn found_section_names(&self) -> &[String] {
        &self.found_section_names
    }
    pub fn sections(&self) -> &HashMap<String, ConfigSection> {
        &self.sections
    }
    pub fn section(&self, name: &str) -> Option<&ConfigSection> {
        self.sections.get(name)
    }
}

/// A slot numbered section header, e.g. `FADC250_SLOT 3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotSection {
    full_line: String,
    name: String,
    slot_number: u32,
}

impl SlotSection {
    pub fn full_line(&self) -> &str {
        &self.full_line
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn slot_number(&self) -> u32 {
        self.slot_number
    }
}

// Comment markers differ between producers; all of them start the line.
fn content_tokens(line: &str) -> Option<Vec<String>> {
    let line = line.trim();
    if line.is_empty()
        || line.starts_with('#')
        || line.starts_with("----")
        || line.starts_with("====")
    {
        return None;
    }
    let tokens: Vec<String> = line.split_whitespace().map(str::to_owned).collect();
    if tokens.is_empty() { None } else { Some(tokens) }
}

/// Parses config content into the awaited sections. Unknown content is
/// data, not an error: lines before the first section header belong to
/// an unnamed preamble that is dropped, and a repeated section header
/// replaces the earlier section of the same name.
pub fn parse_config(content: &str, awaited_sections: &[&str]) -> ConfigParseResult {
    let mut result = ConfigParseResult {
        section_names: awaited_sections.iter().map(|name| name.to_string()).collect(),
        found_section_names: Vec::new(),
        sections: HashMap::new(),
    };
    let mut current = ConfigSection::default();
    for raw_line in content.lines() {
        let tokens = match content_tokens(raw_line) {
            Some(tokens) => tokens,
            None => continue,
        };
        if awaited_sections.contains(&tokens[0].as_str()) {
            if !current.name.is_empty() {
                result.sections.insert(current.name.clone(), current);
            }
            current = ConfigSection {
                name: tokens[0].clone(),
                ..ConfigSection::default()
            };
            result.found_section_names.push(tokens[0].clone());
            continue;
        }
        current
            .name_values
            .insert(tokens[0].clone(), tokens.get(1).cloned().unwrap_or_default());
        current
            .name_vectors
            .insert(tokens[0].clone(), tokens[1..].to_vec());
        current.rows.push(tokens);
    }
    if !current.name.is_empty() {
        result.sections.insert(current.name.clone(), current);
    }
    debug!(found = result.found_section_names.len(), "parsed config content");
    result
}

/// Finds slot numbered section headers (`<start> <slot>`), used by
/// configurations where one section repeats per hardware slot.
pub fn find_slot_sections(content: &str, slot_section_start: &str) -> Result<Vec<SlotSection>> {
    let mut found = Vec::new();
    for raw_line in content.lines() {
        let tokens = match content_tokens(raw_line) {
            Some(tokens) => tokens,
            None => continue,
        };
        if tokens[0] == slot_section_start && tokens.len() > 1 {
            let slot_number = tokens[1]
                .parse::<u32>()
                .map_err(|_| CondbError::InvalidSlotNumber(tokens[1].clone()))?;
            found.push(SlotSection {
                full_line: raw_line.trim().to_owned(),
                name: slot_section_start.to_owned(),
                slot_number,
            });
        }
    }
    Ok(found)
}
