//! Decompression of compiler source maps.
//!
//! A source map is a `;`-separated list of `s:l:f:j:m` nodes, one per
//! instruction. Empty fields repeat the value of the previous node.
//!
//! See <https://docs.soliditylang.org/en/latest/internals/source_mappings.html>

use crate::build_model::{JumpType, Location};

const NUM_FIELDS: usize = 5;

const FIELD_NAMES: [&str; NUM_FIELDS] =
    ["start", "length", "file index", "jump type", "modifier depth"];

/// Values assumed for fields that are missing from the first node.
const INITIAL_FIELDS: [&str; NUM_FIELDS] = ["-1", "-1", "-1", "-", "0"];

/// An error that occurs while decompressing a source map.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SourceMapError {
    /// A field of a node could not be parsed.
    #[error("invalid {field} `{value}` in node {index}")]
    InvalidField {
        /// Index of the node in the source map.
        index: usize,
        /// Name of the field.
        field: &'static str,
        /// The unparsable value.
        value: String,
    },
}

/// Decompresses a source map into one [`Location`] per node. The returned
/// locations are not yet resolved against any source file.
pub fn decompress(compressed: &str) -> Result<Vec<Location>, SourceMapError> {
    if compressed.is_empty() {
        return Ok(Vec::new());
    }

    let mut last = INITIAL_FIELDS;

    compressed
        .split(';')
        .enumerate()
        .map(|(index, node)| {
            let mut parts = node.split(':');
            for field in &mut last {
                if let Some(part) = parts.next().filter(|part| !part.is_empty()) {
                    *field = part;
                }
            }

            parse_node(index, &last)
        })
        .collect()
}

/// Compresses locations into a source map, omitting every field that equals
/// the previous node's and trimming trailing empty fields.
pub fn compress(locations: &[Location]) -> String {
    let mut nodes = Vec::with_capacity(locations.len());
    let mut previous: Option<[String; NUM_FIELDS]> = None;

    for location in locations {
        let fields = encode_fields(location);

        let mut parts: Vec<&str> = match &previous {
            Some(previous) => fields
                .iter()
                .zip(previous)
                .map(|(field, previous)| {
                    if field == previous {
                        ""
                    } else {
                        field.as_str()
                    }
                })
                .collect(),
            None => fields.iter().map(String::as_str).collect(),
        };

        while parts.last().is_some_and(|part| part.is_empty()) {
            parts.pop();
        }

        nodes.push(parts.join(":"));
        previous = Some(fields);
    }

    nodes.join(";")
}

fn parse_node(index: usize, fields: &[&str; NUM_FIELDS]) -> Result<Location, SourceMapError> {
    let [start, length, file_index, jump_type, modifier_depth] = *fields;

    Ok(Location {
        start: parse_offset(index, 0, start)?,
        length: parse_offset(index, 1, length)?,
        file_index: parse_offset(index, 2, file_index)?,
        jump_type: jump_type
            .parse::<JumpType>()
            .map_err(|_err| invalid_field(index, 3, jump_type))?,
        modifier_depth: modifier_depth
            .parse()
            .map_err(|_err| invalid_field(index, 4, modifier_depth))?,
        ..Location::default()
    })
}

/// Parses a non-negative offset, where `-1` denotes missing information.
fn parse_offset(index: usize, field: usize, value: &str) -> Result<Option<u32>, SourceMapError> {
    if value == "-1" {
        return Ok(None);
    }

    value
        .parse()
        .map(Some)
        .map_err(|_err| invalid_field(index, field, value))
}

fn invalid_field(index: usize, field: usize, value: &str) -> SourceMapError {
    SourceMapError::InvalidField {
        index,
        field: FIELD_NAMES.get(field).copied().unwrap_or_default(),
        value: value.to_string(),
    }
}

fn encode_fields(location: &Location) -> [String; NUM_FIELDS] {
    let encode =
        |value: Option<u32>| value.map_or_else(|| "-1".to_string(), |value| value.to_string());

    [
        encode(location.start),
        encode(location.length),
        encode(location.file_index),
        location.jump_type.to_string(),
        location.modifier_depth.to_string(),
    ]
}
