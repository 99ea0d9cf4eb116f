//! YAML front matter extraction.
//!
//! A document may start with a `---` fenced YAML mapping. Blank lines before
//! the opening fence are allowed; anything else means "no front matter".

use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FrontmatterError {
    #[error("unterminated front matter block: expected closing '---'")]
    Unterminated,
    #[error("front matter parse error: {0}")]
    Parse(String),
    #[error("front matter must be a YAML mapping at the top level")]
    InvalidRootType,
}

/// A document split into its front matter and Markdown body.
#[derive(Debug)]
pub struct Document<'a> {
    pub data: Map<String, Value>,
    pub body: &'a str,
}

pub fn split(input: &str) -> Result<Document<'_>, FrontmatterError> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);

    let mut offset = 0;
    let mut lines = input.split_inclusive('\n');
    let opening = loop {
        match lines.next() {
            Some(line) if line.trim().is_empty() => offset += line.len(),
            Some(line) => break Some(line),
            None => break None,
        }
    };

    let Some(opening) = opening.filter(|line| is_fence(line)) else {
        return Ok(Document {
            data: Map::new(),
            body: input,
        });
    };

    let block_start = offset + opening.len();
    let mut cursor = block_start;
    for line in lines {
        if is_fence(line) {
            let data = parse_block(&input[block_start..cursor])?;
            return Ok(Document {
                data,
                body: &input[cursor + line.len()..],
            });
        }
        cursor += line.len();
    }
    Err(FrontmatterError::Unterminated)
}

fn is_fence(line: &str) -> bool {
    line.trim_end() == "---"
}

fn parse_block(block: &str) -> Result<Map<String, Value>, FrontmatterError> {
    if block.trim().is_empty() {
        return Ok(Map::new());
    }
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(block).map_err(|e| FrontmatterError::Parse(e.to_string()))?;
    match serde_json::to_value(yaml).map_err(|e| FrontmatterError::Parse(e.to_string()))? {
        Value::Null => Ok(Map::new()),
        Value::Object(map) => Ok(map),
        _ => Err(FrontmatterError::InvalidRootType),
    }
}
