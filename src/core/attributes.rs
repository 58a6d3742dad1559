use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PipelineError, PipelineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One synthetic person seen on a stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub age: i64,
    pub gender: Gender,
}

impl Person {
    pub const fn new(age: i64, gender: Gender) -> Self {
        Self { age, gender }
    }
}

/// Static stand-in for a vision model: row `i` lists the people visible on
/// every stream whose index is congruent to `i` modulo the table size.
///
/// Rows are fixed once the table is built; the table is shared read-only
/// between stages behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeTable {
    rows: Vec<Vec<Person>>,
}

impl AttributeTable {
    pub fn new(rows: Vec<Vec<Person>>) -> PipelineResult<Self> {
        if rows.is_empty() {
            return Err(PipelineError::config("attribute_table", "table has no rows"));
        }
        if let Some(idx) = rows.iter().position(|row| row.is_empty()) {
            return Err(PipelineError::config(
                "attribute_table",
                format!("row {} is empty", idx),
            ));
        }
        Ok(Self { rows })
    }

    /// The ten-row fixture the stress test has always shipped with.
    pub fn builtin() -> Self {
        use Gender::{Female, Male};
        let rows = vec![
            vec![Person::new(33, Male)],
            vec![Person::new(41, Male)],
            vec![Person::new(25, Female)],
            vec![Person::new(17, Female)],
            vec![Person::new(13, Male)],
            vec![Person::new(27, Male)],
            vec![Person::new(23, Male)],
            vec![Person::new(18, Male)],
            vec![Person::new(26, Male), Person::new(27, Female)],
            vec![Person::new(21, Female)],
        ];
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the row serving `stream_index`.
    pub fn row_index(&self, stream_index: u32) -> usize {
        stream_index as usize % self.rows.len()
    }

    pub fn row_for(&self, stream_index: u32) -> &[Person] {
        &self.rows[self.row_index(stream_index)]
    }
}

impl Default for AttributeTable {
    fn default() -> Self {
        Self::builtin()
    }
}
