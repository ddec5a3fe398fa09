// subject.rs — typed identity of what is photographed and in which paint

use serde::{Deserialize, Serialize};

use crate::error::{Result, ViewerError};

/// Trims, lowercases and collapses internal whitespace so that
/// `"  BMW "` and `"bmw"` resolve to the same locators.
pub fn normalize_field(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SubjectFields {
    make: String,
    model: String,
    #[serde(default)]
    variant: String,
}

/// Make / model line / body variant, stored normalized.
///
/// Construction rejects an empty make or model, so a resolver can never be
/// handed a subject it cannot encode.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SubjectFields", into = "SubjectFields")]
pub struct ViewerSubject {
    make: String,
    model_line: String,
    body_variant: String,
}

impl ViewerSubject {
    pub fn new(make: &str, model_line: &str, body_variant: &str) -> Result<Self> {
        let make = normalize_field(make);
        let model_line = normalize_field(model_line);
        if make.is_empty() {
            return Err(ViewerError::InvalidSubject("make is empty".into()));
        }
        if model_line.is_empty() {
            return Err(ViewerError::InvalidSubject("model line is empty".into()));
        }
        Ok(Self {
            make,
            model_line,
            body_variant: normalize_field(body_variant),
        })
    }

    pub fn make(&self) -> &str {
        &self.make
    }

    pub fn model_line(&self) -> &str {
        &self.model_line
    }

    pub fn body_variant(&self) -> &str {
        &self.body_variant
    }

    /// Human readable label for status lines, e.g. `bmw x5 (suv)`.
    pub fn label(&self) -> String {
        if self.body_variant.is_empty() {
            format!("{} {}", self.make, self.model_line)
        } else {
            format!("{} {} ({})", self.make, self.model_line, self.body_variant)
        }
    }
}

impl TryFrom<SubjectFields> for ViewerSubject {
    type Error = ViewerError;

    fn try_from(f: SubjectFields) -> Result<Self> {
        Self::new(&f.make, &f.model, &f.variant)
    }
}

impl From<ViewerSubject> for SubjectFields {
    fn from(s: ViewerSubject) -> Self {
        Self {
            make: s.make,
            model: s.model_line,
            variant: s.body_variant,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct FinishFields {
    #[serde(default)]
    paint_id: String,
    #[serde(default)]
    paint_description: String,
}

/// Paint variant. An empty paint id asks the provider for its default paint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "FinishFields", into = "FinishFields")]
pub struct Finish {
    paint_id: String,
    paint_description: String,
}

impl Finish {
    pub fn new(paint_id: &str, paint_description: &str) -> Self {
        Self {
            paint_id: paint_id.trim().to_string(),
            paint_description: paint_description.trim().to_string(),
        }
    }

    pub fn paint_id(&self) -> &str {
        &self.paint_id
    }

    pub fn paint_description(&self) -> &str {
        &self.paint_description
    }

    /// Description when present, otherwise the paint id.
    pub fn label(&self) -> &str {
        if self.paint_description.is_empty() {
            &self.paint_id
        } else {
            &self.paint_description
        }
    }
}

impl From<FinishFields> for Finish {
    fn from(f: FinishFields) -> Self {
        Self::new(&f.paint_id, &f.paint_description)
    }
}

impl From<Finish> for FinishFields {
    fn from(f: Finish) -> Self {
        Self {
            paint_id: f.paint_id,
            paint_description: f.paint_description,
        }
    }
}
