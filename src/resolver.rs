// resolver.rs — (subject, finish) -> ordered locator sequence, no I/O

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::error::{Result, ViewerError};
use crate::subject::{normalize_field, Finish, ViewerSubject};

/// Provider angle codes for a 24-step turntable (15° apart). Not contiguous:
/// the provider reserves 18-20 and 25-26 for detail shots.
pub const DEFAULT_ANGLE_CODES: [&str; 24] = [
    "01", "02", "03", "04", "05", "06", "07", "08", "09", "10", "11", "12", "13", "14", "15",
    "16", "17", "21", "22", "23", "24", "27", "28", "29",
];

/// Everything but RFC 3986 unreserved characters.
const FIELD_VALUE: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

pub const DEFAULT_LOCATOR_TEMPLATE: &str = "https://cdn.turntable.example/getImage?make={make}&modelFamily={model}&modelVariant={variant}&paintId={paint_id}&angle={angle}&width=1280";

/// Fully qualified resource reference for one orientation step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Locator(String);

impl Locator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Locator> for String {
    fn from(l: Locator) -> Self {
        l.0
    }
}

/// Explicit step index -> provider angle code table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AngleCodeTable {
    codes: Vec<String>,
}

impl AngleCodeTable {
    pub fn new<I, S>(codes: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: Vec<String> = codes.into_iter().map(|c| c.into().trim().to_string()).collect();
        if codes.is_empty() {
            return Err(ViewerError::InvalidCodeTable("table is empty".into()));
        }
        for (i, code) in codes.iter().enumerate() {
            if code.is_empty() {
                return Err(ViewerError::InvalidCodeTable(format!("code for step {i} is empty")));
            }
            if codes[..i].contains(code) {
                return Err(ViewerError::InvalidCodeTable(format!(
                    "code {code:?} appears more than once"
                )));
            }
        }
        Ok(Self { codes })
    }

    /// Number of orientation steps in a full rotation.
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn code(&self, step: usize) -> Option<&str> {
        self.codes.get(step).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.codes.iter().map(String::as_str)
    }
}

impl Default for AngleCodeTable {
    fn default() -> Self {
        Self {
            codes: DEFAULT_ANGLE_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Make,
    Model,
    Variant,
    PaintId,
    PaintDescription,
    Angle,
    Step,
}

impl Field {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "make" => Some(Field::Make),
            "model" => Some(Field::Model),
            "variant" => Some(Field::Variant),
            "paint_id" => Some(Field::PaintId),
            "paint_description" => Some(Field::PaintDescription),
            "angle" => Some(Field::Angle),
            "step" => Some(Field::Step),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Field(Field),
}

/// Parsed locator template with `{placeholder}` fields.
///
/// Recognised placeholders: `make`, `model`, `variant`, `paint_id`,
/// `paint_description`, `angle`, `step`. Substituted values are
/// percent-encoded; literal text is copied verbatim, with `{{` and `}}`
/// standing for literal braces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatorTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl LocatorTemplate {
    pub fn parse(source: &str) -> Result<Self> {
        let source = source.trim();
        if !has_locator_scheme(source) {
            return Err(ViewerError::InvalidTemplate(format!(
                "{source:?} is not an http(s) or file locator"
            )));
        }

        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = source;
        while let Some(cut) = rest.find(['{', '}']) {
            literal.push_str(&rest[..cut]);
            rest = &rest[cut..];
            if let Some(tail) = rest.strip_prefix("{{") {
                literal.push('{');
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("}}") {
                literal.push('}');
                rest = tail;
            } else if rest.starts_with('}') {
                return Err(ViewerError::InvalidTemplate(format!("unmatched '}}' in {source:?}")));
            } else {
                let close = rest.find('}').ok_or_else(|| {
                    ViewerError::InvalidTemplate(format!("unterminated placeholder in {source:?}"))
                })?;
                let name = &rest[1..close];
                let field = Field::from_name(name).ok_or_else(|| {
                    ViewerError::InvalidTemplate(format!("unknown placeholder {{{name}}}"))
                })?;
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Field(field));
                rest = &rest[close + 1..];
            }
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        let varies_by_step = segments
            .iter()
            .any(|s| matches!(s, Segment::Field(Field::Angle) | Segment::Field(Field::Step)));
        if !varies_by_step {
            return Err(ViewerError::InvalidTemplate(
                "template needs an {angle} or {step} placeholder".into(),
            ));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    fn render(&self, subject: &ViewerSubject, finish: &Finish, step: usize, code: &str) -> Locator {
        let mut out = String::with_capacity(self.source.len() + 32);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Field(field) => {
                    let value = match field {
                        Field::Make => subject.make().to_string(),
                        Field::Model => subject.model_line().to_string(),
                        Field::Variant => subject.body_variant().to_string(),
                        Field::PaintId => finish.paint_id().to_string(),
                        Field::PaintDescription => normalize_field(finish.paint_description()),
                        Field::Angle => code.to_string(),
                        Field::Step => step.to_string(),
                    };
                    out.extend(utf8_percent_encode(&value, FIELD_VALUE));
                }
            }
        }
        Locator(out)
    }
}

impl Default for LocatorTemplate {
    fn default() -> Self {
        // The built-in template is known to parse.
        Self::parse(DEFAULT_LOCATOR_TEMPLATE).unwrap_or_else(|e| unreachable!("{e}"))
    }
}

/// True for `http`, `https` and `file` URLs.
pub(crate) fn has_locator_scheme(locator: &str) -> bool {
    Url::parse(locator)
        .map(|url| matches!(url.scheme(), "http" | "https" | "file"))
        .unwrap_or(false)
}

/// Ordered locators, index-aligned with orientation steps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetSequence {
    subject: ViewerSubject,
    finish: Finish,
    locators: Vec<Locator>,
}

impl AssetSequence {
    pub fn subject(&self) -> &ViewerSubject {
        &self.subject
    }

    pub fn finish(&self) -> &Finish {
        &self.finish
    }

    pub fn len(&self) -> usize {
        self.locators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locators.is_empty()
    }

    pub fn get(&self, step: usize) -> Option<&Locator> {
        self.locators.get(step)
    }

    pub fn locators(&self) -> &[Locator] {
        &self.locators
    }

    pub fn iter(&self) -> impl Iterator<Item = &Locator> {
        self.locators.iter()
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssetResolver {
    codes: AngleCodeTable,
    template: LocatorTemplate,
}

impl AssetResolver {
    pub fn new(codes: AngleCodeTable, template: LocatorTemplate) -> Self {
        Self { codes, template }
    }

    pub fn step_count(&self) -> usize {
        self.codes.len()
    }

    pub fn codes(&self) -> &AngleCodeTable {
        &self.codes
    }

    pub fn template(&self) -> &LocatorTemplate {
        &self.template
    }

    /// Pure: identical inputs always give an identical sequence.
    pub fn resolve(&self, subject: &ViewerSubject, finish: &Finish) -> AssetSequence {
        let locators = self
            .codes
            .iter()
            .enumerate()
            .map(|(step, code)| self.template.render(subject, finish, step, code))
            .collect();
        AssetSequence {
            subject: subject.clone(),
            finish: finish.clone(),
            locators,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn bmw() -> ViewerSubject {
        ViewerSubject::new("BMW", "X5", "suv").unwrap()
    }

    #[test]
    fn resolves_24_distinct_reproducible_locators() {
        let resolver = AssetResolver::default();
        let finish = Finish::new("1", "");
        let first = resolver.resolve(&bmw(), &finish);
        let second = resolver.resolve(&bmw(), &finish);

        assert_eq!(first.len(), 24);
        assert_eq!(first, second);
        let unique: HashSet<_> = first.iter().collect();
        assert_eq!(unique.len(), 24);
    }

    #[test]
    fn steps_map_through_code_table() {
        let resolver = AssetResolver::default();
        let seq = resolver.resolve(&bmw(), &Finish::new("1", ""));
        assert_eq!(
            seq.get(0).unwrap().as_str(),
            "https://cdn.turntable.example/getImage?make=bmw&modelFamily=x5&modelVariant=suv&paintId=1&angle=01&width=1280"
        );
        assert!(seq.get(17).unwrap().as_str().contains("angle=21"));
        assert!(seq.get(23).unwrap().as_str().contains("angle=29"));
        assert!(seq.get(24).is_none());
    }

    #[test]
    fn casing_and_spacing_do_not_change_locators() {
        let resolver = AssetResolver::default();
        let finish = Finish::new("475", "Black Sapphire");
        let a = resolver.resolve(&ViewerSubject::new("bmw", "x5", "suv").unwrap(), &finish);
        let b = resolver.resolve(&ViewerSubject::new("  BMW", "X5 ", " SUV").unwrap(), &finish);
        assert_eq!(a.locators(), b.locators());
    }

    #[test]
    fn substituted_values_are_percent_encoded() {
        let template =
            LocatorTemplate::parse("https://img.example/{make}/{model}/{paint_description}/{step}.jpg")
                .unwrap();
        let resolver = AssetResolver::new(AngleCodeTable::new(["a", "b"]).unwrap(), template);
        let subject = ViewerSubject::new("Land Rover", "Range Rover/Sport", "").unwrap();
        let seq = resolver.resolve(&subject, &Finish::new("", "Fuji White"));
        assert_eq!(
            seq.get(1).unwrap().as_str(),
            "https://img.example/land%20rover/range%20rover%2Fsport/fuji%20white/1.jpg"
        );
    }

    #[test]
    fn rejects_bad_code_tables() {
        assert!(AngleCodeTable::new(Vec::<String>::new()).is_err());
        assert!(AngleCodeTable::new(["01", " "]).is_err());
        assert!(matches!(
            AngleCodeTable::new(["01", "02", "01"]),
            Err(ViewerError::InvalidCodeTable(_))
        ));
    }

    #[test]
    fn rejects_bad_templates() {
        for bad in [
            "https://img.example/{make}.jpg",
            "https://img.example/{angle.jpg",
            "https://img.example/{colour}/{angle}.jpg",
            "https://img.example/}{angle}.jpg",
            "frames/{angle}.png",
        ] {
            assert!(
                matches!(LocatorTemplate::parse(bad), Err(ViewerError::InvalidTemplate(_))),
                "{bad} should be rejected"
            );
        }
        assert!(LocatorTemplate::parse("file:///srv/frames/{make}/{step}.png").is_ok());
    }

    #[test]
    fn doubled_braces_are_literal() {
        let template = LocatorTemplate::parse("file:///srv/x{{1}}/{angle}.png").unwrap();
        let resolver = AssetResolver::new(AngleCodeTable::new(["07"]).unwrap(), template);
        let seq = resolver.resolve(&bmw(), &Finish::default());
        assert_eq!(seq.get(0).unwrap().as_str(), "file:///srv/x{1}/07.png");
    }

    #[test]
    fn scheme_must_be_http_or_file() {
        assert!(has_locator_scheme("https://img.example/a.jpg"));
        assert!(has_locator_scheme("file:///srv/a.png"));
        assert!(!has_locator_scheme("ftp://img.example/a.jpg"));
        assert!(!has_locator_scheme("C:/frames/a.png"));
        assert!(!has_locator_scheme("frames/a.png"));
    }
}
