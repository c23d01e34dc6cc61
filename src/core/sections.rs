use regex::Regex;

/// A heading and the lines that follow it up to the next heading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    pub title: String,
    pub body: String,
}

/// Splits extracted text into sections at all-uppercase heading lines
pub struct SectionSplitter {
    heading_regex: Regex,
}

impl SectionSplitter {
    pub fn new() -> Self {
        Self {
            // Has an uppercase letter and no lowercase ones
            heading_regex: Regex::new(r"^[^\p{Ll}]*\p{Lu}[^\p{Ll}]*$").expect("Invalid heading regex"),
        }
    }

    /// Headings are 4 to 49 characters once trimmed. Text before the first
    /// heading belongs to no section and is dropped.
    pub fn split(&self, text: &str) -> Vec<Section> {
        let mut sections = Vec::new();
        let mut current: Option<(String, Vec<&str>)> = None;

        for line in text.split('\n') {
            if self.is_heading(line) {
                if let Some((title, body)) = current.take() {
                    sections.push(Section { title, body: body.join("\n") });
                }
                current = Some((line.trim().to_string(), Vec::new()));
            } else if let Some((_, body)) = current.as_mut() {
                body.push(line);
            }
        }

        if let Some((title, body)) = current {
            sections.push(Section { title, body: body.join("\n") });
        }

        sections
    }

    fn is_heading(&self, line: &str) -> bool {
        let trimmed = line.trim();
        let length = trimmed.chars().count();
        (4..50).contains(&length) && self.heading_regex.is_match(trimmed)
    }
}

impl Default for SectionSplitter {
    fn default() -> Self {
        Self::new()
    }
}
