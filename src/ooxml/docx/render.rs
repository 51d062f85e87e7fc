use super::runs::{self, Substitution};
use crate::archive::Archive;
use crate::common::Value;
use crate::ooxml::error::{Result, TemplateError};
use crate::ooxml::{RenderReport, Rendered};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const MAIN_PART: &str = "word/document.xml";

/// What to do with a placeholder that has no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingValuePolicy {
    /// Substitute an empty string and report the path
    #[default]
    Blank,
    /// Fail the render with every unresolved path
    Error,
}

/// Placeholder syntax and substitution behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateOptions {
    pub start_delimiter: char,
    pub end_delimiter: char,
    pub missing: MissingValuePolicy,
    /// Turn `\n` in values into line breaks
    pub linebreaks: bool,
    /// Also render headers, footers, footnotes and endnotes
    pub secondary_parts: bool,
}

impl Default for TemplateOptions {
    fn default() -> Self {
        Self {
            start_delimiter: '{',
            end_delimiter: '}',
            missing: MissingValuePolicy::Blank,
            linebreaks: true,
            secondary_parts: true,
        }
    }
}

/// Renders word-processing templates.
#[derive(Debug, Clone, Default)]
pub struct DocumentEngine {
    options: TemplateOptions,
}

impl DocumentEngine {
    pub fn new(options: TemplateOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TemplateOptions {
        &self.options
    }

    /// Substitute placeholders in every template part and serialize the package.
    ///
    /// The main document is parsed again here even though the validator
    /// already looked at it; a template may have been replaced in between.
    pub fn render(&self, archive: &mut Archive, context: &Value) -> Result<Rendered> {
        let resolve = |path: &str| context.lookup(path).and_then(Value::as_text);
        let subst = Substitution {
            start: self.options.start_delimiter,
            end: self.options.end_delimiter,
            linebreaks: self.options.linebreaks,
            resolve: &resolve,
        };

        let mut report = RenderReport::default();
        for part in self.template_parts(archive) {
            let xml = archive
                .read_string(&part)
                .map_err(|e| TemplateError::fatal(&part, e.to_string()))?;
            let outcome =
                runs::rewrite_part(&xml, &subst).map_err(|reason| TemplateError::fatal(&part, reason))?;

            debug!(
                part = %part,
                substitutions = outcome.substitutions,
                unresolved = outcome.unresolved.len(),
                "rendered part"
            );
            report.substitutions += outcome.substitutions;
            for path in outcome.unresolved {
                report.note_missing(path);
            }
            report
                .warnings
                .extend(outcome.warnings.into_iter().map(|w| format!("{part}: {w}")));

            if let Some(xml) = outcome.xml {
                archive.write_entry(&part, xml.into_bytes());
            }
        }

        if !report.missing_variables.is_empty() {
            match self.options.missing {
                MissingValuePolicy::Blank => {
                    warn!(missing = ?report.missing_variables, "placeholders rendered empty");
                },
                MissingValuePolicy::Error => {
                    return Err(TemplateError::Render {
                        unresolved: report.missing_variables,
                    });
                },
            }
        }

        let content = archive.serialize()?;
        Ok(Rendered { content, report })
    }

    /// Convenience wrapper: open `data` and render it.
    pub fn render_bytes(&self, data: Vec<u8>, context: &Value) -> Result<Rendered> {
        let mut archive = Archive::open(data)?;
        self.render(&mut archive, context)
    }

    /// Main part first, then secondary parts in name order.
    fn template_parts(&self, archive: &Archive) -> Vec<String> {
        let mut parts = vec![MAIN_PART.to_string()];
        if self.options.secondary_parts {
            let mut secondary: Vec<String> = archive
                .list_entries()
                .into_iter()
                .filter(|name| is_secondary_part(name))
                .collect();
            secondary.sort();
            parts.extend(secondary);
        }
        parts
    }
}

fn is_secondary_part(name: &str) -> bool {
    let Some(file) = name.strip_prefix("word/") else {
        return false;
    };
    if file.contains('/') || !file.ends_with(".xml") {
        return false;
    }
    file.starts_with("header")
        || file.starts_with("footer")
        || file == "footnotes.xml"
        || file == "endnotes.xml"
}
