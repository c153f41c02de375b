//! `architecture.md` helpers.
//!
//! The `## Known Deviations` section lists gaps the team already knows
//! about, one bullet each:
//!
//! ```text
//! ## Known Deviations
//! - [high] ui-in-api: React components live in the API package (files: api/view.tsx)
//! - [low] no-readme: README is missing
//! ```

use std::str::FromStr;

use sentinel_core::{Deviation, Severity};

const SECTION: &str = "known deviations";

/// Parses the `## Known Deviations` bullets. Malformed bullets are skipped
/// with a warning.
pub fn parse_known_deviations(markdown: &str) -> Vec<Deviation> {
    let mut in_section = false;
    let mut out = Vec::new();
    for line in markdown.lines() {
        let trimmed = line.trim();
        if let Some(heading) = heading_text(trimmed) {
            in_section = heading.eq_ignore_ascii_case(SECTION);
            continue;
        }
        if !in_section {
            continue;
        }
        let Some(item) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) else {
            continue;
        };
        match parse_bullet(item) {
            Some(d) => out.push(d),
            None => tracing::warn!(line = %trimmed, "unrecognised known-deviation bullet"),
        }
    }
    out
}

/// Heading text for `#`/`##` lines; deeper headings stay inside a section.
fn heading_text(line: &str) -> Option<&str> {
    let level = line.chars().take_while(|c| *c == '#').count();
    if level == 0 || level > 2 {
        return None;
    }
    Some(line[level..].trim())
}

fn parse_bullet(item: &str) -> Option<Deviation> {
    let rest = item.strip_prefix('[')?;
    let (sev, rest) = rest.split_once(']')?;
    let severity = Severity::from_str(sev).ok()?;
    let (id, rest) = rest.trim().split_once(':')?;
    let id = id.trim();
    if id.is_empty() || id.contains(char::is_whitespace) {
        return None;
    }
    let mut description = rest.trim();
    let mut files = Vec::new();
    if let Some(open) = description.rfind("(files:") {
        if let Some(list) = description[open + "(files:".len()..].strip_suffix(')') {
            files = list
                .split(',')
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string)
                .collect();
            description = description[..open].trim_end();
        }
    }
    if description.is_empty() {
        return None;
    }
    Some(Deviation::new(id, description, severity).with_files(files))
}

/// Starter `architecture.md` written by `init`.
pub fn template(repo_name: &str) -> String {
    format!(
        "# {repo_name} architecture\n\
         \n\
         Describe the target architecture here: components, boundaries, and\n\
         what each directory is for.\n\
         \n\
         ## Known Deviations\n\
         \n\
         <!-- One bullet per known gap: - [high|medium|low] id: description (files: a, b) -->\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sentinel_core::DeviationId;

    const DOC: &str = "\
# api
Intro text.
- [high] not-a-deviation: outside the section

## Known Deviations
- [high] ui-in-api: React components live in the API (files: api/view.tsx, api/app.tsx)
- [Medium] no-tests: No integration tests
- [urgent] bad-sev: unknown severity
- missing brackets: ignored
### Details
- [low] still-inside: deeper headings keep the section open

## Next
- [high] after: outside again
";

    #[test]
    fn parses_bullets_in_section_only() {
        let devs = parse_known_deviations(DOC);
        let ids: Vec<_> = devs.iter().map(|d| d.id.0.as_str()).collect();
        assert_eq!(ids, vec!["ui-in-api", "no-tests", "still-inside"]);
        assert_eq!(devs[0].severity, Severity::High);
        assert_eq!(devs[0].description, "React components live in the API");
        assert!(devs[0].affected_files.contains("api/app.tsx"));
        assert_eq!(devs[1].severity, Severity::Medium);
        assert_eq!(devs[1].id, DeviationId::from("no-tests"));
    }

    #[test]
    fn template_has_empty_section() {
        assert!(parse_known_deviations(&template("api")).is_empty());
        assert!(template("api").contains("## Known Deviations"));
    }
}
