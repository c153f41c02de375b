//! Tera rendering engine: [`ArtifactKind`] and [`Renderer`].
//!
//! | Artifact  | Template             | Written to (state dir) |
//! |-----------|----------------------|------------------------|
//! | Brief     | `brief.txt.tera`     | `brief.txt`            |
//! | Checklist | `verify.md.tera`     | `verify.md`            |
//! | Output    | `output.txt.tera`    | `output.txt`           |
//! | Repair    | `repair.md.tera`     | `repair.md`            |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tera::Tera;

use sentinel_core::store;

use crate::context::{RepairContext, StepContext};
use crate::error::RenderError;

// ---------------------------------------------------------------------------
// Embedded templates, baked into the binary via include_str!
// ---------------------------------------------------------------------------

const TPLS: &[(&str, &str)] = &[
    ("shared/_header.tera", include_str!("templates/_partials/header.tera")),
    ("shared/_constraints.tera", include_str!("templates/_partials/constraints.tera")),
    ("brief.txt.tera", include_str!("templates/brief.txt.tera")),
    ("verify.md.tera", include_str!("templates/verify.md.tera")),
    ("output.txt.tera", include_str!("templates/output.txt.tera")),
    ("repair.md.tera", include_str!("templates/repair.md.tera")),
];

// ---------------------------------------------------------------------------
// Template loading helpers
// ---------------------------------------------------------------------------

fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> RenderError {
    RenderError::Io { path: path.into(), source }
}

/// Overrides are flat `*.tera` files named like the embedded ones.
fn load_overrides(dir: &Path) -> Result<Vec<(String, String)>, RenderError> {
    if !dir.is_dir() {
        return Ok(vec![]);
    }
    let mut overrides = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("tera") {
            continue;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
            continue;
        };
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        overrides.push((name, contents));
    }
    overrides.sort();
    Ok(overrides)
}

fn build_tera(override_dir: Option<&Path>) -> Result<Tera, RenderError> {
    let mut templates: HashMap<String, String> = TPLS
        .iter()
        .map(|(name, content)| (name.to_string(), content.to_string()))
        .collect();
    if let Some(dir) = override_dir {
        for (name, content) in load_overrides(dir)? {
            templates.insert(name, content);
        }
    }
    let mut tera = Tera::default();
    tera.add_raw_templates(templates.into_iter().collect::<Vec<_>>())?;
    Ok(tera)
}

// ---------------------------------------------------------------------------
// ArtifactKind
// ---------------------------------------------------------------------------

/// Every text artifact derived from a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Brief,
    Checklist,
    Output,
    Repair,
}

impl ArtifactKind {
    pub fn template_name(&self) -> &'static str {
        match self {
            ArtifactKind::Brief     => "brief.txt.tera",
            ArtifactKind::Checklist => "verify.md.tera",
            ArtifactKind::Output    => "output.txt.tera",
            ArtifactKind::Repair    => "repair.md.tera",
        }
    }

    /// File name inside the state directory.
    pub fn file_name(&self) -> &'static str {
        match self {
            ArtifactKind::Brief     => store::BRIEF_FILE,
            ArtifactKind::Checklist => store::CHECKLIST_FILE,
            ArtifactKind::Output    => store::OUTPUT_FILE,
            ArtifactKind::Repair    => store::REPAIR_FILE,
        }
    }
}

/// Rendered compile output: brief, checklist and output text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledArtifact {
    pub brief: String,
    pub checklist: String,
    pub output: String,
}

impl CompiledArtifact {
    /// `(file_name, content)` pairs ready to be written.
    pub fn files(&self) -> [(&'static str, &str); 3] {
        [
            (ArtifactKind::Brief.file_name(), self.brief.as_str()),
            (ArtifactKind::Checklist.file_name(), self.checklist.as_str()),
            (ArtifactKind::Output.file_name(), self.output.as_str()),
        ]
    }
}

// ---------------------------------------------------------------------------
// Renderer
// ---------------------------------------------------------------------------

/// Tera renderer for step artifacts. Build once and reuse.
pub struct Renderer {
    tera: Tera,
}

impl Renderer {
    /// Embedded templates only.
    pub fn new() -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera(None)? })
    }

    /// Embedded templates, with same-named `.tera` files in `dir` taking
    /// precedence. A missing directory is not an error.
    pub fn with_overrides(dir: &Path) -> Result<Self, RenderError> {
        Ok(Renderer { tera: build_tera(Some(dir))? })
    }

    pub fn render(&self, kind: ArtifactKind, ctx: &tera::Context) -> Result<String, RenderError> {
        Ok(self.tera.render(kind.template_name(), ctx)?)
    }

    /// Projects a step into its brief, checklist, and output template.
    pub fn compile(&self, ctx: &StepContext) -> Result<CompiledArtifact, RenderError> {
        let tera_ctx = ctx.to_tera_context()?;
        Ok(CompiledArtifact {
            brief: self.render(ArtifactKind::Brief, &tera_ctx)?,
            checklist: self.render(ArtifactKind::Checklist, &tera_ctx)?,
            output: self.render(ArtifactKind::Output, &tera_ctx)?,
        })
    }

    pub fn repair(&self, ctx: &RepairContext) -> Result<String, RenderError> {
        self.render(ArtifactKind::Repair, &ctx.to_tera_context()?)
    }
}
