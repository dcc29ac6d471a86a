//! Markdown rendering of aggregated releases.

use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt::Write as _;
use std::str::FromStr;

use tracing::debug;

use crate::fragment::{Category, Fragment};
use crate::release::{Changelog, Release};
use crate::vcs::BASELINE_TAG;

/// Release names that are boundaries only and never rendered.
const SYNTHETIC_NAMES: &[&str] = &[BASELINE_TAG, "HEAD"];

/// Which releases to render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ReleaseSelection {
    /// Every release, plus header and footer.
    #[default]
    All,
    /// Only the named releases, without header or footer.
    Only(BTreeSet<String>),
}

impl ReleaseSelection {
    /// Whether `name` should be rendered.
    pub fn includes(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }

    /// Whether this is [`ReleaseSelection::All`].
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl FromStr for ReleaseSelection {
    type Err = Infallible;

    /// `all` (any case) or an empty string selects everything; anything else
    /// is a comma-separated list of release names.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        Ok(Self::Only(
            s.split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(ToString::to_string)
                .collect(),
        ))
    }
}

/// Renders a [`Changelog`] as Markdown, newest release first.
#[derive(Debug, Clone, Default)]
pub struct Renderer {
    package_name: Option<String>,
}

impl Renderer {
    /// Create a renderer; `package_name` prefixes every release heading.
    pub const fn new(package_name: Option<String>) -> Self {
        Self { package_name }
    }

    /// Render the selected releases.
    ///
    /// Header and footer are only emitted for [`ReleaseSelection::All`].
    /// Returns an empty string when there is nothing to render.
    pub fn render(
        &self,
        changelog: &Changelog,
        selection: &ReleaseSelection,
        header: Option<&str>,
        footer: Option<&str>,
    ) -> String {
        let releases: Vec<&Release> = changelog
            .releases
            .iter()
            .rev()
            .filter(|release| !SYNTHETIC_NAMES.contains(&release.name()))
            .filter(|release| selection.includes(release.name()))
            .collect();
        let separate = releases.len() > 1;
        debug!(releases = releases.len(), "rendering changelog");

        let mut blocks = Vec::with_capacity(releases.len() + 2);
        if selection.is_all() {
            blocks.extend(boundary_block(header));
        }
        blocks.extend(
            releases
                .iter()
                .map(|release| self.release_block(release, separate)),
        );
        if selection.is_all() {
            blocks.extend(boundary_block(footer));
        }

        if blocks.is_empty() {
            return String::new();
        }
        let mut document = blocks.join("\n\n");
        document.push('\n');
        document
    }

    fn heading(&self, release: &Release) -> String {
        let mut heading = String::from("# ");
        if let Some(package) = self.package_name.as_deref().filter(|p| !p.is_empty()) {
            heading.push_str(package);
            heading.push(' ');
        }
        let _ = write!(heading, "{} ({})", release.name(), release.tag.date());
        heading
    }

    fn release_block(&self, release: &Release, separate: bool) -> String {
        let mut block = String::new();
        if separate {
            block.push_str("---\n");
        }
        block.push_str(&self.heading(release));

        for category in Category::ALL {
            let fragments = release.fragments(*category);
            if fragments.is_empty() {
                continue;
            }
            let _ = write!(block, "\n\n## {}\n", category.title());
            for fragment in fragments {
                block.push('\n');
                block.push_str(&bullet(fragment));
            }
        }
        block
    }
}

fn boundary_block(text: Option<&str>) -> Option<String> {
    text.map(str::trim_end)
        .filter(|t| !t.trim().is_empty())
        .map(ToString::to_string)
}

/// `- first line`, continuation lines indented to align with the text.
fn bullet(fragment: &Fragment) -> String {
    let mut lines = fragment.content.lines();
    let mut out = format!("- {}", lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        if !line.is_empty() {
            out.push_str("  ");
            out.push_str(line);
        }
    }
    out
}
