//! Release aggregation: attribute fragments to the tag that introduced them.
//!
//! Tags are walked oldest first. For every pair of consecutive qualifying
//! tags the fragment files added in between belong to the later tag. The
//! synthetic baseline tag opens the walk and is never a release itself.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::changelog::ChangelogResult;
use crate::fragment::{self, Category, ClassificationError, Fragment};
use crate::vcs::{self, BASELINE_TAG, Tag, VcsClient};

/// Default prefix that marks a tag as a version tag.
pub const DEFAULT_VERSION_PREFIX: &str = "v";

/// Options controlling which tags become releases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateOptions {
    /// Fragment directory, relative to the VCS working directory.
    pub fragment_dir: Utf8PathBuf,
    /// Only tags starting with [`Self::version_prefix`] become releases.
    pub only_version_tags: bool,
    /// Skip pre-release tags such as `v0.1.10a1` or `v1.0.0-rc.1`.
    pub only_stable_releases: bool,
    /// Prefix identifying version tags.
    pub version_prefix: String,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            fragment_dir: Utf8PathBuf::from(fragment::DEFAULT_FRAGMENT_DIR),
            only_version_tags: true,
            only_stable_releases: false,
            version_prefix: DEFAULT_VERSION_PREFIX.to_string(),
        }
    }
}

/// Fragments introduced by one tag, grouped by category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Release {
    /// The tag that introduced the fragments.
    pub tag: Tag,
    /// Fragments per category, each in first-seen order.
    pub changes: BTreeMap<Category, Vec<Fragment>>,
}

impl Release {
    /// An empty release for `tag`.
    pub const fn new(tag: Tag) -> Self {
        Self {
            tag,
            changes: BTreeMap::new(),
        }
    }

    /// Release name (the tag name).
    pub fn name(&self) -> &str {
        &self.tag.name
    }

    /// Whether no fragments were attributed to this release.
    pub fn is_empty(&self) -> bool {
        self.changes.values().all(Vec::is_empty)
    }

    /// Total number of fragments.
    pub fn len(&self) -> usize {
        self.changes.values().map(Vec::len).sum()
    }

    /// Add a fragment. A repeated identifier within a category replaces the
    /// earlier content but keeps its position.
    pub fn insert(&mut self, fragment: Fragment) {
        let entries = self.changes.entry(fragment.category).or_default();
        match entries
            .iter_mut()
            .find(|existing| existing.identifier == fragment.identifier)
        {
            Some(existing) => existing.content = fragment.content,
            None => entries.push(fragment),
        }
    }

    /// Fragments of one category, in insertion order.
    pub fn fragments(&self, category: Category) -> &[Fragment] {
        self.changes
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// All non-empty releases, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Changelog {
    /// Releases in chronological order.
    pub releases: Vec<Release>,
}

impl Changelog {
    /// Look up a release by tag name.
    pub fn release(&self, name: &str) -> Option<&Release> {
        self.releases.iter().find(|r| r.name() == name)
    }

    /// Whether there is nothing to report.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

/// Whether `name` is a version tag under `prefix`.
pub fn is_version_tag(name: &str, prefix: &str) -> bool {
    name.starts_with(prefix)
}

/// Whether `name` is a pre-release: a numeric version followed by a marker.
///
/// `v0.1.10a1`, `v1.0.0-rc.1` and `2.0b3` are pre-releases; `v1.2.3`,
/// `v1.2.3+build.5` and names without a numeric version (`latest`) are not.
pub fn is_prerelease(name: &str, prefix: &str) -> bool {
    let version = name.strip_prefix(prefix).unwrap_or(name);
    let core_len = version
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(version.len());
    let (core, marker) = version.split_at(core_len);

    core.chars().any(|c| c.is_ascii_digit()) && !marker.is_empty() && !marker.starts_with('+')
}

/// Tags that take part in the walk, oldest first, baseline first.
///
/// Sorting is stable, so tags sharing a timestamp keep the backend's order.
pub fn qualifying_tags(mut tags: Vec<Tag>, options: &AggregateOptions) -> Vec<Tag> {
    tags.sort_by_key(|tag| tag.timestamp);
    if let Some(position) = tags.iter().position(Tag::is_baseline) {
        let baseline = tags.remove(position);
        tags.insert(0, baseline);
    }

    tags.into_iter()
        .filter(|tag| {
            if tag.is_baseline() {
                return true;
            }
            if options.only_version_tags && !is_version_tag(&tag.name, &options.version_prefix) {
                debug!(tag = %tag.name, "skipping non-version tag");
                return false;
            }
            if options.only_stable_releases && is_prerelease(&tag.name, &options.version_prefix)
            {
                debug!(tag = %tag.name, "skipping pre-release tag");
                return false;
            }
            true
        })
        .collect()
}

/// Build the changelog from repository history.
///
/// Ensures the baseline tag exists, then attributes every fragment added
/// between consecutive qualifying tags to the later one. Fragments that fail
/// classification are logged and skipped.
#[instrument(skip(vcs, options), fields(fragment_dir = %options.fragment_dir))]
pub fn aggregate<V: VcsClient + ?Sized>(
    vcs: &V,
    options: &AggregateOptions,
) -> ChangelogResult<Changelog> {
    vcs::ensure_baseline_tag(vcs)?;
    let tags = qualifying_tags(vcs.list_tags()?, options);

    let mut changelog = Changelog::default();
    // The baseline boundary includes the root commit itself
    let mut previous: Option<&str> = None;

    for tag in &tags {
        if tag.is_baseline() {
            continue;
        }

        let release = collect_release(vcs, previous, tag, &options.fragment_dir)?;
        if release.is_empty() {
            debug!(tag = %tag.name, "no new fragments");
        } else {
            debug!(tag = %tag.name, fragments = release.len(), "release collected");
            changelog.releases.push(release);
        }
        previous = Some(tag.name.as_str());
    }

    info!(releases = changelog.releases.len(), "changelog aggregated");
    Ok(changelog)
}

fn collect_release<V: VcsClient + ?Sized>(
    vcs: &V,
    previous: Option<&str>,
    tag: &Tag,
    fragment_dir: &Utf8Path,
) -> ChangelogResult<Release> {
    let mut release = Release::new(tag.clone());

    for path in fragment::changed_fragments(vcs, previous, &tag.name, fragment_dir)? {
        let Some(file_name) = path.file_name() else {
            continue;
        };

        let (identifier, category) = match fragment::classify(file_name) {
            Ok(parsed) => parsed,
            Err(ClassificationError::Reserved(_)) => continue,
            Err(err) => {
                warn!(tag = %tag.name, %path, error = %err, "skipping fragment");
                continue;
            }
        };

        let content = vcs.read_file(&tag.name, &path)?;
        release.insert(Fragment::new(identifier, category, &content));
    }

    Ok(release)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::MemoryRepo;

    /// `1.feature.md` tagged v0.0.1, `2.bugfix.md` tagged v0.1.0.
    fn two_release_repo() -> MemoryRepo {
        let repo = MemoryRepo::new();
        let a = repo.commit(1_700_000_000, &[("changelog.d/1.feature.md", "Initial commit\n")]);
        repo.tag("v0.0.1", a);
        let b = repo.commit(1_700_086_400, &[("changelog.d/2.bugfix.md", "Fixed X\n")]);
        repo.tag("v0.1.0", b);
        repo
    }

    fn names(changelog: &Changelog) -> Vec<&str> {
        changelog.releases.iter().map(Release::name).collect()
    }

    #[test]
    fn fragments_attach_to_introducing_tag() {
        let repo = two_release_repo();
        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();

        assert_eq!(names(&changelog), ["v0.0.1", "v0.1.0"]);
        let first = changelog.release("v0.0.1").unwrap();
        assert_eq!(first.fragments(Category::Feature)[0].content, "Initial commit");
        assert!(first.fragments(Category::Bugfix).is_empty());

        let second = changelog.release("v0.1.0").unwrap();
        assert_eq!(second.fragments(Category::Bugfix)[0].content, "Fixed X");
        assert!(second.fragments(Category::Feature).is_empty());
    }

    #[test]
    fn aggregation_creates_baseline_but_never_reports_it() {
        let repo = two_release_repo();
        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();

        assert!(repo.list_tags().unwrap().iter().any(Tag::is_baseline));
        assert!(changelog.release(BASELINE_TAG).is_none());
    }

    #[test]
    fn unknown_category_does_not_disturb_siblings() {
        let repo = MemoryRepo::new();
        let a = repo.commit(
            100,
            &[
                ("changelog.d/5.moose.md", "Bad entry"),
                ("changelog.d/6.feature.md", "Good entry"),
                ("changelog.d/notes", "not a fragment"),
            ],
        );
        repo.tag("v1.0.0", a);

        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();
        let release = changelog.release("v1.0.0").unwrap();
        assert_eq!(release.len(), 1);
        assert_eq!(release.fragments(Category::Feature)[0].identifier, "6");
    }

    #[test]
    fn release_with_only_invalid_fragments_is_dropped() {
        let repo = two_release_repo();
        let c = repo.commit(1_700_172_800, &[("changelog.d/5.moose.md", "Bad")]);
        repo.tag("v0.2.0", c);

        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert_eq!(names(&changelog), ["v0.0.1", "v0.1.0"]);
    }

    #[test]
    fn empty_release_still_advances_the_boundary() {
        let repo = two_release_repo();
        let c = repo.commit(1_700_172_800, &[("src/lib.rs", "")]);
        repo.tag("v0.2.0", c);
        let d = repo.commit(1_700_259_200, &[("changelog.d/3.doc.md", "Docs")]);
        repo.tag("v0.3.0", d);

        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert_eq!(names(&changelog), ["v0.0.1", "v0.1.0", "v0.3.0"]);
        assert_eq!(changelog.release("v0.3.0").unwrap().len(), 1);
    }

    #[test]
    fn reserved_files_are_not_fragments() {
        let repo = MemoryRepo::new();
        let a = repo.commit(
            100,
            &[
                ("changelog.d/HEADER.md", "# Header"),
                ("changelog.d/FOOTER.md", "# Footer"),
                ("changelog.d/README.md", "How to write fragments"),
            ],
        );
        repo.tag("v1.0.0", a);

        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert!(changelog.is_empty());
    }

    #[test]
    fn non_version_tags_are_filtered_by_default() {
        let repo = two_release_repo();
        let c = repo.commit(1_700_172_800, &[("changelog.d/6.bugfix.md", "Filter off")]);
        repo.tag("latest", c);

        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert_eq!(names(&changelog), ["v0.0.1", "v0.1.0"]);

        let options = AggregateOptions {
            only_version_tags: false,
            ..AggregateOptions::default()
        };
        let changelog = aggregate(&repo, &options).unwrap();
        assert_eq!(names(&changelog), ["v0.0.1", "v0.1.0", "latest"]);
    }

    #[test]
    fn stable_filter_excludes_prereleases() {
        let repo = two_release_repo();
        let c = repo.commit(1_700_172_800, &[("changelog.d/10.feature.md", "Pre-release")]);
        repo.tag("v0.1.10a1", c);

        let stable = AggregateOptions {
            only_stable_releases: true,
            ..AggregateOptions::default()
        };
        assert_eq!(names(&aggregate(&repo, &stable).unwrap()), ["v0.0.1", "v0.1.0"]);

        let all = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert_eq!(names(&all), ["v0.0.1", "v0.1.0", "v0.1.10a1"]);
    }

    #[test]
    fn prerelease_fragments_roll_into_next_stable_release() {
        let repo = two_release_repo();
        let c = repo.commit(1_700_172_800, &[("changelog.d/10.feature.md", "Beta feature")]);
        repo.tag("v0.2.0b1", c);
        let d = repo.commit(1_700_259_200, &[("changelog.d/11.bugfix.md", "Beta fix")]);
        repo.tag("v0.2.0", d);

        let options = AggregateOptions {
            only_stable_releases: true,
            ..AggregateOptions::default()
        };
        let changelog = aggregate(&repo, &options).unwrap();
        let release = changelog.release("v0.2.0").unwrap();
        assert_eq!(release.len(), 2);
    }

    #[test]
    fn tags_on_the_same_commit_do_not_duplicate_fragments() {
        let repo = two_release_repo();
        let c = repo.commit(1_700_172_800, &[("changelog.d/3.misc.md", "Misc")]);
        repo.tag("v0.2.0", c);
        repo.tag("v0.2.0-final", c);

        let options = AggregateOptions {
            only_stable_releases: false,
            ..AggregateOptions::default()
        };
        let changelog = aggregate(&repo, &options).unwrap();
        let total: usize = changelog.releases.iter().map(Release::len).sum();
        assert_eq!(total, 3);
        assert!(changelog.release("v0.2.0-final").is_none());
    }

    #[test]
    fn content_is_read_at_the_release_revision() {
        let repo = two_release_repo();
        repo.remove(1_700_172_800, &["changelog.d/1.feature.md"]);

        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert_eq!(
            changelog.release("v0.0.1").unwrap().fragments(Category::Feature)[0].content,
            "Initial commit"
        );
    }

    #[test]
    fn repeated_identifier_keeps_first_position() {
        let mut release = Release::new(Tag::new("v1", 0));
        release.insert(Fragment::new("1", Category::Feature, "one"));
        release.insert(Fragment::new("2", Category::Feature, "two"));
        release.insert(Fragment::new("1", Category::Feature, "uno"));

        let contents: Vec<_> = release
            .fragments(Category::Feature)
            .iter()
            .map(|f| f.content.as_str())
            .collect();
        assert_eq!(contents, ["uno", "two"]);
    }

    #[test]
    fn aggregation_is_deterministic() {
        let repo = two_release_repo();
        let first = aggregate(&repo, &AggregateOptions::default()).unwrap();
        let second = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_repository_yields_empty_changelog() {
        let repo = MemoryRepo::new();
        let changelog = aggregate(&repo, &AggregateOptions::default()).unwrap();
        assert!(changelog.is_empty());
    }

    #[test]
    fn custom_fragment_directory() {
        let repo = MemoryRepo::new();
        let a = repo.commit(
            100,
            &[
                ("docs/changes/1.feature.md", "Nested"),
                ("changelog.d/2.feature.md", "Default dir"),
            ],
        );
        repo.tag("v1.0.0", a);

        let options = AggregateOptions {
            fragment_dir: Utf8PathBuf::from("docs/changes"),
            ..AggregateOptions::default()
        };
        let changelog = aggregate(&repo, &options).unwrap();
        let release = changelog.release("v1.0.0").unwrap();
        assert_eq!(release.len(), 1);
        assert_eq!(release.fragments(Category::Feature)[0].content, "Nested");
    }

    #[test]
    fn qualifying_tags_put_baseline_first() {
        let tags = vec![
            Tag::new("v0.1.0", 50),
            Tag::new(BASELINE_TAG, 100),
            Tag::new("v0.0.1", 10),
        ];
        let ordered: Vec<_> = qualifying_tags(tags, &AggregateOptions::default())
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(ordered, [BASELINE_TAG, "v0.0.1", "v0.1.0"]);
    }

    #[test]
    fn prerelease_detection() {
        assert!(is_prerelease("v0.1.10a1", "v"));
        assert!(is_prerelease("v1.0.0-rc.1", "v"));
        assert!(is_prerelease("2.0b3", "v"));
        assert!(!is_prerelease("v1.2.3", "v"));
        assert!(!is_prerelease("v1.2.3+build.5", "v"));
        assert!(!is_prerelease("latest", "v"));
        assert!(!is_prerelease(BASELINE_TAG, "v"));
    }

    #[test]
    fn version_tag_detection() {
        assert!(is_version_tag("v1.0.0", "v"));
        assert!(!is_version_tag("latest", "v"));
        assert!(is_version_tag("release-1", "release-"));
    }
}
