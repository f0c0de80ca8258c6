use semver::Version;

/// Installed versions below this are treated as unknown.
pub const MINIMUM_INSTALLED_VERSION: Version = Version::new(1, 0, 0);

/// Parses a migration directory name of the exact form `MAJOR.MINOR.PATCH`.
///
/// Anything else (a `v` prefix, pre-release tags, missing components, stray
/// files) yields `None` so callers can skip the entry without reporting it.
pub fn parse_version_dir(name: &str) -> Option<Version> {
    let mut parts = name.split('.');
    let major = parse_component(parts.next()?)?;
    let minor = parse_component(parts.next()?)?;
    let patch = parse_component(parts.next()?)?;
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}

/// Parses the installed version recorded in the environment file.
///
/// Accepts `MAJOR.MINOR` as shorthand for `MAJOR.MINOR.0`. Values that do not
/// parse, or that sit below [`MINIMUM_INSTALLED_VERSION`], return `None`.
pub fn parse_installed_version(raw: &str) -> Option<Version> {
    let trimmed = raw.trim();
    let version = match trimmed.matches('.').count() {
        1 => parse_version_dir(&format!("{trimmed}.0"))?,
        2 => parse_version_dir(trimmed)?,
        _ => return None,
    };
    if version < MINIMUM_INSTALLED_VERSION {
        return None;
    }
    Some(version)
}

pub fn is_eligible(version: &Version, current: &Version, target: &Version) -> bool {
    current < version && version <= target
}

fn parse_component(raw: &str) -> Option<u64> {
    if raw.is_empty() || !raw.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
