//! Every branch on the format's version fields lives in this module.

use std::io::{BufRead, Seek};
use std::ops::RangeInclusive;

use super::cursor::TokenCursor;
use crate::error::{Result, SifError};

/// Value stored under `spectrograph` when the version has no rule for it.
pub const UNCHECKED_SPECTROGRAPH: &str = "unchecked";

/// `SifCalbVersion` that is followed by one extra line before the
/// calibration coefficients.
pub const CALIBRATION_SKIP_VERSION: i64 = 65540;

/// The only `SifVersion` whose post-timestamp flag `1` is followed by one
/// extra line per frame.
pub const FLAG_BLOCK_VERSION: i64 = 65567;

// ---------------------------------------------------------------------------
// Dispatch table
// ---------------------------------------------------------------------------

/// How the lines after the shutter-time pair are laid out for a range of
/// `SifVersion` values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRule {
    pub versions: RangeInclusive<i64>,
    /// Lines skipped before the spectrograph line (or in total, when there
    /// is none).
    pub skip_lines: usize,
    /// Whether the line after the skipped block names the spectrograph.
    pub spectrograph_line: bool,
    /// Lines skipped after the spectrograph line.
    pub trailing_lines: usize,
}

const fn rule(
    versions: RangeInclusive<i64>,
    skip_lines: usize,
    spectrograph_line: bool,
    trailing_lines: usize,
) -> VersionRule {
    VersionRule {
        versions,
        skip_lines,
        spectrograph_line,
        trailing_lines,
    }
}

pub static VERSION_TABLE: &[VersionRule] = &[
    rule(65548..=65557, 2, false, 0),
    rule(65558..=65558, 5, false, 0),
    rule(65559..=65559, 8, true, 0),
    rule(65564..=65564, 8, true, 0),
    rule(65565..=65565, 15, false, 0),
    rule(65566..=i64::MAX, 8, true, 9),
];

/// Rule for `version`, or `None` for versions nobody has checked.
pub fn lookup(version: i64) -> Option<&'static VersionRule> {
    VERSION_TABLE.iter().find(|r| r.versions.contains(&version))
}

/// Skip the version-dependent block and return the spectrograph name.
///
/// The name is the second whitespace-separated token of the line that
/// follows the skipped block; versions without such a line (or without a
/// rule) yield [`UNCHECKED_SPECTROGRAPH`].
pub fn skip_version_block<R: BufRead + Seek>(
    cursor: &mut TokenCursor<R>,
    version: i64,
) -> Result<String> {
    let Some(rule) = lookup(version) else {
        log::debug!("SifVersion {version} has no dispatch rule, nothing skipped");
        return Ok(UNCHECKED_SPECTROGRAPH.to_string());
    };
    log::debug!("SifVersion {version}: {rule:?}");

    cursor.skip_lines(rule.skip_lines)?;
    if !rule.spectrograph_line {
        return Ok(UNCHECKED_SPECTROGRAPH.to_string());
    }

    let offset = cursor.position()?;
    let line = cursor.read_line()?;
    let name = line
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty())
        .nth(1)
        .map(|token| String::from_utf8_lossy(token).into_owned())
        .ok_or_else(|| SifError::format(offset, "spectrograph line has fewer than two tokens"))?;
    cursor.skip_lines(rule.trailing_lines)?;
    Ok(name)
}

/// Lines to skip after reading `SifCalbVersion`.
pub fn calibration_skip_lines(calibration_version: i64) -> usize {
    usize::from(calibration_version == CALIBRATION_SKIP_VERSION)
}

/// Whether a post-timestamp flag of `1` is followed by one line per frame.
pub fn has_flag_block(version: i64) -> bool {
    version == FLAG_BLOCK_VERSION
}
