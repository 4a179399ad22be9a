//! Canonical artifact filenames and the parsing rules derived from them.
//!
//! Raw track messages arrive under dissemination names like
//! `A_JSXX02ECMF020000_C_ECMF_20250102000000_tropical_cyclone_track_ALEX_-68p5degW_14p5degN_bufr4.bin`;
//! splitting on `_`, token 8 is the storm identifier. A storm is *named*
//! iff that identifier does not start with a digit (unnamed depressions
//! carry numeric advisory ids).

use crate::registry::RunId;

/// Expected extension of raw downloaded track messages.
pub const BUFR_EXTENSION: &str = ".bin";
/// Substring identifying the data kind of a raw track message.
pub const BUFR_MARKER: &str = "tropical_cyclone_track";
/// Position of the storm identifier in a `_`-delimited download name.
pub const STORM_TOKEN_INDEX: usize = 8;

/// Consolidated track file written next to the raw downloads.
pub const TRACKS_FILE: &str = "ECMWF_TC_tracks.h5";

/// Impact-kind token marking an exposed-population impact file.
pub const AFFECTED_MARKER: &str = "exposed_population";
/// Impact-kind token marking a displacement impact file.
pub const DISPLACED_MARKER: &str = "displaced";

/// Finished report page; its presence marks the report stage complete.
pub const REPORT_HTML: &str = "report.html";
/// Markdown source of the report, required for index inclusion.
pub const REPORT_MD: &str = "report.md";
/// Machine-readable per-run summary, required for index inclusion.
pub const SUMMARY_STATS: &str = "summary_stats.json";

/// Storm identifier embedded in a raw download filename, if present.
pub fn storm_id(filename: &str) -> Option<&str> {
    filename.split('_').nth(STORM_TOKEN_INDEX)
}

/// A storm is named iff its identifier does not start with a digit.
pub fn is_named_storm(storm_id: &str) -> bool {
    storm_id.chars().next().is_some_and(|c| !c.is_ascii_digit())
}

/// Canonical name of the global track plot for a run.
pub fn track_plot_file(run: &RunId) -> String {
    format!("ECMWF_TC_tracks_{run}.png")
}

/// Canonical name of one storm's wind field grid.
pub fn wind_field_file(storm: &str, run: &RunId) -> String {
    format!("tc_wind_{storm}_{run}.hdf5")
}

/// Canonical name of one impact file.
pub fn impact_file(storm: &str, country_iso3: &str, impact_kind: &str) -> String {
    format!("{storm}_{country_iso3}_{impact_kind}.h5")
}
