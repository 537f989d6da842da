//! Synchronous front half of the pipeline: signature check, member discovery
//! and JSON parsing. Runs on a blocking thread.

use rollcall_archive::error::ErrorKind as ArchiveErrorKind;
use rollcall_archive::{Archive, Signature, validate};
use rollcall_extract::error::ErrorKind as ExtractErrorKind;
use rollcall_extract::models::{FileDiscovery, ParseWarning, Severity, WarningCode};
use rollcall_extract::{LogicalFile, ParsedMember, RawEntry, parse_member};
use tracing::instrument;

const FIX_REDOWNLOAD: &str = "Download the export again; the file may have been cut off.";
const FIX_JSON_FORMAT: &str = "Request a new export and choose JSON as the format.";
const FIX_SELECT_CONNECTIONS: &str = "Request a new export that includes 'Followers and following'.";

pub(crate) struct Extraction {
    /// `None` when the container couldn't be opened at all.
    pub discovery: Option<FileDiscovery>,
    /// Entries of every logical file with at least one usable member, in
    /// [`LogicalFile::ALL`] order.
    pub lists: Vec<(LogicalFile, Vec<RawEntry>)>,
    pub warnings: Vec<ParseWarning>,
}

impl Extraction {
    fn failed(warning: ParseWarning) -> Self {
        Self { discovery: None, lists: Vec::new(), warnings: vec![warning] }
    }
}

/// The `NOT_ZIP` warning for an upload that fails the signature check, or
/// `None` if the signature is fine.
pub(crate) fn signature_warning(bytes: &[u8]) -> Option<ParseWarning> {
    if validate(bytes) {
        return None;
    }
    let fix = match Signature::detect(bytes) {
        Signature::Json => "Upload the whole export .zip, not a single file from inside it.".to_string(),
        Signature::Unknown => "Select the .zip file you downloaded.".to_string(),
        other => format!("This is a {other} file. Download the export again as a .zip."),
    };
    Some(ParseWarning::error(WarningCode::NotZip, "The selected file is not a ZIP archive.").with_fix(fix))
}

fn corrupted() -> ParseWarning {
    ParseWarning::error(WarningCode::CorruptedZip, "The archive is damaged and can't be opened.").with_fix(FIX_REDOWNLOAD)
}

/// Discover and parse every expected member, collecting warnings instead of
/// stopping at the first problem.
#[instrument(skip(bytes), fields(archive_size = bytes.len()))]
pub(crate) fn extract(bytes: &[u8]) -> Extraction {
    let mut archive = match Archive::open(bytes) {
        Ok(archive) => archive,
        Err(err) if *err == ArchiveErrorKind::NotZip => {
            return Extraction::failed(signature_warning(bytes).unwrap_or_else(corrupted));
        },
        Err(err) => {
            tracing::debug!(error = ?err, "Archive could not be opened");
            return Extraction::failed(corrupted());
        },
    };
    let names = archive.member_names();
    let mut discovery = FileDiscovery::discover(&names);
    let mut warnings = Vec::new();

    let html_export = discovery.is_html_export();
    if html_export {
        warnings.push(
            ParseWarning::error(WarningCode::HtmlExport, "The export contains HTML files instead of JSON.")
                .with_fix(FIX_JSON_FORMAT),
        );
    }

    let mut lists = Vec::new();
    let mut required_failures = Vec::new();
    let mut usable_required = 0;
    for file in LogicalFile::ALL {
        let members = discovery.get(file).members.clone();
        if members.is_empty() {
            if !file.required() {
                warnings.push(ParseWarning::info(
                    WarningCode::OptionalFileMissing,
                    format!("No {} list found; that badge will be empty.", file.name()),
                ));
            } else if !html_export {
                warnings.push(
                    ParseWarning::error(WarningCode::MissingRequiredFile, format!("The {} list is missing.", file.name()))
                        .with_fix(FIX_SELECT_CONNECTIONS),
                );
            }
            continue;
        }

        let mut entries = Vec::new();
        let mut item_count = 0;
        let mut usable = false;
        for member in &members {
            match read_member(&mut archive, member) {
                Ok(parsed) => {
                    usable = true;
                    item_count += parsed.entries.len() + parsed.skipped;
                    entries.extend(parsed.entries);
                },
                Err(warning) => {
                    if file.required() {
                        required_failures.push(warnings.len());
                    }
                    warnings.push(warning);
                },
            }
        }
        discovery.get_mut(file).item_count = Some(item_count);
        if !usable {
            continue;
        }
        if entries.is_empty() {
            warnings.push(ParseWarning::warning(
                WarningCode::EmptyMember,
                format!("The {} list contains no accounts.", file.name()),
            ));
        }
        if file.required() {
            usable_required += 1;
        }
        lists.push((file, entries));
    }

    // A broken required list is tolerated while another required list is
    // still usable.
    if usable_required == 0 {
        for i in required_failures {
            warnings[i].severity = Severity::Error;
        }
    }
    tracing::debug!(lists = lists.len(), warnings = warnings.len(), "Archive members parsed");
    Extraction { discovery: Some(discovery), lists, warnings }
}

fn read_member(archive: &mut Archive<'_>, member: &str) -> Result<ParsedMember, ParseWarning> {
    let bytes = archive.read(member).map_err(|err| {
        tracing::debug!(member, error = ?err, "Member could not be read");
        ParseWarning::warning(WarningCode::CorruptedZip, format!("{member} could not be decompressed."))
            .with_fix(FIX_REDOWNLOAD)
    })?;
    parse_member(&bytes).map_err(|err| match &*err {
        ExtractErrorKind::MalformedJson => {
            ParseWarning::warning(WarningCode::JsonParseError, format!("{member} is not valid JSON."))
                .with_fix(FIX_REDOWNLOAD)
        },
        ExtractErrorKind::InvalidStructure(detail) => ParseWarning::warning(
            WarningCode::InvalidDataStructure,
            format!("{member} has an unexpected structure ({detail})."),
        ),
        other => ParseWarning::warning(WarningCode::InvalidDataStructure, format!("{member}: {other}.")),
    })
}
