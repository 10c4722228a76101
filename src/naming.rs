//
// naming.rs
// Dicom-Pseudonymizer-rs
//
// Parses identifiers out of patient and study directory names and composes their pseudonymous replacements.
//

/// Number of leading characters of a study directory name that carry the patient identity.
pub const STUDY_PREFIX_LEN: usize = 11;

/// Patient code embedded in a patient directory name: the text after the last `-`.
///
/// A name without any `-` is returned whole; a trailing `-` yields an empty code.
pub fn patient_code(dir_name: &str) -> &str {
    match dir_name.rfind('-') {
        Some(idx) => &dir_name[idx + 1..],
        None => dir_name,
    }
}

/// Study directory name with its first [`STUDY_PREFIX_LEN`] characters removed.
///
/// Characters, not bytes, are counted. Names no longer than the prefix yield an empty suffix.
pub fn study_suffix(dir_name: &str) -> &str {
    match dir_name.char_indices().nth(STUDY_PREFIX_LEN) {
        Some((idx, _)) => &dir_name[idx..],
        None => "",
    }
}

/// `{provider}-{patient}`: the patient directory name and the value written into records.
pub fn pseudonym(provider_id: &str, patient_id: &str) -> String {
    format!("{provider_id}-{patient_id}")
}

/// `{pseudonym}_{suffix}`: the renamed study directory.
pub fn study_name(pseudonym: &str, suffix: &str) -> String {
    format!("{pseudonym}_{suffix}")
}
