//! CLI Exit Code Registry
//!
//! Single source of truth for `fleetreport` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                           |
//! |------|---------------------------------------------------|
//! | 0    | Success                                           |
//! | 1    | General error (unspecified)                       |
//! | 2    | Usage error (bad args, bad rules file)            |
//! | 3    | I/O error (missing file, unwritable output)       |
//! | 4    | Parse/decode error (unreadable spreadsheet)       |
//! | 10   | Upload rejected (wrong city, missing columns)     |
//! | 11   | No session (run `fleetreport process` first)      |
//! | 12   | Busy (another process/export holds the lock)      |

use crate::session::SessionError;

// =============================================================================
// Universal (0-4)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, invalid rules config.
pub const EXIT_USAGE: u8 = 2;

/// I/O error - file missing or not writable.
pub const EXIT_IO: u8 = 3;

/// Parse error - input spreadsheet or session file cannot be decoded.
pub const EXIT_PARSE: u8 = 4;

// =============================================================================
// Workflow (10-19)
// =============================================================================

/// Upload gate rejected an input file.
pub const EXIT_UPLOAD_REJECTED: u8 = 10;

/// No processed session to work on.
pub const EXIT_NO_SESSION: u8 = 11;

/// Processing lock held by another invocation.
pub const EXIT_BUSY: u8 = 12;

pub fn session_exit_code(err: &SessionError) -> u8 {
    match err {
        SessionError::NotFound(_) => EXIT_NO_SESSION,
        SessionError::Busy(_) => EXIT_BUSY,
        SessionError::Io(_) => EXIT_IO,
        SessionError::Corrupt(_) | SessionError::Version { .. } => EXIT_PARSE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_ERROR,
            EXIT_USAGE,
            EXIT_IO,
            EXIT_PARSE,
            EXIT_UPLOAD_REJECTED,
            EXIT_NO_SESSION,
            EXIT_BUSY,
        ];
        let unique: std::collections::HashSet<_> = codes.iter().collect();
        assert_eq!(unique.len(), codes.len());
    }

    #[test]
    fn test_session_error_mapping() {
        assert_eq!(session_exit_code(&SessionError::NotFound(PathBuf::from("s.json"))), EXIT_NO_SESSION);
        assert_eq!(session_exit_code(&SessionError::Busy(PathBuf::from("s.json.lock"))), EXIT_BUSY);
        assert_eq!(session_exit_code(&SessionError::Corrupt("bad".into())), EXIT_PARSE);
    }
}
