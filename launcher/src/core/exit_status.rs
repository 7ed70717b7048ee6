//! Mapping of raw process termination to shell-style exit codes.

use crate::exit_codes;

/// Fold an exit code or terminating signal into a single shell-style code.
///
/// `code` wins when present. A signal `s` maps to `128 + s`. A status with
/// neither (not expected on supported platforms) maps to [`exit_codes::INVALID`].
pub fn shell_exit_code(code: Option<i32>, signal: Option<i32>) -> i32 {
    match (code, signal) {
        (Some(code), _) => code,
        (None, Some(signal)) => exit_codes::SIGNAL_BASE + signal,
        (None, None) => exit_codes::INVALID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_code_passes_through() {
        assert_eq!(shell_exit_code(Some(0), None), 0);
        assert_eq!(shell_exit_code(Some(3), None), 3);
    }

    #[test]
    fn signal_maps_to_128_plus_signal() {
        // SIGINT, SIGTERM
        assert_eq!(shell_exit_code(None, Some(2)), 130);
        assert_eq!(shell_exit_code(None, Some(15)), 143);
    }

    #[test]
    fn unknown_termination_is_invalid() {
        assert_eq!(shell_exit_code(None, None), exit_codes::INVALID);
    }
}
