//! Process exit codes (§10.1 exit code table).
//!
//! | Code | Meaning |
//! |---|---|
//! | 0 | success / terminal PASS or PASS_WITH_WARNINGS |
//! | 1 | internal/unexpected error |
//! | 2 | invalid CLI arguments or configuration |
//! | 3 | toolkit not located / Java unavailable |
//! | 4 | run directory already locked by another process |
//! | 5 | workflow reported FAIL |
//! | 130 | interrupted (cancellation) |

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);
    pub const INTERNAL: ExitCode = ExitCode(1);
    pub const CLI_ARGS: ExitCode = ExitCode(2);
    pub const TOOLKIT_NOT_LOCATED: ExitCode = ExitCode(3);
    pub const LOCK_HELD: ExitCode = ExitCode(4);
    pub const WORKFLOW_FAILED: ExitCode = ExitCode(5);
    pub const INTERRUPTED: ExitCode = ExitCode(130);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<i32> for ExitCode {
    fn from(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_match_documented_table() {
        assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
        assert_eq!(ExitCode::INTERNAL.as_i32(), 1);
        assert_eq!(ExitCode::CLI_ARGS.as_i32(), 2);
        assert_eq!(ExitCode::TOOLKIT_NOT_LOCATED.as_i32(), 3);
        assert_eq!(ExitCode::LOCK_HELD.as_i32(), 4);
        assert_eq!(ExitCode::WORKFLOW_FAILED.as_i32(), 5);
        assert_eq!(ExitCode::INTERRUPTED.as_i32(), 130);
    }

    #[test]
    fn round_trips_through_i32() {
        let code: ExitCode = 5.into();
        let back: i32 = code.into();
        assert_eq!(back, 5);
    }
}
