//! Exit codes returned by the `crm` binary. Mirrors `click`'s own usage-error exit convention
//! at `1` so scripts that already know that convention keep working.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    ClickUsage = 1,
    Io = 2,
    Parse = 3,
    Patch = 4,
    Http = 5,
    IllegalOperation = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
