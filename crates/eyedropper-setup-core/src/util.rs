//! Status code helpers and log sanitizing shared by the bootstrapper crates.

/// Win32 `ERROR_CANCELLED`, reported when the user dismisses an elevation prompt.
pub const USER_CANCELLED_ERROR_CODE: i32 = 1223;

const WIN32_FACILITY_MASK: u32 = 0xFFFF_0000;
const WIN32_FACILITY_PREFIX: u32 = 0x8007_0000;
const LOG_SNIPPET_LIMIT: usize = 160;

/// Returns true for success HRESULTs (non-negative values).
pub fn succeeded(status: i32) -> bool {
    status >= 0
}

/// Converts a `0x8007xxxx` HRESULT into its Win32 code; other values pass through.
pub fn exit_code_from_status(status: i32) -> i32 {
    let bits = status as u32;
    if bits & WIN32_FACILITY_MASK == WIN32_FACILITY_PREFIX {
        (bits & 0xFFFF) as i32
    } else {
        status
    }
}

/// Builds the `0x8007xxxx` HRESULT for a Win32 error code.
pub fn hresult_from_win32(code: u16) -> i32 {
    (WIN32_FACILITY_PREFIX | u32::from(code)) as i32
}

/// Strips newlines and caps length so engine-supplied text stays on one log line.
pub fn sanitize_log_value(value: &str, max_len: usize) -> String {
    if max_len == 0 {
        return String::new();
    }
    let mut cleaned = String::with_capacity(max_len.min(value.len()));
    let mut truncated = false;
    for (count, ch) in value.chars().enumerate() {
        if count >= max_len {
            truncated = true;
            break;
        }
        cleaned.push(if ch == '\n' || ch == '\r' { ' ' } else { ch });
    }
    let trimmed = cleaned.trim();
    if truncated {
        format!("{trimmed}...")
    } else {
        trimmed.to_string()
    }
}

pub fn log_snippet(value: &str) -> String {
    sanitize_log_value(value, LOG_SNIPPET_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win32_hresults_convert_to_low_word() {
        assert_eq!(exit_code_from_status(0x8007_0005_u32 as i32), 5);
        assert_eq!(exit_code_from_status(0), 0);
        assert_eq!(exit_code_from_status(3010), 3010);
    }

    #[test]
    fn other_facilities_pass_through() {
        let status = 0x8004_0001_u32 as i32;
        assert_eq!(exit_code_from_status(status), status);
    }

    #[test]
    fn hresult_round_trips_through_exit_code() {
        let status = hresult_from_win32(1602);
        assert!(!succeeded(status));
        assert_eq!(exit_code_from_status(status), 1602);
    }

    #[test]
    fn sanitize_log_value_strips_newlines_and_caps() {
        assert_eq!(sanitize_log_value("ab\ncd\rEF", 5), "ab cd...");
        assert_eq!(sanitize_log_value("ok", 5), "ok");
        assert_eq!(sanitize_log_value("anything", 0), "");
    }
}
