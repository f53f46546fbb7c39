use std::time::Duration;

/// Switches the Windows console to UTF-8 so the status glyphs print intact.
#[cfg(windows)]
pub fn setup_console() {
    use windows_sys::Win32::System::Console::SetConsoleOutputCP;
    const CP_UTF8: u32 = 65001;
    unsafe {
        SetConsoleOutputCP(CP_UTF8);
    }
}

#[cfg(not(windows))]
pub fn setup_console() {}

/// Comma separated list with surrounding whitespace and empty entries dropped.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn round_secs(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 100.0).round() / 100.0
}
