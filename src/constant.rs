/// Application name and metadata constants
pub const APP_NAME: &str = "config-history";

/// Context window presets offered by the diff view
pub const CONTEXT_PRESETS: [usize; 4] = [0, 3, 5, 10];
pub const DEFAULT_CONTEXT_LINES: usize = 3;

/// Rollback cutoff defaults
pub const DEFAULT_CUTOFF_HOURS: i64 = 24;

/// Comparison selection holds at most this many versions
pub const MAX_COMPARE_SELECTION: usize = 2;
