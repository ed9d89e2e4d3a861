use bankprobe_core::MAX_STREAM_NAME;

/// Caller choices for resolving a wave bank.
///
/// The defaults are what most banks need; the overrides exist for sound
/// banks that list several wave banks with the same stream count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankOptions {
    /// 1-based wave bank inside the companion sound bank.
    pub wavebank: Option<u8>,
    /// 1-based sound record to start the name search from.
    pub start_sound: Option<u32>,
    /// Longest stream name accepted, in bytes.
    pub max_name_len: usize,
}

impl Default for BankOptions {
    fn default() -> Self {
        Self {
            wavebank: None,
            start_sound: None,
            max_name_len: MAX_STREAM_NAME,
        }
    }
}
