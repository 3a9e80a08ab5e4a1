/// Icons used in modshim's text output.
///
/// A small curated set of nerd font glyphs; JSON output never contains them
/// in structured fields, only inside the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NerdFont {
    // Status and feedback
    Check,
    CrossCircle,
    Warning,
    Info,

    // Commands and logs
    Terminal,
    Download,
    Upload,
    List,
    Clock,
}

impl NerdFont {
    pub const fn unicode(&self) -> char {
        match self {
            Self::Check => '\u{f00c}',       // fa-check
            Self::CrossCircle => '\u{f057}', // fa-times-circle
            Self::Warning => '\u{f071}',     // fa-exclamation-triangle
            Self::Info => '\u{f05a}',        // fa-info-circle
            Self::Terminal => '\u{f120}',    // fa-terminal
            Self::Download => '\u{f019}',    // fa-download
            Self::Upload => '\u{f093}',      // fa-upload
            Self::List => '\u{f03a}',        // fa-list
            Self::Clock => '\u{f017}',       // fa-clock
        }
    }
}

impl From<NerdFont> for char {
    fn from(icon: NerdFont) -> Self {
        icon.unicode()
    }
}

impl From<NerdFont> for String {
    fn from(icon: NerdFont) -> Self {
        icon.unicode().to_string()
    }
}
