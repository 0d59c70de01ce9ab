use owo_colors::Style;
use std::sync::OnceLock;

use crate::migrate::MatchStrategy;

static THEME: OnceLock<Theme> = OnceLock::new();

#[derive(Debug, Clone)]
pub struct Theme {
    pub header: Style,
    pub success: Style,
    pub error: Style,
    pub warn: Style,
    pub info: Style,
    pub dim: Style,
    pub muted: Style,
    /// Records synthesized in the target store
    pub created: Style,
}

impl Theme {
    pub fn detect() -> Self {
        if !console::Term::stdout().is_term() || !console::colors_enabled() {
            return Self::plain();
        }
        Self::colored()
    }

    pub fn colored() -> Self {
        Self {
            header: Style::new().cyan().bold(),
            success: Style::new().green().bold(),
            error: Style::new().red().bold(),
            warn: Style::new().yellow().bold(),
            info: Style::new().magenta(),
            dim: Style::new().white().dimmed(),
            muted: Style::new().bright_black(),
            created: Style::new().blue().bold(),
        }
    }

    pub fn plain() -> Self {
        Self {
            header: Style::new(),
            success: Style::new(),
            error: Style::new(),
            warn: Style::new(),
            info: Style::new(),
            dim: Style::new(),
            muted: Style::new(),
            created: Style::new(),
        }
    }

    /// Style of a resolution outcome
    pub fn strategy(&self, strategy: &MatchStrategy) -> Style {
        match strategy {
            MatchStrategy::Exact | MatchStrategy::BiosphereExact => self.success.clone(),
            MatchStrategy::Fuzzy { .. } | MatchStrategy::BiosphereFuzzy { .. } => self.warn.clone(),
            MatchStrategy::Created => self.created.clone(),
            MatchStrategy::NotFound => self.error.clone(),
        }
    }
}

pub fn theme() -> &'static Theme {
    THEME.get_or_init(Theme::detect)
}
