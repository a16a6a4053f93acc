use serde::{Deserialize, Serialize};

/// Achievement snapshot as reported by a backend
///
/// Completion is stored as a fraction in `[0.0, 1.0]`; whether the
/// achievement is unlocked is always derived from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementInfo {
    id: String,

    #[serde(default)]
    title: Option<String>,

    /// May be absent for secret achievements that are still locked
    #[serde(default)]
    description: Option<String>,

    #[serde(default)]
    completion_percentage: f32,

    #[serde(default)]
    icon_url: Option<String>,
}

impl AchievementInfo {
    /// Create a new achievement snapshot
    ///
    /// `completion_percentage` is clamped to `[0.0, 1.0]`; NaN counts as no progress.
    pub fn new(id: impl Into<String>, completion_percentage: f32) -> Self {
        Self {
            id: id.into(),
            title: None,
            description: None,
            completion_percentage: clamp_completion(completion_percentage),
            icon_url: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_icon_url(mut self, icon_url: impl Into<String>) -> Self {
        self.icon_url = Some(icon_url.into());
        self
    }

    /// Same achievement at a different completion (clamped like `new`)
    pub fn with_completion_percentage(mut self, completion_percentage: f32) -> Self {
        self.completion_percentage = clamp_completion(completion_percentage);
        self
    }

    /// Backend-assigned, stable achievement id
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn completion_percentage(&self) -> f32 {
        self.completion_percentage
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.icon_url.as_deref()
    }

    /// True once completion reached 100%
    pub fn is_unlocked(&self) -> bool {
        self.completion_percentage >= 1.0
    }

    /// Get display name (for logging/UI)
    pub fn display_name(&self) -> String {
        let name = self.title.as_deref().unwrap_or(&self.id);
        if self.is_unlocked() {
            format!("{} (unlocked)", name)
        } else {
            format!("{} ({:.0}%)", name, self.completion_percentage * 100.0)
        }
    }
}

/// Clamp to `[0.0, 1.0]`, NaN counts as no progress
pub(crate) fn clamp_completion(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}
