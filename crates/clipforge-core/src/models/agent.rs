use serde::{Deserialize, Serialize};

/// The ten agent kinds, declared in canonical pipeline order.
///
/// The derived `Ord` follows declaration order, so sorting a set of kinds
/// yields the canonical sequence used by sequential mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentType {
    Content,
    Video,
    Music,
    Image,
    Voice,
    Editing,
    Optimization,
    Analytics,
    Safety,
    Social,
}

impl AgentType {
    pub const ALL: [AgentType; 10] = [
        AgentType::Content,
        AgentType::Video,
        AgentType::Music,
        AgentType::Image,
        AgentType::Voice,
        AgentType::Editing,
        AgentType::Optimization,
        AgentType::Analytics,
        AgentType::Safety,
        AgentType::Social,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "content",
            Self::Video => "video",
            Self::Music => "music",
            Self::Image => "image",
            Self::Voice => "voice",
            Self::Editing => "editing",
            Self::Optimization => "optimization",
            Self::Analytics => "analytics",
            Self::Safety => "safety",
            Self::Social => "social",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "content" => Some(Self::Content),
            "video" => Some(Self::Video),
            "music" => Some(Self::Music),
            "image" => Some(Self::Image),
            "voice" => Some(Self::Voice),
            "editing" => Some(Self::Editing),
            "optimization" => Some(Self::Optimization),
            "analytics" => Some(Self::Analytics),
            "safety" => Some(Self::Safety),
            "social" => Some(Self::Social),
            _ => None,
        }
    }

    /// Human-readable label used in logs and CLI tables.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Content => "Content Agent",
            Self::Video => "Video Agent",
            Self::Music => "Music Agent",
            Self::Image => "Image Agent",
            Self::Voice => "Voice Agent",
            Self::Editing => "Editing Agent",
            Self::Optimization => "Optimization Agent",
            Self::Analytics => "Analytics Agent",
            Self::Safety => "Safety Agent",
            Self::Social => "Social Agent",
        }
    }

    /// The declared inputs of this kind.
    ///
    /// `Data` and `Required` edges determine the hybrid tier of a task;
    /// `Gate` edges only order tasks inside a stage.
    pub fn dependencies(&self) -> &'static [(AgentType, DependencyKind)] {
        use AgentType::*;
        use DependencyKind::*;
        match self {
            Content | Video | Music | Image | Voice => &[],
            Editing => &[
                (Video, Required),
                (Music, Required),
                (Image, Data),
                (Voice, Data),
                (Content, Data),
            ],
            Optimization => &[(Content, Data), (Video, Data), (Image, Data)],
            Analytics => &[(Editing, Data), (Optimization, Data)],
            Safety => &[(Content, Data), (Editing, Data), (Optimization, Data)],
            Social => &[
                (Safety, Gate),
                (Editing, Data),
                (Optimization, Data),
                (Video, Data),
            ],
        }
    }
}

impl std::fmt::Display for AgentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly a task depends on an upstream result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DependencyKind {
    /// Consumed if present; an upstream failure does not block the task.
    Data,
    /// Upstream must succeed or the task is skipped.
    Required,
    /// Upstream must succeed before the task is dispatched, even within a stage.
    Gate,
}

impl DependencyKind {
    pub fn is_hard(&self) -> bool {
        matches!(self, Self::Required | Self::Gate)
    }

    /// Whether the edge contributes to stage tiering.
    pub fn is_tiered(&self) -> bool {
        matches!(self, Self::Data | Self::Required)
    }
}

/// An explicit reference from a task to an upstream task it consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dependency {
    pub task_id: String,
    pub agent_type: AgentType,
    pub kind: DependencyKind,
}
